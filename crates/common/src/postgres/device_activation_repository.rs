use crate::domain::{
    CreateDeviceActivationInput, DeviceActivation, DeviceActivationRepository, DomainError,
    DomainResult,
};
use crate::lorawan::{Aes128Key, DevAddr, DevNonce, Eui64};
use crate::postgres::PostgresClient;
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use tracing::{info, instrument, warn};

/// Activation row for PostgreSQL storage
#[derive(Debug, Clone)]
pub struct DeviceActivationRow {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub dev_eui: Vec<u8>,
    pub join_eui: Vec<u8>,
    pub dev_addr: Vec<u8>,
    pub nwk_s_key: Vec<u8>,
    pub dev_nonce: i32,
}

impl From<&Row> for DeviceActivationRow {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get(0),
            created_at: row.get(1),
            dev_eui: row.get(2),
            join_eui: row.get(3),
            dev_addr: row.get(4),
            nwk_s_key: row.get(5),
            dev_nonce: row.get(6),
        }
    }
}

impl TryFrom<DeviceActivationRow> for DeviceActivation {
    type Error = DomainError;

    fn try_from(row: DeviceActivationRow) -> DomainResult<Self> {
        let invalid = |e: crate::lorawan::LorawanError| DomainError::RepositoryError(e.into());
        let dev_nonce = DevNonce::try_from(row.dev_nonce).map_err(|_| {
            DomainError::RepositoryError(anyhow!("dev_nonce out of range: {}", row.dev_nonce))
        })?;

        Ok(DeviceActivation {
            id: row.id,
            created_at: row.created_at,
            dev_eui: Eui64::try_from(row.dev_eui.as_slice()).map_err(invalid)?,
            join_eui: Eui64::try_from(row.join_eui.as_slice()).map_err(invalid)?,
            dev_addr: DevAddr::try_from(row.dev_addr.as_slice()).map_err(invalid)?,
            nwk_s_key: Aes128Key::try_from(row.nwk_s_key.as_slice()).map_err(invalid)?,
            dev_nonce,
        })
    }
}

/// PostgreSQL implementation of DeviceActivationRepository trait
#[derive(Clone)]
pub struct PostgresDeviceActivationRepository {
    client: PostgresClient,
}

impl PostgresDeviceActivationRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeviceActivationRepository for PostgresDeviceActivationRepository {
    #[instrument(skip(self, join_eui, dev_eui), fields(join_eui = %join_eui, dev_eui = %dev_eui))]
    async fn validate_dev_nonce(
        &self,
        join_eui: &Eui64,
        dev_eui: &Eui64,
        dev_nonce: DevNonce,
    ) -> DomainResult<()> {
        let conn = self.client.connection().await?;

        let nonce = i32::from(dev_nonce);
        let now = Utc::now();

        // The WHERE clause makes the upsert a no-op unless the nonce advances.
        let rows_affected = conn
            .execute(
                "INSERT INTO device_nonce (dev_eui, join_eui, dev_nonce, updated_at)
                 VALUES ($1, $2, $3, $4)
                 ON CONFLICT (dev_eui, join_eui) DO UPDATE
                 SET dev_nonce = EXCLUDED.dev_nonce, updated_at = EXCLUDED.updated_at
                 WHERE device_nonce.dev_nonce < EXCLUDED.dev_nonce",
                &[&dev_eui.as_bytes(), &join_eui.as_bytes(), &nonce, &now],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        if rows_affected == 0 {
            warn!(dev_nonce, "DevNonce rejected");
            return Err(DomainError::InvalidDevNonce {
                dev_eui: dev_eui.to_string(),
                dev_nonce,
            });
        }

        Ok(())
    }

    #[instrument(skip(self, input), fields(dev_eui = %input.dev_eui, dev_addr = %input.dev_addr))]
    async fn create_device_activation(
        &self,
        input: CreateDeviceActivationInput,
    ) -> DomainResult<DeviceActivation> {
        let conn = self.client.connection().await?;

        let now = Utc::now();
        let dev_nonce = i32::from(input.dev_nonce);

        let row = conn
            .query_one(
                "INSERT INTO device_activation (created_at, dev_eui, join_eui, dev_addr, nwk_s_key, dev_nonce)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 RETURNING id",
                &[
                    &now,
                    &input.dev_eui.as_bytes(),
                    &input.join_eui.as_bytes(),
                    &input.dev_addr.as_bytes(),
                    &input.nwk_s_key.as_bytes(),
                    &dev_nonce,
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let id: i64 = row.get(0);
        info!(id, "device-activation created");

        Ok(DeviceActivation {
            id,
            created_at: now,
            dev_eui: input.dev_eui,
            join_eui: input.join_eui,
            dev_addr: input.dev_addr,
            nwk_s_key: input.nwk_s_key,
            dev_nonce: input.dev_nonce,
        })
    }

    #[instrument(skip(self, dev_eui), fields(dev_eui = %dev_eui))]
    async fn get_last_device_activation_for_dev_eui(
        &self,
        dev_eui: &Eui64,
    ) -> DomainResult<Option<DeviceActivation>> {
        let conn = self.client.connection().await?;

        let row = conn
            .query_opt(
                "SELECT id, created_at, dev_eui, join_eui, dev_addr, nwk_s_key, dev_nonce
                 FROM device_activation
                 WHERE dev_eui = $1
                 ORDER BY created_at DESC, id DESC
                 LIMIT 1",
                &[&dev_eui.as_bytes()],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        row.as_ref()
            .map(|row| DeviceActivationRow::from(row).try_into())
            .transpose()
    }
}
