use crate::domain::{
    Device, DeviceProfile, DeviceProfileRepository, DeviceRepository, DomainError, DomainResult,
    RoutingProfile, RoutingProfileRepository, ServiceProfile, ServiceProfileRepository,
};
use crate::lorawan::Eui64;
use crate::postgres::PostgresClient;
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::instrument;

/// Device row for PostgreSQL storage with timestamp metadata
#[derive(Debug, Clone)]
pub struct DeviceRow {
    pub dev_eui: Vec<u8>,
    pub device_profile_id: String,
    pub service_profile_id: String,
    pub routing_profile_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DeviceRow> for Device {
    type Error = DomainError;

    fn try_from(row: DeviceRow) -> DomainResult<Self> {
        let dev_eui = Eui64::try_from(row.dev_eui.as_slice())
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(Device {
            dev_eui,
            device_profile_id: row.device_profile_id,
            service_profile_id: row.service_profile_id,
            routing_profile_id: row.routing_profile_id,
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
        })
    }
}

/// PostgreSQL implementation of DeviceRepository trait
#[derive(Clone)]
pub struct PostgresDeviceRepository {
    client: PostgresClient,
}

impl PostgresDeviceRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeviceRepository for PostgresDeviceRepository {
    #[instrument(skip(self, dev_eui), fields(dev_eui = %dev_eui))]
    async fn get_device(&self, dev_eui: &Eui64) -> DomainResult<Option<Device>> {
        let conn = self.client.connection().await?;

        let row = conn
            .query_opt(
                "SELECT dev_eui, device_profile_id, service_profile_id, routing_profile_id, created_at, updated_at
                 FROM device
                 WHERE dev_eui = $1",
                &[&dev_eui.as_bytes()],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        match row {
            Some(row) => {
                let device_row = DeviceRow {
                    dev_eui: row.get(0),
                    device_profile_id: row.get(1),
                    service_profile_id: row.get(2),
                    routing_profile_id: row.get(3),
                    created_at: row.get(4),
                    updated_at: row.get(5),
                };
                Ok(Some(device_row.try_into()?))
            }
            None => Ok(None),
        }
    }
}

/// PostgreSQL lookups for device-, service- and routing-profiles
#[derive(Clone)]
pub struct PostgresProfileRepository {
    client: PostgresClient,
}

impl PostgresProfileRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeviceProfileRepository for PostgresProfileRepository {
    #[instrument(skip(self))]
    async fn get_device_profile(
        &self,
        device_profile_id: &str,
    ) -> DomainResult<Option<DeviceProfile>> {
        let conn = self.client.connection().await?;

        let row = conn
            .query_opt(
                "SELECT device_profile_id, supports_join, mac_version
                 FROM device_profile
                 WHERE device_profile_id = $1",
                &[&device_profile_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.map(|row| DeviceProfile {
            device_profile_id: row.get(0),
            supports_join: row.get(1),
            mac_version: row.get(2),
        }))
    }
}

#[async_trait]
impl ServiceProfileRepository for PostgresProfileRepository {
    #[instrument(skip(self))]
    async fn get_service_profile(
        &self,
        service_profile_id: &str,
    ) -> DomainResult<Option<ServiceProfile>> {
        let conn = self.client.connection().await?;

        let row = conn
            .query_opt(
                "SELECT service_profile_id, dr_max
                 FROM service_profile
                 WHERE service_profile_id = $1",
                &[&service_profile_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        match row {
            Some(row) => {
                let dr_max: i16 = row.get(1);
                let dr_max = u8::try_from(dr_max).map_err(|_| {
                    DomainError::RepositoryError(anyhow!("dr_max out of range: {dr_max}"))
                })?;
                Ok(Some(ServiceProfile {
                    service_profile_id: row.get(0),
                    dr_max,
                }))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl RoutingProfileRepository for PostgresProfileRepository {
    #[instrument(skip(self))]
    async fn get_routing_profile(
        &self,
        routing_profile_id: &str,
    ) -> DomainResult<Option<RoutingProfile>> {
        let conn = self.client.connection().await?;

        let row = conn
            .query_opt(
                "SELECT routing_profile_id, as_id
                 FROM routing_profile
                 WHERE routing_profile_id = $1",
                &[&routing_profile_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.map(|row| RoutingProfile {
            routing_profile_id: row.get(0),
            as_id: row.get(1),
        }))
    }
}
