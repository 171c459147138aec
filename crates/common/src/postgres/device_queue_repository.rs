use crate::domain::{
    CreateDeviceQueueItemInput, DeviceQueueItem, DeviceQueueRepository, DomainError,
    DomainResult,
};
use crate::lorawan::Eui64;
use crate::postgres::PostgresClient;
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use tracing::{debug, info, instrument};

const DEVICE_QUEUE_COLUMNS: &str = "id, dev_eui, frm_payload, f_cnt, f_port, confirmed, retry_count, emit_at, forwarded_at, created_at, updated_at";

/// Device-queue row as stored in PostgreSQL
#[derive(Debug, Clone)]
pub struct DeviceQueueItemRow {
    pub id: i64,
    pub dev_eui: Vec<u8>,
    pub frm_payload: Vec<u8>,
    pub f_cnt: i64,
    pub f_port: i16,
    pub confirmed: bool,
    pub retry_count: i32,
    pub emit_at: Option<DateTime<Utc>>,
    pub forwarded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Row> for DeviceQueueItemRow {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get(0),
            dev_eui: row.get(1),
            frm_payload: row.get(2),
            f_cnt: row.get(3),
            f_port: row.get(4),
            confirmed: row.get(5),
            retry_count: row.get(6),
            emit_at: row.get(7),
            forwarded_at: row.get(8),
            created_at: row.get(9),
            updated_at: row.get(10),
        }
    }
}

impl TryFrom<DeviceQueueItemRow> for DeviceQueueItem {
    type Error = DomainError;

    fn try_from(row: DeviceQueueItemRow) -> DomainResult<Self> {
        let dev_eui = Eui64::try_from(row.dev_eui.as_slice())
            .map_err(|e| DomainError::RepositoryError(e.into()))?;
        let f_cnt = u32::try_from(row.f_cnt)
            .map_err(|_| DomainError::RepositoryError(anyhow!("f_cnt out of range: {}", row.f_cnt)))?;
        let f_port = u8::try_from(row.f_port).map_err(|_| {
            DomainError::RepositoryError(anyhow!("f_port out of range: {}", row.f_port))
        })?;

        Ok(DeviceQueueItem {
            id: row.id,
            dev_eui,
            frm_payload: row.frm_payload,
            f_cnt,
            f_port,
            confirmed: row.confirmed,
            retry_count: row.retry_count,
            emit_at: row.emit_at,
            forwarded_at: row.forwarded_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn item_from_row(row: &Row) -> DomainResult<DeviceQueueItem> {
    DeviceQueueItemRow::from(row).try_into()
}

/// PostgreSQL implementation of DeviceQueueRepository trait
#[derive(Clone)]
pub struct PostgresDeviceQueueRepository {
    client: PostgresClient,
}

impl PostgresDeviceQueueRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeviceQueueRepository for PostgresDeviceQueueRepository {
    #[instrument(skip(self, input), fields(dev_eui = %input.dev_eui, f_cnt = input.f_cnt))]
    async fn create_device_queue_item(
        &self,
        input: CreateDeviceQueueItemInput,
    ) -> DomainResult<DeviceQueueItem> {
        let conn = self.client.connection().await?;

        let now = Utc::now();
        let dev_eui = input.dev_eui.as_bytes();
        let f_cnt = i64::from(input.f_cnt);
        let f_port = i16::from(input.f_port);

        let result = conn
            .query_one(
                &format!(
                    "INSERT INTO device_queue (created_at, updated_at, dev_eui, frm_payload, f_cnt, f_port, confirmed, retry_count, emit_at, forwarded_at)
                     VALUES ($1, $1, $2, $3, $4, $5, $6, $7, $8, $9)
                     RETURNING {DEVICE_QUEUE_COLUMNS}"
                ),
                &[
                    &now,
                    &dev_eui,
                    &input.frm_payload,
                    &f_cnt,
                    &f_port,
                    &input.confirmed,
                    &input.retry_count,
                    &input.emit_at,
                    &input.forwarded_at,
                ],
            )
            .await;

        let row = match result {
            Ok(row) => row,
            Err(e) => {
                if let Some(db_err) = e.as_db_error() {
                    // unique (dev_eui, f_cnt)
                    if db_err.code().code() == "23505" {
                        return Err(DomainError::DeviceQueueItemAlreadyExists(format!(
                            "{}/{}",
                            input.dev_eui, input.f_cnt
                        )));
                    }
                }
                return Err(DomainError::RepositoryError(e.into()));
            }
        };

        let item = item_from_row(&row)?;
        info!(id = item.id, "device-queue item created");
        Ok(item)
    }

    #[instrument(skip(self))]
    async fn get_device_queue_item(&self, id: i64) -> DomainResult<Option<DeviceQueueItem>> {
        let conn = self.client.connection().await?;

        let row = conn
            .query_opt(
                &format!("SELECT {DEVICE_QUEUE_COLUMNS} FROM device_queue WHERE id = $1"),
                &[&id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        row.as_ref().map(item_from_row).transpose()
    }

    #[instrument(skip(self, item), fields(id = item.id, dev_eui = %item.dev_eui))]
    async fn update_device_queue_item(
        &self,
        item: DeviceQueueItem,
    ) -> DomainResult<DeviceQueueItem> {
        let conn = self.client.connection().await?;

        let now = Utc::now();
        let dev_eui = item.dev_eui.as_bytes();
        let f_cnt = i64::from(item.f_cnt);
        let f_port = i16::from(item.f_port);

        let row = conn
            .query_opt(
                &format!(
                    "UPDATE device_queue
                     SET updated_at = $2, dev_eui = $3, frm_payload = $4, f_cnt = $5, f_port = $6,
                         confirmed = $7, retry_count = $8, emit_at = $9, forwarded_at = $10
                     WHERE id = $1
                     RETURNING {DEVICE_QUEUE_COLUMNS}"
                ),
                &[
                    &item.id,
                    &now,
                    &dev_eui,
                    &item.frm_payload,
                    &f_cnt,
                    &f_port,
                    &item.confirmed,
                    &item.retry_count,
                    &item.emit_at,
                    &item.forwarded_at,
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        match row {
            Some(row) => {
                info!("device-queue item updated");
                item_from_row(&row)
            }
            None => Err(DomainError::DeviceQueueItemNotFound(item.id)),
        }
    }

    #[instrument(skip(self))]
    async fn delete_device_queue_item(&self, id: i64) -> DomainResult<()> {
        let conn = self.client.connection().await?;

        let rows_affected = conn
            .execute("DELETE FROM device_queue WHERE id = $1", &[&id])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        if rows_affected == 0 {
            return Err(DomainError::DeviceQueueItemNotFound(id));
        }

        info!("device-queue item deleted");
        Ok(())
    }

    #[instrument(skip(self, dev_eui), fields(dev_eui = %dev_eui))]
    async fn flush_device_queue_for_dev_eui(&self, dev_eui: &Eui64) -> DomainResult<()> {
        let conn = self.client.connection().await?;

        let rows_affected = conn
            .execute(
                "DELETE FROM device_queue WHERE dev_eui = $1",
                &[&dev_eui.as_bytes()],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        info!(count = rows_affected, "device-queue flushed");
        Ok(())
    }

    #[instrument(skip(self, dev_eui), fields(dev_eui = %dev_eui))]
    async fn get_next_device_queue_item_for_dev_eui(
        &self,
        dev_eui: &Eui64,
    ) -> DomainResult<Option<DeviceQueueItem>> {
        let conn = self.client.connection().await?;

        let row = conn
            .query_opt(
                &format!(
                    "SELECT {DEVICE_QUEUE_COLUMNS} FROM device_queue
                     WHERE dev_eui = $1
                     ORDER BY f_cnt
                     LIMIT 1"
                ),
                &[&dev_eui.as_bytes()],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        row.as_ref().map(item_from_row).transpose()
    }

    #[instrument(skip(self, dev_eui), fields(dev_eui = %dev_eui))]
    async fn get_device_queue_items_for_dev_eui(
        &self,
        dev_eui: &Eui64,
    ) -> DomainResult<Vec<DeviceQueueItem>> {
        let conn = self.client.connection().await?;

        let rows = conn
            .query(
                &format!(
                    "SELECT {DEVICE_QUEUE_COLUMNS} FROM device_queue
                     WHERE dev_eui = $1
                     ORDER BY f_cnt"
                ),
                &[&dev_eui.as_bytes()],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let items = rows
            .iter()
            .map(item_from_row)
            .collect::<DomainResult<Vec<_>>>()?;

        debug!(count = items.len(), "listed device-queue items");
        Ok(items)
    }
}
