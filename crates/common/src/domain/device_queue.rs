use crate::domain::result::DomainResult;
use crate::lorawan::Eui64;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Downlink payload scheduled for a device
///
/// Items of one device are ordered by `f_cnt`, which is unique per device.
/// A negative `retry_count` marks a confirmed item whose retries are
/// exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceQueueItem {
    pub id: i64,
    pub dev_eui: Eui64,
    pub frm_payload: Vec<u8>,
    pub f_cnt: u32,
    pub f_port: u8,
    pub confirmed: bool,
    pub retry_count: i32,
    pub emit_at: Option<DateTime<Utc>>,
    pub forwarded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for enqueueing a new item (id and timestamps are assigned by the store)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CreateDeviceQueueItemInput {
    pub dev_eui: Eui64,
    pub frm_payload: Vec<u8>,
    pub f_cnt: u32,
    pub f_port: u8,
    pub confirmed: bool,
    pub retry_count: i32,
    pub emit_at: Option<DateTime<Utc>>,
    pub forwarded_at: Option<DateTime<Utc>>,
}

/// Repository trait for the per-device downlink queue
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceQueueRepository: Send + Sync {
    /// Enqueue an item
    async fn create_device_queue_item(
        &self,
        input: CreateDeviceQueueItemInput,
    ) -> DomainResult<DeviceQueueItem>;

    /// Get an item by ID
    async fn get_device_queue_item(&self, id: i64) -> DomainResult<Option<DeviceQueueItem>>;

    /// Replace all fields of an existing item; fails with
    /// `DeviceQueueItemNotFound` when the row is gone
    async fn update_device_queue_item(
        &self,
        item: DeviceQueueItem,
    ) -> DomainResult<DeviceQueueItem>;

    /// Delete an item; fails with `DeviceQueueItemNotFound` when absent
    async fn delete_device_queue_item(&self, id: i64) -> DomainResult<()>;

    /// Delete every item queued for the device
    async fn flush_device_queue_for_dev_eui(&self, dev_eui: &Eui64) -> DomainResult<()>;

    /// Get the item with the lowest frame-counter
    async fn get_next_device_queue_item_for_dev_eui(
        &self,
        dev_eui: &Eui64,
    ) -> DomainResult<Option<DeviceQueueItem>>;

    /// List all items sorted by frame-counter (ascending)
    async fn get_device_queue_items_for_dev_eui(
        &self,
        dev_eui: &Eui64,
    ) -> DomainResult<Vec<DeviceQueueItem>>;
}
