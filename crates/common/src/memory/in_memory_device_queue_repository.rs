use crate::domain::{
    CreateDeviceQueueItemInput, DeviceQueueItem, DeviceQueueRepository, DomainError,
    DomainResult,
};
use crate::lorawan::Eui64;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Default)]
struct QueueState {
    next_id: i64,
    items: HashMap<i64, DeviceQueueItem>,
}

impl QueueState {
    fn f_cnt_taken(&self, dev_eui: &Eui64, f_cnt: u32, except_id: Option<i64>) -> bool {
        self.items.values().any(|item| {
            item.dev_eui == *dev_eui && item.f_cnt == f_cnt && Some(item.id) != except_id
        })
    }

    fn sorted_for(&self, dev_eui: &Eui64) -> Vec<DeviceQueueItem> {
        let mut items: Vec<DeviceQueueItem> = self
            .items
            .values()
            .filter(|item| item.dev_eui == *dev_eui)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.f_cnt);
        items
    }
}

/// In-memory implementation of DeviceQueueRepository
///
/// Enforces the same `(dev_eui, f_cnt)` uniqueness as the PostgreSQL schema.
#[derive(Clone, Default)]
pub struct InMemoryDeviceQueueRepository {
    state: Arc<RwLock<QueueState>>,
}

impl InMemoryDeviceQueueRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceQueueRepository for InMemoryDeviceQueueRepository {
    async fn create_device_queue_item(
        &self,
        input: CreateDeviceQueueItemInput,
    ) -> DomainResult<DeviceQueueItem> {
        let mut state = self.state.write().await;
        if state.f_cnt_taken(&input.dev_eui, input.f_cnt, None) {
            return Err(DomainError::DeviceQueueItemAlreadyExists(format!(
                "{}/{}",
                input.dev_eui, input.f_cnt
            )));
        }

        state.next_id += 1;
        let now = Utc::now();
        let item = DeviceQueueItem {
            id: state.next_id,
            dev_eui: input.dev_eui,
            frm_payload: input.frm_payload,
            f_cnt: input.f_cnt,
            f_port: input.f_port,
            confirmed: input.confirmed,
            retry_count: input.retry_count,
            emit_at: input.emit_at,
            forwarded_at: input.forwarded_at,
            created_at: now,
            updated_at: now,
        };
        state.items.insert(item.id, item.clone());

        info!(dev_eui = %item.dev_eui, id = item.id, f_cnt = item.f_cnt, "device-queue item created");
        Ok(item)
    }

    async fn get_device_queue_item(&self, id: i64) -> DomainResult<Option<DeviceQueueItem>> {
        let state = self.state.read().await;
        Ok(state.items.get(&id).cloned())
    }

    async fn update_device_queue_item(
        &self,
        item: DeviceQueueItem,
    ) -> DomainResult<DeviceQueueItem> {
        let mut state = self.state.write().await;
        if state.f_cnt_taken(&item.dev_eui, item.f_cnt, Some(item.id)) {
            return Err(DomainError::DeviceQueueItemAlreadyExists(format!(
                "{}/{}",
                item.dev_eui, item.f_cnt
            )));
        }

        let stored = state
            .items
            .get_mut(&item.id)
            .ok_or(DomainError::DeviceQueueItemNotFound(item.id))?;
        *stored = DeviceQueueItem {
            created_at: stored.created_at,
            updated_at: Utc::now(),
            ..item
        };

        info!(dev_eui = %stored.dev_eui, id = stored.id, "device-queue item updated");
        Ok(stored.clone())
    }

    async fn delete_device_queue_item(&self, id: i64) -> DomainResult<()> {
        let mut state = self.state.write().await;
        let removed = state
            .items
            .remove(&id)
            .ok_or(DomainError::DeviceQueueItemNotFound(id))?;

        info!(dev_eui = %removed.dev_eui, id, "device-queue item deleted");
        Ok(())
    }

    async fn flush_device_queue_for_dev_eui(&self, dev_eui: &Eui64) -> DomainResult<()> {
        let mut state = self.state.write().await;
        let before = state.items.len();
        state.items.retain(|_, item| item.dev_eui != *dev_eui);

        info!(dev_eui = %dev_eui, count = before - state.items.len(), "device-queue flushed");
        Ok(())
    }

    async fn get_next_device_queue_item_for_dev_eui(
        &self,
        dev_eui: &Eui64,
    ) -> DomainResult<Option<DeviceQueueItem>> {
        let state = self.state.read().await;
        Ok(state
            .items
            .values()
            .filter(|item| item.dev_eui == *dev_eui)
            .min_by_key(|item| item.f_cnt)
            .cloned())
    }

    async fn get_device_queue_items_for_dev_eui(
        &self,
        dev_eui: &Eui64,
    ) -> DomainResult<Vec<DeviceQueueItem>> {
        let state = self.state.read().await;
        Ok(state.sorted_for(dev_eui))
    }
}
