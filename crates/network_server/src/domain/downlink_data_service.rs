use crate::domain::{DeviceQueueService, GetNextDeviceQueueItemInput};
use common::domain::{DeviceQueueRepository, DeviceSession, DomainError, DomainResult};
use std::sync::Arc;
use tracing::{debug, info};

/// Per-opportunity downlink decision, built fresh for every transmission
#[derive(Debug, Clone, PartialEq)]
pub struct DataContext {
    pub device_session: DeviceSession,
    /// Bytes still available in the frame for FRMPayload
    pub remaining_payload_size: usize,

    pub confirmed: bool,
    pub data: Option<Vec<u8>>,
    pub f_port: Option<u8>,
    pub more_data: bool,
}

impl DataContext {
    pub fn new(device_session: DeviceSession, remaining_payload_size: usize) -> Self {
        Self {
            device_session,
            remaining_payload_size,
            confirmed: false,
            data: None,
            f_port: None,
            more_data: false,
        }
    }

    fn clear_payload(&mut self) {
        self.confirmed = false;
        self.data = None;
        self.f_port = None;
        self.more_data = false;
    }
}

/// Fills a [`DataContext`] from the device-queue
pub struct DownlinkDataService {
    queue_service: Arc<DeviceQueueService>,
    queue_repository: Arc<dyn DeviceQueueRepository>,
}

impl DownlinkDataService {
    pub fn new(
        queue_service: Arc<DeviceQueueService>,
        queue_repository: Arc<dyn DeviceQueueRepository>,
    ) -> Self {
        Self {
            queue_service,
            queue_repository,
        }
    }

    /// Resolve the payload for the next downlink of the session's device
    ///
    /// An exhausted queue leaves the context without payload; any other
    /// selection failure is returned untouched. Unconfirmed
    /// items are removed once selected; confirmed items stay queued with one
    /// retry less.
    pub async fn set_next_queue_item(&self, ctx: &mut DataContext) -> DomainResult<()> {
        let session = &ctx.device_session;
        let input = GetNextDeviceQueueItemInput {
            dev_eui: session.dev_eui,
            max_payload_size: ctx.remaining_payload_size,
            f_cnt: session.f_cnt_down,
            routing_profile_id: session.routing_profile_id.clone(),
        };

        let mut item = match self.queue_service.get_next_device_queue_item(&input).await {
            Ok(item) => item,
            Err(DomainError::DeviceQueueEmpty(_)) => {
                debug!(dev_eui = %input.dev_eui, "No device-queue item to send");
                ctx.clear_payload();
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        ctx.confirmed = item.confirmed;
        ctx.data = Some(item.frm_payload.clone());
        ctx.f_port = Some(item.f_port);
        ctx.remaining_payload_size = ctx
            .remaining_payload_size
            .saturating_sub(item.frm_payload.len());

        let queued = self
            .queue_repository
            .get_device_queue_items_for_dev_eui(&input.dev_eui)
            .await?;
        ctx.more_data = queued.len() > 1;

        if item.confirmed {
            item.retry_count -= 1;
            let item = self.queue_repository.update_device_queue_item(item).await?;
            info!(
                dev_eui = %item.dev_eui,
                f_cnt = item.f_cnt,
                retry_count = item.retry_count,
                "Confirmed device-queue item scheduled"
            );
        } else {
            self.queue_repository.delete_device_queue_item(item.id).await?;
            info!(
                dev_eui = %item.dev_eui,
                f_cnt = item.f_cnt,
                "Unconfirmed device-queue item scheduled"
            );
        }

        Ok(())
    }
}
