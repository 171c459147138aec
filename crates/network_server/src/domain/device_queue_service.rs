use crate::domain::NetworkSettings;
use crate::domain::upstream::call_with_timeout;
use common::domain::{
    ApplicationServerClient, ApplicationServerPool, DeviceQueueItem, DeviceQueueRepository,
    DomainError, DomainResult, ErrorType, HandleDownlinkAckRequest, HandleErrorRequest,
    RoutingProfileRepository,
};
use common::lorawan::Eui64;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Classification of the head of a device-queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueItemOutcome {
    Deliverable,
    /// Confirmed item whose retries ran out without an acknowledgement
    RetriesExhausted,
    /// Frame-counter too far ahead of (or behind) the expected counter
    FrameCounterGap,
    /// Payload larger than the current link budget allows
    PayloadTooLarge,
}

impl QueueItemOutcome {
    /// Checks run in priority order: retries, then frame-counter, then size.
    pub fn classify(
        item: &DeviceQueueItem,
        expected_f_cnt: u32,
        max_payload_size: usize,
        max_fcnt_gap: u32,
    ) -> Self {
        if item.retry_count < 0 {
            QueueItemOutcome::RetriesExhausted
        } else if item.f_cnt.wrapping_sub(expected_f_cnt) > max_fcnt_gap {
            QueueItemOutcome::FrameCounterGap
        } else if item.frm_payload.len() > max_payload_size {
            QueueItemOutcome::PayloadTooLarge
        } else {
            QueueItemOutcome::Deliverable
        }
    }
}

/// Input for selecting the next transmittable item of a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetNextDeviceQueueItemInput {
    pub dev_eui: Eui64,
    pub max_payload_size: usize,
    /// Downlink frame-counter the device currently expects
    pub f_cnt: u32,
    pub routing_profile_id: String,
}

/// Selects the next downlink of a device, discarding and reporting items
/// that can never be delivered
pub struct DeviceQueueService {
    queue_repository: Arc<dyn DeviceQueueRepository>,
    routing_profile_repository: Arc<dyn RoutingProfileRepository>,
    application_servers: Arc<dyn ApplicationServerPool>,
    max_fcnt_gap: u32,
    max_queue_discards: usize,
    application_server_timeout: Duration,
}

impl DeviceQueueService {
    pub fn new(
        queue_repository: Arc<dyn DeviceQueueRepository>,
        routing_profile_repository: Arc<dyn RoutingProfileRepository>,
        application_servers: Arc<dyn ApplicationServerPool>,
        settings: &NetworkSettings,
    ) -> Self {
        Self {
            queue_repository,
            routing_profile_repository,
            application_servers,
            max_fcnt_gap: settings.max_fcnt_gap,
            max_queue_discards: settings.max_queue_discards,
            application_server_timeout: settings.application_server_timeout,
        }
    }

    /// Return the lowest-frame-counter item that can be transmitted
    ///
    /// Items that are not deliverable are deleted and the owning
    /// application-server is notified before moving on to the next one.
    /// Fails with `DeviceQueueEmpty` once no item is left.
    pub async fn get_next_device_queue_item(
        &self,
        input: &GetNextDeviceQueueItemInput,
    ) -> DomainResult<DeviceQueueItem> {
        let mut discarded = 0;

        loop {
            let item = self
                .queue_repository
                .get_next_device_queue_item_for_dev_eui(&input.dev_eui)
                .await?
                .ok_or_else(|| DomainError::DeviceQueueEmpty(input.dev_eui.to_string()))?;

            let outcome = QueueItemOutcome::classify(
                &item,
                input.f_cnt,
                input.max_payload_size,
                self.max_fcnt_gap,
            );

            if outcome == QueueItemOutcome::Deliverable {
                debug!(
                    dev_eui = %input.dev_eui,
                    f_cnt = item.f_cnt,
                    discarded,
                    "Next device-queue item selected"
                );
                return Ok(item);
            }

            if discarded >= self.max_queue_discards {
                return Err(DomainError::QueueDiscardLimitExceeded {
                    dev_eui: input.dev_eui.to_string(),
                    limit: self.max_queue_discards,
                });
            }

            self.discard(input, &item, outcome).await?;
            discarded += 1;
        }
    }

    async fn discard(
        &self,
        input: &GetNextDeviceQueueItemInput,
        item: &DeviceQueueItem,
        outcome: QueueItemOutcome,
    ) -> DomainResult<()> {
        let routing_profile = self
            .routing_profile_repository
            .get_routing_profile(&input.routing_profile_id)
            .await?
            .ok_or_else(|| DomainError::RoutingProfileNotFound(input.routing_profile_id.clone()))?;
        let client = self.application_servers.get(&routing_profile.as_id).await?;

        self.queue_repository.delete_device_queue_item(item.id).await?;

        match outcome {
            QueueItemOutcome::RetriesExhausted => {
                warn!(
                    dev_eui = %item.dev_eui,
                    f_cnt = item.f_cnt,
                    retry_count = item.retry_count,
                    "Device-queue item discarded: retries exhausted"
                );
                let request = HandleDownlinkAckRequest {
                    dev_eui: item.dev_eui,
                    f_cnt: item.f_cnt,
                    acknowledged: false,
                };
                call_with_timeout(
                    self.application_server_timeout,
                    "handle_downlink_ack",
                    client.handle_downlink_ack(request),
                )
                .await
            }
            QueueItemOutcome::FrameCounterGap => {
                warn!(
                    dev_eui = %item.dev_eui,
                    f_cnt = item.f_cnt,
                    expected_f_cnt = input.f_cnt,
                    max_fcnt_gap = self.max_fcnt_gap,
                    "Device-queue item discarded: frame-counter gap"
                );
                self.report_error(
                    client.as_ref(),
                    item,
                    ErrorType::DeviceQueueItemFcnt,
                    "frame-counter exceeds MaxFCntGap",
                )
                .await
            }
            QueueItemOutcome::PayloadTooLarge => {
                warn!(
                    dev_eui = %item.dev_eui,
                    f_cnt = item.f_cnt,
                    payload_size = item.frm_payload.len(),
                    max_payload_size = input.max_payload_size,
                    "Device-queue item discarded: payload too large"
                );
                self.report_error(
                    client.as_ref(),
                    item,
                    ErrorType::DeviceQueueItemSize,
                    "payload exceeds max payload size",
                )
                .await
            }
            QueueItemOutcome::Deliverable => Ok(()),
        }
    }

    async fn report_error(
        &self,
        client: &dyn ApplicationServerClient,
        item: &DeviceQueueItem,
        error_type: ErrorType,
        error: &str,
    ) -> DomainResult<()> {
        let request = HandleErrorRequest {
            dev_eui: item.dev_eui,
            error_type,
            f_cnt: item.f_cnt,
            error: error.to_string(),
        };
        call_with_timeout(
            self.application_server_timeout,
            "handle_error",
            client.handle_error(request),
        )
        .await
    }
}
