use crate::domain::NetworkSettings;
use crate::domain::upstream::call_with_timeout;
use common::domain::{
    BasePayload, CreateDeviceActivationInput, Device, DeviceActivation,
    DeviceActivationRepository, DeviceProfile, DeviceProfileRepository, DeviceQueueRepository,
    DeviceRepository, DeviceSession, DeviceSessionStore, DomainError, DomainResult,
    DownlinkDispatcher, JoinReqPayload, JoinServerPool, MessageType, PROTOCOL_VERSION_1_0,
    RxPacket, RxWindow, ServiceProfile, ServiceProfileRepository, UplinkLogger,
};
use common::lorawan::{Aes128Key, DevAddr, JoinRequestPayload, MType, PhyPayload};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Stages of the join pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinStage {
    DecodeJoinRequest,
    LogFramesCollected,
    ResolveDevice,
    ValidateDevNonce,
    AllocateDevAddr,
    JoinServerExchange,
    CreateDeviceSession,
    FlushMacCommandQueue,
    FlushDeviceQueue,
    CreateDeviceActivation,
    SendJoinAccept,
}

impl JoinStage {
    pub const ALL: [JoinStage; 11] = [
        JoinStage::DecodeJoinRequest,
        JoinStage::LogFramesCollected,
        JoinStage::ResolveDevice,
        JoinStage::ValidateDevNonce,
        JoinStage::AllocateDevAddr,
        JoinStage::JoinServerExchange,
        JoinStage::CreateDeviceSession,
        JoinStage::FlushMacCommandQueue,
        JoinStage::FlushDeviceQueue,
        JoinStage::CreateDeviceActivation,
        JoinStage::SendJoinAccept,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            JoinStage::DecodeJoinRequest => "decode_join_request",
            JoinStage::LogFramesCollected => "log_frames_collected",
            JoinStage::ResolveDevice => "resolve_device",
            JoinStage::ValidateDevNonce => "validate_dev_nonce",
            JoinStage::AllocateDevAddr => "allocate_dev_addr",
            JoinStage::JoinServerExchange => "join_server_exchange",
            JoinStage::CreateDeviceSession => "create_device_session",
            JoinStage::FlushMacCommandQueue => "flush_mac_command_queue",
            JoinStage::FlushDeviceQueue => "flush_device_queue",
            JoinStage::CreateDeviceActivation => "create_device_activation",
            JoinStage::SendJoinAccept => "send_join_accept",
        }
    }
}

impl fmt::Display for JoinStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Collaborators of the join pipeline
#[derive(Clone)]
pub struct JoinRequestServiceDeps {
    pub device_repository: Arc<dyn DeviceRepository>,
    pub device_profile_repository: Arc<dyn DeviceProfileRepository>,
    pub service_profile_repository: Arc<dyn ServiceProfileRepository>,
    pub activation_repository: Arc<dyn DeviceActivationRepository>,
    pub queue_repository: Arc<dyn DeviceQueueRepository>,
    pub session_store: Arc<dyn DeviceSessionStore>,
    pub join_servers: Arc<dyn JoinServerPool>,
    pub dispatcher: Arc<dyn DownlinkDispatcher>,
    pub uplink_logger: Arc<dyn UplinkLogger>,
}

/// Result of a completed activation
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    pub session: DeviceSession,
    pub activation: DeviceActivation,
}

#[derive(Debug, Clone)]
struct DecodedJoinRequest {
    phy: PhyPayload,
    join_request: JoinRequestPayload,
}

#[derive(Debug, Clone)]
struct ResolvedDevice {
    device: Device,
    device_profile: DeviceProfile,
    service_profile: ServiceProfile,
}

#[derive(Debug, Clone)]
struct JoinAnswer {
    phy_payload: Vec<u8>,
    nwk_s_key: Aes128Key,
}

/// Runs one stage, tagging its failure with the stage name
async fn run_stage<T, F>(stage: JoinStage, fut: F) -> DomainResult<T>
where
    F: Future<Output = DomainResult<T>>,
{
    match fut.await {
        Ok(value) => {
            debug!(stage = %stage, "Join stage completed");
            Ok(value)
        }
        Err(e) => {
            error!(stage = %stage, kind = %e.kind(), error = %e, "Join stage failed");
            Err(DomainError::JoinStageFailed {
                stage: stage.to_string(),
                source: Box::new(e),
            })
        }
    }
}

/// Admits a device onto the network from an over-the-air join-request
///
/// Stages run strictly in [`JoinStage::ALL`] order and the first failure
/// aborts the rest. Completed stages are not undone: a consumed DevNonce or
/// a reserved DevAddr stays consumed when a later stage fails.
pub struct JoinRequestService {
    deps: JoinRequestServiceDeps,
    settings: NetworkSettings,
}

impl JoinRequestService {
    pub fn new(deps: JoinRequestServiceDeps, settings: NetworkSettings) -> Self {
        Self { deps, settings }
    }

    pub async fn handle_join_request(&self, packet: &RxPacket) -> DomainResult<JoinOutcome> {
        let decoded = run_stage(JoinStage::DecodeJoinRequest, async {
            decode_join_request(packet)
        })
        .await?;
        let dev_eui = decoded.join_request.dev_eui;

        run_stage(
            JoinStage::LogFramesCollected,
            self.log_frames_collected(&decoded, packet),
        )
        .await?;

        let resolved = run_stage(JoinStage::ResolveDevice, self.resolve_device(&decoded)).await?;

        run_stage(JoinStage::ValidateDevNonce, async {
            let jr = &decoded.join_request;
            self.deps
                .activation_repository
                .validate_dev_nonce(&jr.join_eui, &jr.dev_eui, jr.dev_nonce)
                .await
        })
        .await?;

        let dev_addr = run_stage(
            JoinStage::AllocateDevAddr,
            self.deps
                .session_store
                .allocate_dev_addr(&self.settings.net_id, &dev_eui),
        )
        .await?;

        let answer = run_stage(
            JoinStage::JoinServerExchange,
            self.join_server_exchange(&decoded, &resolved, dev_addr),
        )
        .await?;

        let session = run_stage(
            JoinStage::CreateDeviceSession,
            self.create_device_session(&decoded, &resolved, dev_addr, &answer, packet),
        )
        .await?;

        run_stage(
            JoinStage::FlushMacCommandQueue,
            self.deps.session_store.flush_mac_command_queue(&dev_eui),
        )
        .await?;

        run_stage(
            JoinStage::FlushDeviceQueue,
            self.deps.queue_repository.flush_device_queue_for_dev_eui(&dev_eui),
        )
        .await?;

        let activation = run_stage(JoinStage::CreateDeviceActivation, async {
            self.deps
                .activation_repository
                .create_device_activation(CreateDeviceActivationInput {
                    dev_eui,
                    join_eui: decoded.join_request.join_eui,
                    dev_addr,
                    nwk_s_key: answer.nwk_s_key,
                    dev_nonce: decoded.join_request.dev_nonce,
                })
                .await
        })
        .await?;

        run_stage(
            JoinStage::SendJoinAccept,
            self.send_join_accept(&session, &answer),
        )
        .await?;

        info!(
            dev_eui = %dev_eui,
            dev_addr = %dev_addr,
            activation_id = activation.id,
            "Device activated"
        );

        Ok(JoinOutcome {
            session,
            activation,
        })
    }

    async fn log_frames_collected(
        &self,
        decoded: &DecodedJoinRequest,
        packet: &RxPacket,
    ) -> DomainResult<()> {
        let dev_eui = decoded.join_request.dev_eui;
        info!(
            dev_eui = %dev_eui,
            gw_count = packet.rx_info_set.len(),
            gw_macs = ?packet.gateway_macs(),
            mtype = %decoded.phy.mtype(),
            "Packet(s) collected"
        );

        if let Err(e) = self.deps.uplink_logger.log_uplink(&dev_eui, packet).await {
            warn!(dev_eui = %dev_eui, error = %e, "Logging uplink frame failed");
        }
        Ok(())
    }

    async fn resolve_device(&self, decoded: &DecodedJoinRequest) -> DomainResult<ResolvedDevice> {
        let dev_eui = decoded.join_request.dev_eui;

        let device = self
            .deps
            .device_repository
            .get_device(&dev_eui)
            .await?
            .ok_or_else(|| DomainError::DeviceNotFound(dev_eui.to_string()))?;

        let device_profile = self
            .deps
            .device_profile_repository
            .get_device_profile(&device.device_profile_id)
            .await?
            .ok_or_else(|| DomainError::DeviceProfileNotFound(device.device_profile_id.clone()))?;

        let service_profile = self
            .deps
            .service_profile_repository
            .get_service_profile(&device.service_profile_id)
            .await?
            .ok_or_else(|| {
                DomainError::ServiceProfileNotFound(device.service_profile_id.clone())
            })?;

        if !device_profile.supports_join {
            return Err(DomainError::JoinNotSupported(dev_eui.to_string()));
        }

        Ok(ResolvedDevice {
            device,
            device_profile,
            service_profile,
        })
    }

    async fn join_server_exchange(
        &self,
        decoded: &DecodedJoinRequest,
        resolved: &ResolvedDevice,
        dev_addr: DevAddr,
    ) -> DomainResult<JoinAnswer> {
        let jr = &decoded.join_request;
        let client = self.deps.join_servers.get(&jr.join_eui).await?;

        let request = JoinReqPayload {
            base: BasePayload {
                protocol_version: PROTOCOL_VERSION_1_0.to_string(),
                sender_id: self.settings.net_id.to_string(),
                receiver_id: jr.join_eui.to_string(),
                transaction_id: rand::random::<u32>(),
                message_type: MessageType::JoinReq,
            },
            mac_version: resolved.device_profile.mac_version.clone(),
            phy_payload: decoded.phy.to_bytes(),
            dev_eui: jr.dev_eui,
            dev_addr,
            dl_settings: self.settings.dl_settings(),
            rx_delay: self.settings.rx1_delay,
            cf_list: self.settings.cf_list.clone(),
        };
        debug!(
            dev_eui = %jr.dev_eui,
            transaction_id = request.base.transaction_id,
            "Sending join-request to join-server"
        );

        let answer = call_with_timeout(
            self.settings.join_server_timeout,
            "join_request",
            client.join_request(request),
        )
        .await?;

        if !answer.nwk_s_key.kek_label.is_empty() {
            return Err(DomainError::UnsupportedKekLabel(answer.nwk_s_key.kek_label));
        }

        Ok(JoinAnswer {
            phy_payload: answer.phy_payload,
            nwk_s_key: answer.nwk_s_key.aes_key,
        })
    }

    async fn create_device_session(
        &self,
        decoded: &DecodedJoinRequest,
        resolved: &ResolvedDevice,
        dev_addr: DevAddr,
        answer: &JoinAnswer,
        packet: &RxPacket,
    ) -> DomainResult<DeviceSession> {
        let session = DeviceSession {
            device_profile_id: resolved.device.device_profile_id.clone(),
            service_profile_id: resolved.device.service_profile_id.clone(),
            routing_profile_id: resolved.device.routing_profile_id.clone(),
            dev_addr,
            dev_eui: decoded.join_request.dev_eui,
            join_eui: decoded.join_request.join_eui,
            nwk_s_key: answer.nwk_s_key,
            f_cnt_up: 0,
            f_cnt_down: 0,
            rx_window: RxWindow::Rx1,
            rx_delay: self.settings.rx1_delay,
            rx1_dr_offset: self.settings.rx1_dr_offset,
            rx2_dr: self.settings.rx2_dr,
            enabled_channels: self.settings.enabled_channels.clone(),
            last_rx_info_set: packet.rx_info_set.clone(),
            max_supported_dr: resolved.service_profile.dr_max,
        };

        self.deps.session_store.save_device_session(&session).await?;
        Ok(session)
    }

    async fn send_join_accept(
        &self,
        session: &DeviceSession,
        answer: &JoinAnswer,
    ) -> DomainResult<()> {
        let phy = PhyPayload::from_bytes(&answer.phy_payload)?;
        if phy.mtype() != MType::JoinAccept {
            return Err(DomainError::InvalidMType {
                expected: MType::JoinAccept.to_string(),
                actual: phy.mtype().to_string(),
            });
        }

        call_with_timeout(
            self.settings.dispatch_timeout,
            "send_join_accept",
            self.deps.dispatcher.send_join_accept(session, phy),
        )
        .await
    }
}

fn decode_join_request(packet: &RxPacket) -> DomainResult<DecodedJoinRequest> {
    let phy = PhyPayload::from_bytes(&packet.phy_payload)?;
    let join_request = *phy
        .join_request()
        .ok_or_else(|| DomainError::InvalidMType {
            expected: MType::JoinRequest.to_string(),
            actual: phy.mtype().to_string(),
        })?;

    Ok(DecodedJoinRequest { phy, join_request })
}
