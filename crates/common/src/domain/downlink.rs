use crate::domain::device_session::DeviceSession;
use crate::domain::result::DomainResult;
use crate::lorawan::PhyPayload;
use async_trait::async_trait;
use tracing::info;

/// Hands downlink frames to the gateway side for transmission
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DownlinkDispatcher: Send + Sync {
    /// Schedule a join-accept in the receive window of the session
    async fn send_join_accept(
        &self,
        session: &DeviceSession,
        phy_payload: PhyPayload,
    ) -> DomainResult<()>;
}

/// Dispatcher that only records the frame through tracing
#[derive(Debug, Default, Clone)]
pub struct TracingDownlinkDispatcher;

#[async_trait]
impl DownlinkDispatcher for TracingDownlinkDispatcher {
    async fn send_join_accept(
        &self,
        session: &DeviceSession,
        phy_payload: PhyPayload,
    ) -> DomainResult<()> {
        let gateway = session.last_rx_info_set.first().map(|rx| rx.mac.to_string());
        info!(
            dev_eui = %session.dev_eui,
            dev_addr = %session.dev_addr,
            rx_delay = session.rx_delay,
            gateway = ?gateway,
            phy_payload = %hex::encode(phy_payload.to_bytes()),
            "Join-accept scheduled"
        );
        Ok(())
    }
}
