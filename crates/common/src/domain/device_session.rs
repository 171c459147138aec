use crate::domain::result::DomainResult;
use crate::domain::uplink::RxInfo;
use crate::lorawan::{Aes128Key, DevAddr, Eui64, NetId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Receive window used for class-A downlinks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RxWindow {
    #[default]
    Rx1,
    Rx2,
}

/// Live protocol state of an activated device
///
/// Exactly one session exists per device; saving a session replaces the
/// previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSession {
    pub device_profile_id: String,
    pub service_profile_id: String,
    pub routing_profile_id: String,

    pub dev_addr: DevAddr,
    pub dev_eui: Eui64,
    pub join_eui: Eui64,
    pub nwk_s_key: Aes128Key,
    pub f_cnt_up: u32,
    pub f_cnt_down: u32,

    pub rx_window: RxWindow,
    pub rx_delay: u8,
    pub rx1_dr_offset: u8,
    pub rx2_dr: u8,

    pub enabled_channels: Vec<usize>,
    pub last_rx_info_set: Vec<RxInfo>,
    pub max_supported_dr: u8,
}

/// Fast key/value store holding device sessions and per-device volatile state
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceSessionStore: Send + Sync {
    /// Get the current session of a device
    async fn get_device_session(&self, dev_eui: &Eui64) -> DomainResult<Option<DeviceSession>>;

    /// Save a session, replacing any previous session of the device
    async fn save_device_session(&self, session: &DeviceSession) -> DomainResult<()>;

    /// Reserve a random DevAddr carrying the NetID prefix for the device
    async fn allocate_dev_addr(&self, net_id: &NetId, dev_eui: &Eui64) -> DomainResult<DevAddr>;

    /// Drop all pending MAC-commands of the device
    async fn flush_mac_command_queue(&self, dev_eui: &Eui64) -> DomainResult<()>;
}
