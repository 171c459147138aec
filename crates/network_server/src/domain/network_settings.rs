use common::lorawan::{CfList, DlSettings, NetId};
use std::time::Duration;

/// Default tolerance between the expected and queued downlink frame-counter
pub const DEFAULT_MAX_FCNT_GAP: u32 = 16384;

/// Default cap on queue items discarded while selecting one downlink
pub const DEFAULT_MAX_QUEUE_DISCARDS: usize = 1024;

/// Network-wide settings consumed by the domain services
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    pub net_id: NetId,
    pub max_fcnt_gap: u32,

    pub rx1_delay: u8,
    pub rx1_dr_offset: u8,
    pub rx2_dr: u8,

    /// Channel indices enabled for newly activated devices
    pub enabled_channels: Vec<usize>,
    /// Extra channel frequencies announced in the join-accept
    pub cf_list: Option<CfList>,

    pub max_queue_discards: usize,

    pub application_server_timeout: Duration,
    pub join_server_timeout: Duration,
    pub dispatch_timeout: Duration,
}

impl NetworkSettings {
    pub fn dl_settings(&self) -> DlSettings {
        DlSettings {
            rx2_data_rate: self.rx2_dr,
            rx1_dr_offset: self.rx1_dr_offset,
        }
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            net_id: NetId::default(),
            max_fcnt_gap: DEFAULT_MAX_FCNT_GAP,
            rx1_delay: 1,
            rx1_dr_offset: 0,
            rx2_dr: 0,
            enabled_channels: vec![0, 1, 2],
            cf_list: None,
            max_queue_discards: DEFAULT_MAX_QUEUE_DISCARDS,
            application_server_timeout: Duration::from_secs(5),
            join_server_timeout: Duration::from_secs(5),
            dispatch_timeout: Duration::from_secs(1),
        }
    }
}
