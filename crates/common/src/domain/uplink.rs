use crate::domain::result::DomainResult;
use crate::lorawan::Eui64;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Radio metadata reported by one gateway for a received frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RxInfo {
    pub mac: Eui64,
    pub time: Option<DateTime<Utc>>,
    pub rssi: i32,
    pub lora_snr: f64,
    pub channel: u32,
    pub frequency: u32,
}

/// An uplink frame collected from one or more gateways
#[derive(Debug, Clone, PartialEq)]
pub struct RxPacket {
    pub phy_payload: Vec<u8>,
    pub rx_info_set: Vec<RxInfo>,
}

impl RxPacket {
    pub fn gateway_macs(&self) -> Vec<String> {
        self.rx_info_set.iter().map(|rx| rx.mac.to_string()).collect()
    }
}

/// Diagnostic sink for received uplink frames
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UplinkLogger: Send + Sync {
    async fn log_uplink(&self, dev_eui: &Eui64, packet: &RxPacket) -> DomainResult<()>;
}

/// `UplinkLogger` writing frames to the tracing subscriber
#[derive(Debug, Default, Clone)]
pub struct TracingUplinkLogger;

#[async_trait]
impl UplinkLogger for TracingUplinkLogger {
    async fn log_uplink(&self, dev_eui: &Eui64, packet: &RxPacket) -> DomainResult<()> {
        info!(
            dev_eui = %dev_eui,
            phy_payload = %hex::encode(&packet.phy_payload),
            gw_count = packet.rx_info_set.len(),
            "Uplink frame received"
        );
        Ok(())
    }
}
