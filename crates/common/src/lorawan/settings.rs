use crate::lorawan::error::{LorawanError, LorawanResult};
use serde::{Deserialize, Serialize};

const CF_LIST_MAX_FREQUENCIES: usize = 5;

/// Downlink settings sent to the device in the join-accept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DlSettings {
    pub rx2_data_rate: u8,
    pub rx1_dr_offset: u8,
}

impl DlSettings {
    pub fn to_byte(&self) -> u8 {
        ((self.rx1_dr_offset & 0x07) << 4) | (self.rx2_data_rate & 0x0f)
    }
}

/// Optional list of extra channel frequencies (Hz) for regions with a
/// dynamic channel plan
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CfList {
    frequencies: Vec<u32>,
}

impl CfList {
    pub fn new(frequencies: Vec<u32>) -> LorawanResult<Self> {
        if frequencies.len() > CF_LIST_MAX_FREQUENCIES {
            return Err(LorawanError::CfListTooLong(frequencies.len()));
        }
        Ok(Self { frequencies })
    }

    pub fn frequencies(&self) -> &[u32] {
        &self.frequencies
    }

    /// 16-byte wire representation: five 24-bit little-endian frequencies
    /// in units of 100 Hz, followed by the CFListType byte (0)
    pub fn to_bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        for (i, freq) in self.frequencies.iter().enumerate() {
            let value = (freq / 100).to_le_bytes();
            out[i * 3..i * 3 + 3].copy_from_slice(&value[..3]);
        }
        out
    }
}
