use crate::lorawan::error::{LorawanError, LorawanResult};
use crate::lorawan::identifiers::{DevNonce, Eui64};
use std::fmt;

/// Size of the message integrity code trailing every PHYPayload
pub const MIC_SIZE: usize = 4;

const JOIN_REQUEST_MAC_PAYLOAD_SIZE: usize = 18;

/// LoRaWAN message types (3 most significant bits of the MHDR)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MType {
    JoinRequest = 0x00,
    JoinAccept = 0x01,
    UnconfirmedDataUp = 0x02,
    UnconfirmedDataDown = 0x03,
    ConfirmedDataUp = 0x04,
    ConfirmedDataDown = 0x05,
    RejoinRequest = 0x06,
    Proprietary = 0x07,
}

impl MType {
    fn from_mhdr_byte(byte: u8) -> Self {
        match byte >> 5 {
            0x00 => MType::JoinRequest,
            0x01 => MType::JoinAccept,
            0x02 => MType::UnconfirmedDataUp,
            0x03 => MType::UnconfirmedDataDown,
            0x04 => MType::ConfirmedDataUp,
            0x05 => MType::ConfirmedDataDown,
            0x06 => MType::RejoinRequest,
            _ => MType::Proprietary,
        }
    }
}

impl fmt::Display for MType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MType::JoinRequest => "JoinRequest",
            MType::JoinAccept => "JoinAccept",
            MType::UnconfirmedDataUp => "UnconfirmedDataUp",
            MType::UnconfirmedDataDown => "UnconfirmedDataDown",
            MType::ConfirmedDataUp => "ConfirmedDataUp",
            MType::ConfirmedDataDown => "ConfirmedDataDown",
            MType::RejoinRequest => "RejoinRequest",
            MType::Proprietary => "Proprietary",
        };
        f.write_str(name)
    }
}

/// MAC header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mhdr {
    pub mtype: MType,
    pub major: u8,
}

impl Mhdr {
    pub fn to_byte(&self) -> u8 {
        ((self.mtype as u8) << 5) | (self.major & 0x03)
    }

    pub fn from_byte(byte: u8) -> LorawanResult<Self> {
        let major = byte & 0x03;
        if major != 0 {
            return Err(LorawanError::UnsupportedMajor(major));
        }
        Ok(Self {
            mtype: MType::from_mhdr_byte(byte),
            major,
        })
    }
}

/// Join-request MACPayload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinRequestPayload {
    pub join_eui: Eui64,
    pub dev_eui: Eui64,
    pub dev_nonce: DevNonce,
}

impl JoinRequestPayload {
    fn from_bytes(bytes: &[u8]) -> LorawanResult<Self> {
        if bytes.len() != JOIN_REQUEST_MAC_PAYLOAD_SIZE {
            return Err(LorawanError::InvalidLength {
                name: "JoinRequestPayload",
                expected: JOIN_REQUEST_MAC_PAYLOAD_SIZE,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            join_eui: Eui64::from_le_bytes(&bytes[0..8])?,
            dev_eui: Eui64::from_le_bytes(&bytes[8..16])?,
            dev_nonce: u16::from_le_bytes([bytes[16], bytes[17]]),
        })
    }

    fn to_bytes(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(JOIN_REQUEST_MAC_PAYLOAD_SIZE);
        out.extend_from_slice(&self.join_eui.to_le_bytes());
        out.extend_from_slice(&self.dev_eui.to_le_bytes());
        out.extend_from_slice(&self.dev_nonce.to_le_bytes());
        out
    }
}

/// MACPayload discriminated by MType
///
/// Anything other than a join-request is kept as opaque bytes: the
/// join-accept is encrypted by the join-server and data frames are handled
/// outside of this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacPayload {
    JoinRequest(JoinRequestPayload),
    Opaque(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhyPayload {
    pub mhdr: Mhdr,
    pub mac_payload: MacPayload,
    pub mic: [u8; MIC_SIZE],
}

impl PhyPayload {
    pub fn from_bytes(bytes: &[u8]) -> LorawanResult<Self> {
        if bytes.len() < 1 + MIC_SIZE {
            return Err(LorawanError::PayloadTooShort(bytes.len()));
        }

        let mhdr = Mhdr::from_byte(bytes[0])?;
        let body = &bytes[1..bytes.len() - MIC_SIZE];
        let mut mic = [0u8; MIC_SIZE];
        mic.copy_from_slice(&bytes[bytes.len() - MIC_SIZE..]);

        let mac_payload = match mhdr.mtype {
            MType::JoinRequest => MacPayload::JoinRequest(JoinRequestPayload::from_bytes(body)?),
            _ => MacPayload::Opaque(body.to_vec()),
        };

        Ok(Self {
            mhdr,
            mac_payload,
            mic,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![self.mhdr.to_byte()];
        match &self.mac_payload {
            MacPayload::JoinRequest(pl) => out.extend_from_slice(&pl.to_bytes()),
            MacPayload::Opaque(body) => out.extend_from_slice(body),
        }
        out.extend_from_slice(&self.mic);
        out
    }

    pub fn mtype(&self) -> MType {
        self.mhdr.mtype
    }

    /// Returns the join-request payload when this frame is a join-request
    pub fn join_request(&self) -> Option<&JoinRequestPayload> {
        match &self.mac_payload {
            MacPayload::JoinRequest(pl) if self.mhdr.mtype == MType::JoinRequest => Some(pl),
            _ => None,
        }
    }
}
