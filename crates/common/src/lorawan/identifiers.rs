use crate::lorawan::error::{LorawanError, LorawanResult};
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Defines a fixed-size byte identifier that displays, parses and
/// serializes as a lowercase hex string (most significant byte first).
macro_rules! hex_identifier {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            /// Reads the identifier from its little-endian wire representation
            pub fn from_le_bytes(bytes: &[u8]) -> LorawanResult<Self> {
                let mut value = Self::try_from(bytes)?;
                value.0.reverse();
                Ok(value)
            }

            /// Returns the little-endian wire representation
            pub fn to_le_bytes(&self) -> [u8; $len] {
                let mut bytes = self.0;
                bytes.reverse();
                bytes
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = LorawanError;

            fn try_from(bytes: &[u8]) -> LorawanResult<Self> {
                let array: [u8; $len] =
                    bytes
                        .try_into()
                        .map_err(|_| LorawanError::InvalidLength {
                            name: stringify!($name),
                            expected: $len,
                            actual: bytes.len(),
                        })?;
                Ok(Self(array))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", hex::encode(self.0))
            }
        }

        impl FromStr for $name {
            type Err = LorawanError;

            fn from_str(s: &str) -> LorawanResult<Self> {
                let bytes = hex::decode(s.trim())?;
                Self::try_from(bytes.as_slice())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_identifier!(
    /// IEEE EUI-64, used for DevEUI, JoinEUI (AppEUI) and gateway MACs
    Eui64,
    8
);

hex_identifier!(
    /// Short network-assigned device address
    DevAddr,
    4
);

hex_identifier!(
    /// 24-bit network identifier
    NetId,
    3
);

hex_identifier!(
    /// AES-128 session or root key
    Aes128Key,
    16
);

/// Per-join nonce sent by the device in the join-request
pub type DevNonce = u16;

impl NetId {
    /// NwkID: the 7 least significant bits of the NetID
    pub fn nwk_id(&self) -> u8 {
        self.0[2] & 0x7f
    }
}

impl DevAddr {
    /// Returns the NwkID encoded in the 7 most significant bits
    pub fn nwk_id(&self) -> u8 {
        self.0[0] >> 1
    }

    /// Overwrites the address prefix with the NwkID of the given NetID
    pub fn set_addr_prefix(&mut self, net_id: &NetId) {
        self.0[0] = (self.0[0] & 0x01) | (net_id.nwk_id() << 1);
    }

    /// Generates a random address carrying the NetID prefix
    pub fn random(net_id: &NetId) -> Self {
        let mut addr = DevAddr::default();
        rand::thread_rng().fill_bytes(&mut addr.0);
        addr.set_addr_prefix(net_id);
        addr
    }
}
