//! Minimal LoRaWAN wire types consumed by the network-server core.
//!
//! Only what the device-state core needs is modelled here: identifiers,
//! session keys, MHDR/MType discrimination, join-request field extraction and
//! the join settings carried in the join-server envelope. MIC verification
//! and FRMPayload encryption belong to the frame handling layer.

mod error;
mod identifiers;
mod phy_payload;
mod settings;

pub use error::*;
pub use identifiers::*;
pub use phy_payload::*;
pub use settings::*;
