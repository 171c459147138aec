use thiserror::Error;

pub type LorawanResult<T> = Result<T, LorawanError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LorawanError {
    #[error("Invalid length for {name}: expected {expected} bytes, got {actual}")]
    InvalidLength {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid hex encoding: {0}")]
    InvalidHex(String),

    #[error("PHYPayload too short: {0} bytes")]
    PayloadTooShort(usize),

    #[error("Unsupported LoRaWAN major version: {0}")]
    UnsupportedMajor(u8),

    #[error("CFList supports at most 5 frequencies, got {0}")]
    CfListTooLong(usize),
}

impl From<hex::FromHexError> for LorawanError {
    fn from(e: hex::FromHexError) -> Self {
        LorawanError::InvalidHex(e.to_string())
    }
}
