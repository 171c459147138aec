use crate::lorawan::LorawanError;
use std::fmt;
use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Coarse error classification used by callers to decide how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Legitimate terminal signal (empty queue, unknown row)
    NotFound,
    /// Request rejected by a protocol or business rule
    Validation,
    /// Remote application-server / join-server / dispatch failure or timeout
    Upstream,
    /// Persistence failure
    Storage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Validation => "validation",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Storage => "storage",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Device-queue item not found: {0}")]
    DeviceQueueItemNotFound(i64),

    #[error("Device-queue is empty for device: {0}")]
    DeviceQueueEmpty(String),

    #[error("Device-queue item already exists: {0}")]
    DeviceQueueItemAlreadyExists(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device-profile not found: {0}")]
    DeviceProfileNotFound(String),

    #[error("Service-profile not found: {0}")]
    ServiceProfileNotFound(String),

    #[error("Routing-profile not found: {0}")]
    RoutingProfileNotFound(String),

    #[error("Device-session not found: {0}")]
    DeviceSessionNotFound(String),

    #[error("Application-server client not found: {0}")]
    ApplicationServerNotFound(String),

    #[error("Join-server client not found: {0}")]
    JoinServerNotFound(String),

    #[error("Invalid DevNonce {dev_nonce} for device {dev_eui}")]
    InvalidDevNonce { dev_eui: String, dev_nonce: u16 },

    #[error("Device does not support join: {0}")]
    JoinNotSupported(String),

    #[error("Unsupported KEK label on session key: {0}")]
    UnsupportedKekLabel(String),

    #[error("Invalid MType: expected {expected}, got {actual}")]
    InvalidMType { expected: String, actual: String },

    #[error("Invalid PHYPayload: {0}")]
    InvalidPhyPayload(#[from] LorawanError),

    #[error("Device-queue discard limit of {limit} exceeded for device {dev_eui}")]
    QueueDiscardLimitExceeded { dev_eui: String, limit: usize },

    #[error("Upstream error: {0}")]
    UpstreamError(String),

    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),

    #[error("DevAddr allocation failed after {0} attempts")]
    DevAddrAllocationFailed(usize),

    #[error("Join stage {stage} failed: {source}")]
    JoinStageFailed {
        stage: String,
        #[source]
        source: Box<DomainError>,
    },

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}

impl DomainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::DeviceQueueItemNotFound(_)
            | DomainError::DeviceQueueEmpty(_)
            | DomainError::DeviceNotFound(_)
            | DomainError::DeviceProfileNotFound(_)
            | DomainError::ServiceProfileNotFound(_)
            | DomainError::RoutingProfileNotFound(_)
            | DomainError::DeviceSessionNotFound(_)
            | DomainError::ApplicationServerNotFound(_)
            | DomainError::JoinServerNotFound(_) => ErrorKind::NotFound,
            DomainError::DeviceQueueItemAlreadyExists(_)
            | DomainError::InvalidDevNonce { .. }
            | DomainError::JoinNotSupported(_)
            | DomainError::UnsupportedKekLabel(_)
            | DomainError::InvalidMType { .. }
            | DomainError::InvalidPhyPayload(_)
            | DomainError::QueueDiscardLimitExceeded { .. } => ErrorKind::Validation,
            DomainError::UpstreamError(_) | DomainError::UpstreamTimeout(_) => {
                ErrorKind::Upstream
            }
            DomainError::DevAddrAllocationFailed(_) | DomainError::RepositoryError(_) => {
                ErrorKind::Storage
            }
            DomainError::JoinStageFailed { source, .. } => source.kind(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}
