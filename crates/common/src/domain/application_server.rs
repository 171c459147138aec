use crate::domain::result::{DomainError, DomainResult};
use crate::lorawan::Eui64;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Acknowledgement status of a confirmed downlink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleDownlinkAckRequest {
    pub dev_eui: Eui64,
    pub f_cnt: u32,
    pub acknowledged: bool,
}

/// Reason a device-queue item was dropped by the network-server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    /// Frame-counter of the item exceeds the max frame-counter gap
    DeviceQueueItemFcnt,
    /// Payload does not fit the max payload size of the data rate
    DeviceQueueItemSize,
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorType::DeviceQueueItemFcnt => f.write_str("DEVICE_QUEUE_ITEM_FCNT"),
            ErrorType::DeviceQueueItemSize => f.write_str("DEVICE_QUEUE_ITEM_SIZE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleErrorRequest {
    pub dev_eui: Eui64,
    pub error_type: ErrorType,
    pub f_cnt: u32,
    pub error: String,
}

/// Client of the application-server owning a device
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ApplicationServerClient: Send + Sync {
    async fn handle_downlink_ack(&self, request: HandleDownlinkAckRequest) -> DomainResult<()>;

    async fn handle_error(&self, request: HandleErrorRequest) -> DomainResult<()>;
}

/// Resolves application-server clients by application-server ID
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ApplicationServerPool: Send + Sync {
    async fn get(&self, as_id: &str) -> DomainResult<Arc<dyn ApplicationServerClient>>;
}

/// Application-server pool backed by an explicitly populated registry
#[derive(Default)]
pub struct StaticApplicationServerPool {
    clients: RwLock<HashMap<String, Arc<dyn ApplicationServerClient>>>,
}

impl StaticApplicationServerPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, as_id: impl Into<String>, client: Arc<dyn ApplicationServerClient>) {
        let mut clients = self.clients.write().await;
        clients.insert(as_id.into(), client);
    }

    pub async fn remove(&self, as_id: &str) -> Option<Arc<dyn ApplicationServerClient>> {
        let mut clients = self.clients.write().await;
        clients.remove(as_id)
    }
}

#[async_trait]
impl ApplicationServerPool for StaticApplicationServerPool {
    async fn get(&self, as_id: &str) -> DomainResult<Arc<dyn ApplicationServerClient>> {
        let clients = self.clients.read().await;
        clients
            .get(as_id)
            .cloned()
            .ok_or_else(|| DomainError::ApplicationServerNotFound(as_id.to_string()))
    }
}
