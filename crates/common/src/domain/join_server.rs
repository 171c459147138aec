use crate::domain::result::{DomainError, DomainResult};
use crate::lorawan::{Aes128Key, CfList, DevAddr, DlSettings, Eui64};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Backend interfaces protocol version used for join-server messages
pub const PROTOCOL_VERSION_1_0: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    JoinReq,
    JoinAns,
}

/// Envelope fields shared by every backend message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasePayload {
    pub protocol_version: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub transaction_id: u32,
    pub message_type: MessageType,
}

/// Join-request forwarded to the join-server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinReqPayload {
    pub base: BasePayload,
    pub mac_version: String,
    #[serde(with = "hex_bytes")]
    pub phy_payload: Vec<u8>,
    pub dev_eui: Eui64,
    pub dev_addr: DevAddr,
    pub dl_settings: DlSettings,
    pub rx_delay: u8,
    pub cf_list: Option<CfList>,
}

/// Session key as delivered by the join-server
///
/// A non-empty `kek_label` means `aes_key` is wrapped with a key-encryption
/// key that this network-server does not hold.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyEnvelope {
    pub kek_label: String,
    pub aes_key: Aes128Key,
}

/// Join-answer returned by the join-server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinAnsPayload {
    #[serde(with = "hex_bytes")]
    pub phy_payload: Vec<u8>,
    pub nwk_s_key: KeyEnvelope,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

/// Client of a join-server
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait JoinServerClient: Send + Sync {
    async fn join_request(&self, request: JoinReqPayload) -> DomainResult<JoinAnsPayload>;
}

/// Resolves join-server clients by JoinEUI
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait JoinServerPool: Send + Sync {
    async fn get(&self, join_eui: &Eui64) -> DomainResult<Arc<dyn JoinServerClient>>;
}

/// Join-server pool with per-JoinEUI clients and an optional fallback
#[derive(Default)]
pub struct StaticJoinServerPool {
    clients: RwLock<HashMap<Eui64, Arc<dyn JoinServerClient>>>,
    default_client: Option<Arc<dyn JoinServerClient>>,
}

impl StaticJoinServerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pool that falls back to `client` for unknown JoinEUIs
    pub fn with_default(client: Arc<dyn JoinServerClient>) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            default_client: Some(client),
        }
    }

    pub async fn register(&self, join_eui: Eui64, client: Arc<dyn JoinServerClient>) {
        let mut clients = self.clients.write().await;
        clients.insert(join_eui, client);
    }
}

#[async_trait]
impl JoinServerPool for StaticJoinServerPool {
    async fn get(&self, join_eui: &Eui64) -> DomainResult<Arc<dyn JoinServerClient>> {
        let clients = self.clients.read().await;
        clients
            .get(join_eui)
            .cloned()
            .or_else(|| self.default_client.clone())
            .ok_or_else(|| DomainError::JoinServerNotFound(join_eui.to_string()))
    }
}
