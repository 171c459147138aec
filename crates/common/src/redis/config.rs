use serde::{Deserialize, Serialize};

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    /// Expiry of device sessions and DevAddr reservations
    pub device_session_ttl_secs: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            device_session_ttl_secs: 60 * 60 * 24 * 31,
        }
    }
}
