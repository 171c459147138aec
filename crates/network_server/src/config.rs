use crate::domain::{DEFAULT_MAX_FCNT_GAP, DEFAULT_MAX_QUEUE_DISCARDS, NetworkSettings};
use anyhow::{Context, Result};
use common::lorawan::{CfList, NetId};
use common::postgres::PostgresConfig;
use common::redis::RedisConfig;
use common::telemetry::TelemetryConfig;
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // Network configuration
    /// NetID of the network (hex, 3 bytes)
    #[serde(default = "default_net_id")]
    pub net_id: String,

    /// Max tolerated gap between the expected and a queued downlink frame-counter
    #[serde(default = "default_max_fcnt_gap")]
    pub max_fcnt_gap: u32,

    /// RX1 delay in seconds announced in the join-accept
    #[serde(default = "default_rx1_delay")]
    pub rx1_delay: u8,

    #[serde(default = "default_rx1_dr_offset")]
    pub rx1_dr_offset: u8,

    #[serde(default = "default_rx2_dr")]
    pub rx2_dr: u8,

    /// Comma-separated channel indices enabled for newly activated devices
    #[serde(default = "default_enabled_channels")]
    pub enabled_channels: String,

    /// Comma-separated extra channel frequencies (Hz) sent as CFList
    #[serde(default)]
    pub cf_list: String,

    /// Max device-queue items discarded while selecting one downlink
    #[serde(default = "default_max_queue_discards")]
    pub max_queue_discards: usize,

    #[serde(default = "default_dev_addr_allocation_attempts")]
    pub dev_addr_allocation_attempts: usize,

    // Upstream timeouts
    #[serde(default = "default_application_server_timeout_ms")]
    pub application_server_timeout_ms: u64,

    #[serde(default = "default_join_server_timeout_ms")]
    pub join_server_timeout_ms: u64,

    #[serde(default = "default_dispatch_timeout_ms")]
    pub dispatch_timeout_ms: u64,

    // PostgreSQL configuration
    /// PostgreSQL host
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    /// PostgreSQL port
    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    /// PostgreSQL database name
    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    /// PostgreSQL username
    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    /// PostgreSQL password
    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,

    /// Path to PostgreSQL migrations directory
    #[serde(default = "default_postgres_migrations_dir")]
    pub postgres_migrations_dir: String,

    /// Path to goose binary
    #[serde(default = "default_postgres_goose_binary_path")]
    pub postgres_goose_binary_path: String,

    /// Apply pending migrations on startup
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,

    // Redis configuration
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Expiry of device sessions and DevAddr reservations in seconds
    #[serde(default = "default_device_session_ttl_secs")]
    pub device_session_ttl_secs: u64,

    // OpenTelemetry configuration
    /// OpenTelemetry OTLP endpoint
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    /// Enable OpenTelemetry export
    #[serde(default = "default_otel_enabled")]
    pub otel_enabled: bool,

    /// Service name reported to OpenTelemetry
    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_net_id() -> String {
    "000000".to_string()
}

fn default_max_fcnt_gap() -> u32 {
    DEFAULT_MAX_FCNT_GAP
}

fn default_rx1_delay() -> u8 {
    1
}

fn default_rx1_dr_offset() -> u8 {
    0
}

fn default_rx2_dr() -> u8 {
    0
}

fn default_enabled_channels() -> String {
    "0,1,2".to_string()
}

fn default_max_queue_discards() -> usize {
    DEFAULT_MAX_QUEUE_DISCARDS
}

fn default_dev_addr_allocation_attempts() -> usize {
    16
}

fn default_application_server_timeout_ms() -> u64 {
    5000
}

fn default_join_server_timeout_ms() -> u64 {
    5000
}

fn default_dispatch_timeout_ms() -> u64 {
    1000
}

// PostgreSQL defaults
fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "loraserver_ns".to_string()
}

fn default_postgres_username() -> String {
    "loraserver_ns".to_string()
}

fn default_postgres_password() -> String {
    "loraserver_ns".to_string()
}

fn default_postgres_max_pool_size() -> usize {
    10
}

fn default_postgres_migrations_dir() -> String {
    "/home/network-server/migrations/postgres".to_string()
}

fn default_postgres_goose_binary_path() -> String {
    "goose".to_string()
}

fn default_run_migrations() -> bool {
    true
}

// Redis defaults
fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_device_session_ttl_secs() -> u64 {
    60 * 60 * 24 * 31
}

// OpenTelemetry defaults
fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_enabled() -> bool {
    false
}

fn default_otel_service_name() -> String {
    "network-server".to_string()
}

impl ServiceConfig {
    /// Load configuration from environment variables prefixed with `LORASERVER_`
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("LORASERVER"))
            .build()?
            .try_deserialize()
    }

    pub fn to_network_settings(&self) -> Result<NetworkSettings> {
        let net_id: NetId = self
            .net_id
            .parse()
            .with_context(|| format!("invalid net_id: {}", self.net_id))?;

        Ok(NetworkSettings {
            net_id,
            max_fcnt_gap: self.max_fcnt_gap,
            rx1_delay: self.rx1_delay,
            rx1_dr_offset: self.rx1_dr_offset,
            rx2_dr: self.rx2_dr,
            enabled_channels: parse_list(&self.enabled_channels)
                .context("invalid enabled_channels")?,
            cf_list: parse_cf_list(&self.cf_list)?,
            max_queue_discards: self.max_queue_discards,
            application_server_timeout: Duration::from_millis(self.application_server_timeout_ms),
            join_server_timeout: Duration::from_millis(self.join_server_timeout_ms),
            dispatch_timeout: Duration::from_millis(self.dispatch_timeout_ms),
        })
    }

    pub fn to_telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            otel_endpoint: self.otel_endpoint.clone(),
            otel_enabled: self.otel_enabled,
            log_level: self.log_level.clone(),
            ..TelemetryConfig::for_network(&self.otel_service_name, &self.net_id)
        }
    }

    pub fn to_postgres_config(&self) -> PostgresConfig {
        PostgresConfig {
            host: self.postgres_host.clone(),
            port: self.postgres_port,
            database: self.postgres_database.clone(),
            username: self.postgres_username.clone(),
            password: self.postgres_password.clone(),
            max_pool_size: self.postgres_max_pool_size,
            migrations_dir: self.postgres_migrations_dir.clone(),
            goose_binary_path: self.postgres_goose_binary_path.clone(),
        }
    }

    pub fn to_redis_config(&self) -> RedisConfig {
        RedisConfig {
            url: self.redis_url.clone(),
            device_session_ttl_secs: self.device_session_ttl_secs,
        }
    }
}

fn parse_list<T>(value: &str) -> Result<Vec<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<T>().with_context(|| format!("invalid value: {s}")))
        .collect()
}

fn parse_cf_list(value: &str) -> Result<Option<CfList>> {
    let frequencies: Vec<u32> = parse_list(value).context("invalid cf_list")?;
    if frequencies.is_empty() {
        return Ok(None);
    }
    Ok(Some(CfList::new(frequencies)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to ensure tests run serially and don't interfere with each other
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    const VARS: [&str; 5] = [
        "LORASERVER_LOG_LEVEL",
        "LORASERVER_NET_ID",
        "LORASERVER_ENABLED_CHANNELS",
        "LORASERVER_CF_LIST",
        "LORASERVER_JOIN_SERVER_TIMEOUT_MS",
    ];

    fn clear_env() {
        for var in VARS {
            // SAFETY: Test runs with mutex lock to prevent concurrent env access
            unsafe {
                std::env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_default_config() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_env();

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.max_fcnt_gap, 16384);

        let settings = config.to_network_settings().unwrap();
        assert_eq!(settings.net_id, NetId([0, 0, 0]));
        assert_eq!(settings.enabled_channels, vec![0, 1, 2]);
        assert_eq!(settings.cf_list, None);
        assert_eq!(settings.max_queue_discards, 1024);
        assert_eq!(settings.dispatch_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_custom_config() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_env();

        // SAFETY: Test runs with mutex lock to prevent concurrent env access
        unsafe {
            std::env::set_var("LORASERVER_LOG_LEVEL", "debug");
            std::env::set_var("LORASERVER_NET_ID", "000013");
            std::env::set_var("LORASERVER_ENABLED_CHANNELS", "0, 1, 2, 3, 4");
            std::env::set_var("LORASERVER_CF_LIST", "867100000,867300000");
            std::env::set_var("LORASERVER_JOIN_SERVER_TIMEOUT_MS", "250");
        }

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.to_telemetry_config().log_level, "debug");

        let settings = config.to_network_settings().unwrap();
        assert_eq!(settings.net_id, NetId([0x00, 0x00, 0x13]));
        assert_eq!(settings.enabled_channels, vec![0, 1, 2, 3, 4]);
        assert_eq!(
            settings.cf_list.unwrap().frequencies(),
            &[867_100_000, 867_300_000]
        );
        assert_eq!(settings.join_server_timeout, Duration::from_millis(250));

        clear_env();
    }

    #[test]
    fn test_invalid_net_id() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_env();

        // SAFETY: Test runs with mutex lock to prevent concurrent env access
        unsafe {
            std::env::set_var("LORASERVER_NET_ID", "zz");
        }

        let config = ServiceConfig::from_env().unwrap();
        assert!(config.to_network_settings().is_err());

        clear_env();
    }

    #[test]
    fn test_postgres_config_conversion() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_env();

        let config = ServiceConfig::from_env().unwrap();
        let postgres = config.to_postgres_config();
        assert_eq!(postgres.port, 5432);
        assert_eq!(postgres.database, "loraserver_ns");
        assert_eq!(config.to_redis_config().url, "redis://localhost:6379");
    }
}
