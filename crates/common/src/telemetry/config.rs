use opentelemetry_sdk::{logs::LoggerProvider, trace::TracerProvider as SdkTracerProvider};

#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub service_version: String,
    /// Hex NetID of the network this instance serves, attached to every
    /// exported span and log record
    pub net_id: Option<String>,
    pub otel_endpoint: String,
    pub otel_enabled: bool,
    /// Fallback filter directive when `RUST_LOG` is unset
    pub log_level: String,
}

impl TelemetryConfig {
    pub fn for_network(service_name: &str, net_id: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            net_id: Some(net_id.to_string()),
            ..Self::default()
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "network-server".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            net_id: None,
            otel_endpoint: "http://localhost:4317".to_string(),
            otel_enabled: false,
            log_level: "info".to_string(),
        }
    }
}

/// Exporting providers; hand them to `shutdown_telemetry` before exit so
/// buffered spans and logs are flushed
pub struct TelemetryProviders {
    pub tracer_provider: SdkTracerProvider,
    pub logger_provider: LoggerProvider,
}
