use common::domain::{StaticApplicationServerPool, StaticJoinServerPool, TracingDownlinkDispatcher};
use common::telemetry::{TelemetryProviders, init_telemetry, shutdown_telemetry};
use network_server::config::ServiceConfig;
use network_server::{NetworkServer, NetworkServerUpstreams};
use std::sync::Arc;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let telemetry_providers: Option<TelemetryProviders> =
        match init_telemetry(&config.to_telemetry_config()) {
            Ok(providers) => providers,
            Err(e) => {
                eprintln!("Failed to initialize telemetry: {}", e);
                std::process::exit(1);
            }
        };

    info!(
        net_id = %config.net_id,
        otel_enabled = config.otel_enabled,
        "Starting network-server"
    );
    debug!("Configuration: {:?}", config);

    // Clients are registered by the surrounding deployment
    let upstreams = NetworkServerUpstreams::new(
        Arc::new(StaticApplicationServerPool::new()),
        Arc::new(StaticJoinServerPool::new()),
        Arc::new(TracingDownlinkDispatcher),
    );

    let _server = match NetworkServer::connect(&config, upstreams).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to initialize network-server: {:#}", e);
            shutdown_telemetry(telemetry_providers);
            std::process::exit(1);
        }
    };
    info!("Network-server ready");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutting down network-server");
    shutdown_telemetry(telemetry_providers);
}
