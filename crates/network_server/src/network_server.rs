use crate::config::ServiceConfig;
use crate::domain::{
    DeviceQueueService, DownlinkDataService, JoinRequestService, JoinRequestServiceDeps,
    NetworkSettings,
};
use anyhow::Result;
use common::domain::{
    ApplicationServerPool, DeviceActivationRepository, DeviceProfileRepository,
    DeviceQueueRepository, DeviceRepository, DeviceSessionStore, DownlinkDispatcher,
    JoinServerPool, RoutingProfileRepository, ServiceProfileRepository, TracingUplinkLogger,
    UplinkLogger,
};
use common::memory::{
    InMemoryDeviceActivationRepository, InMemoryDeviceQueueRepository, InMemoryDeviceRepository,
    InMemoryDeviceSessionStore,
};
use common::postgres::{
    PostgresClient, PostgresDeviceActivationRepository, PostgresDeviceQueueRepository,
    PostgresDeviceRepository, PostgresProfileRepository,
};
use common::redis::{RedisClient, RedisDeviceSessionStore};
use goose::MigrationRunner;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Storage collaborators shared by the services
#[derive(Clone)]
pub struct NetworkServerStores {
    pub devices: Arc<dyn DeviceRepository>,
    pub device_profiles: Arc<dyn DeviceProfileRepository>,
    pub service_profiles: Arc<dyn ServiceProfileRepository>,
    pub routing_profiles: Arc<dyn RoutingProfileRepository>,
    pub device_queue: Arc<dyn DeviceQueueRepository>,
    pub activations: Arc<dyn DeviceActivationRepository>,
    pub sessions: Arc<dyn DeviceSessionStore>,
}

/// Remote collaborators shared by the services
#[derive(Clone)]
pub struct NetworkServerUpstreams {
    pub application_servers: Arc<dyn ApplicationServerPool>,
    pub join_servers: Arc<dyn JoinServerPool>,
    pub dispatcher: Arc<dyn DownlinkDispatcher>,
    pub uplink_logger: Arc<dyn UplinkLogger>,
}

impl NetworkServerUpstreams {
    pub fn new(
        application_servers: Arc<dyn ApplicationServerPool>,
        join_servers: Arc<dyn JoinServerPool>,
        dispatcher: Arc<dyn DownlinkDispatcher>,
    ) -> Self {
        Self {
            application_servers,
            join_servers,
            dispatcher,
            uplink_logger: Arc::new(TracingUplinkLogger),
        }
    }
}

/// The device-state core with its services wired to one set of stores
pub struct NetworkServer {
    pub device_queue_service: Arc<DeviceQueueService>,
    pub downlink_data_service: Arc<DownlinkDataService>,
    pub join_request_service: Arc<JoinRequestService>,
}

impl NetworkServer {
    pub fn new(
        stores: NetworkServerStores,
        upstreams: NetworkServerUpstreams,
        settings: NetworkSettings,
    ) -> Self {
        debug!("Initializing network-server services");

        let device_queue_service = Arc::new(DeviceQueueService::new(
            stores.device_queue.clone(),
            stores.routing_profiles.clone(),
            upstreams.application_servers.clone(),
            &settings,
        ));
        let downlink_data_service = Arc::new(DownlinkDataService::new(
            device_queue_service.clone(),
            stores.device_queue.clone(),
        ));
        let join_request_service = Arc::new(JoinRequestService::new(
            JoinRequestServiceDeps {
                device_repository: stores.devices,
                device_profile_repository: stores.device_profiles,
                service_profile_repository: stores.service_profiles,
                activation_repository: stores.activations,
                queue_repository: stores.device_queue,
                session_store: stores.sessions,
                join_servers: upstreams.join_servers,
                dispatcher: upstreams.dispatcher,
                uplink_logger: upstreams.uplink_logger,
            },
            settings,
        ));

        Self {
            device_queue_service,
            downlink_data_service,
            join_request_service,
        }
    }

    /// Connect to PostgreSQL and Redis, apply migrations when enabled and
    /// wire the backed stores into the services
    pub async fn connect(config: &ServiceConfig, upstreams: NetworkServerUpstreams) -> Result<Self> {
        let settings = config.to_network_settings()?;
        let postgres_config = config.to_postgres_config();
        let redis_config = config.to_redis_config();

        if config.run_migrations {
            info!("Running PostgreSQL migrations...");
            MigrationRunner::postgres(
                postgres_config.goose_binary_path.clone(),
                postgres_config.migrations_dir.clone(),
                postgres_config.dsn(),
            )
            .run_migrations()
            .await?;
        }

        let postgres_client = PostgresClient::new(&postgres_config)?;
        postgres_client.ping().await?;
        info!(host = %postgres_config.host, "Connected to PostgreSQL");

        let redis_client = RedisClient::new(&redis_config.url).await?;
        redis_client.ping().await?;
        info!("Connected to Redis");

        let profiles = Arc::new(PostgresProfileRepository::new(postgres_client.clone()));
        let stores = NetworkServerStores {
            devices: Arc::new(PostgresDeviceRepository::new(postgres_client.clone())),
            device_profiles: profiles.clone(),
            service_profiles: profiles.clone(),
            routing_profiles: profiles,
            device_queue: Arc::new(PostgresDeviceQueueRepository::new(postgres_client.clone())),
            activations: Arc::new(PostgresDeviceActivationRepository::new(postgres_client)),
            sessions: Arc::new(RedisDeviceSessionStore::new(
                redis_client,
                Duration::from_secs(redis_config.device_session_ttl_secs),
                config.dev_addr_allocation_attempts,
            )),
        };

        Ok(Self::new(stores, upstreams, settings))
    }
}

/// Process-local stores, for single-node deployments and tests
#[derive(Clone, Default)]
pub struct InMemoryStores {
    pub devices: InMemoryDeviceRepository,
    pub device_queue: InMemoryDeviceQueueRepository,
    pub activations: InMemoryDeviceActivationRepository,
    pub sessions: InMemoryDeviceSessionStore,
}

impl InMemoryStores {
    pub fn new() -> Self {
        Self::default()
    }
}

impl From<InMemoryStores> for NetworkServerStores {
    fn from(stores: InMemoryStores) -> Self {
        let devices = Arc::new(stores.devices);
        Self {
            devices: devices.clone(),
            device_profiles: devices.clone(),
            service_profiles: devices.clone(),
            routing_profiles: devices,
            device_queue: Arc::new(stores.device_queue),
            activations: Arc::new(stores.activations),
            sessions: Arc::new(stores.sessions),
        }
    }
}
