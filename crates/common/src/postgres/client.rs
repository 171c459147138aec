use crate::domain::{DomainError, DomainResult};
use crate::postgres::PostgresConfig;
use anyhow::{Context, Result};
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tracing::debug;

/// Tables the repositories read and write. `ping` refuses to report a
/// healthy database while any of them is missing.
const REQUIRED_TABLES: [&str; 7] = [
    "device_profile",
    "service_profile",
    "routing_profile",
    "device",
    "device_queue",
    "device_activation",
    "device_nonce",
];

/// Pooled handle to the network-server database
#[derive(Clone)]
pub struct PostgresClient {
    pool: Pool,
}

impl PostgresClient {
    pub fn new(config: &PostgresConfig) -> Result<Self> {
        let mut cfg = Config::new();
        cfg.host = Some(config.host.clone());
        cfg.port = Some(config.port);
        cfg.dbname = Some(config.database.clone());
        cfg.user = Some(config.username.clone());
        cfg.password = Some(config.password.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .with_context(|| format!("failed to create pool for {}:{}", config.host, config.port))?;
        pool.resize(config.max_pool_size);

        Ok(Self { pool })
    }

    /// Checks connectivity and that the schema has been migrated
    pub async fn ping(&self) -> Result<()> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_one(
                "SELECT count(*) FROM information_schema.tables
                 WHERE table_schema = current_schema() AND table_name::text = ANY($1::text[])",
                &[&REQUIRED_TABLES.as_slice()],
            )
            .await?;
        let found: i64 = row.get(0);
        anyhow::ensure!(
            found == REQUIRED_TABLES.len() as i64,
            "network-server schema incomplete: {found} of {} tables present",
            REQUIRED_TABLES.len()
        );

        debug!(tables = found, "postgres schema check passed");
        Ok(())
    }

    pub async fn connection(&self) -> DomainResult<deadpool_postgres::Client> {
        self.pool
            .get()
            .await
            .context("failed to check out postgres connection")
            .map_err(DomainError::RepositoryError)
    }
}
