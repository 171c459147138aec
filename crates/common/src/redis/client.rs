use anyhow::{Context, Result};
use redis::aio::MultiplexedConnection;
use tracing::debug;

/// Redis client holding a multiplexed connection shared by all callers
#[derive(Clone)]
pub struct RedisClient {
    connection: MultiplexedConnection,
}

impl RedisClient {
    /// Opens a multiplexed connection to the given `redis://` URL
    pub async fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("invalid redis url")?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .context("failed to connect to redis")?;

        Ok(Self { connection })
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection();
        let _: String = redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await?;
        debug!("redis connection successful");
        Ok(())
    }

    /// Returns a handle on the shared connection; handles are cheap to clone
    pub fn connection(&self) -> MultiplexedConnection {
        self.connection.clone()
    }
}
