use crate::domain::{DeviceSession, DeviceSessionStore, DomainError, DomainResult};
use crate::lorawan::{DevAddr, Eui64, NetId};
use crate::redis::RedisClient;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

fn device_session_key(dev_eui: &Eui64) -> String {
    format!("lora:ns:device:{dev_eui}")
}

fn dev_addr_key(dev_addr: &DevAddr) -> String {
    format!("lora:ns:devaddr:{dev_addr}")
}

fn mac_command_queue_key(dev_eui: &Eui64) -> String {
    format!("lora:ns:device:{dev_eui}:mac:queue")
}

/// Redis implementation of DeviceSessionStore
///
/// Sessions are stored as JSON. DevAddr reservations use `SET NX` so that two
/// concurrent joins can never be handed the same address.
#[derive(Clone)]
pub struct RedisDeviceSessionStore {
    client: RedisClient,
    ttl: Duration,
    allocation_attempts: usize,
}

impl RedisDeviceSessionStore {
    pub fn new(client: RedisClient, ttl: Duration, allocation_attempts: usize) -> Self {
        Self {
            client,
            ttl,
            allocation_attempts,
        }
    }

    fn ttl_millis(&self) -> u64 {
        u64::try_from(self.ttl.as_millis()).unwrap_or(u64::MAX)
    }
}

#[async_trait]
impl DeviceSessionStore for RedisDeviceSessionStore {
    #[instrument(skip(self, dev_eui), fields(dev_eui = %dev_eui))]
    async fn get_device_session(&self, dev_eui: &Eui64) -> DomainResult<Option<DeviceSession>> {
        let mut conn = self.client.connection();
        let value: Option<String> = redis::cmd("GET")
            .arg(device_session_key(dev_eui))
            .query_async::<_, Option<String>>(&mut conn)
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        match value {
            Some(json) => {
                let session = serde_json::from_str(&json)
                    .map_err(|e| DomainError::RepositoryError(e.into()))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, session), fields(dev_eui = %session.dev_eui, dev_addr = %session.dev_addr))]
    async fn save_device_session(&self, session: &DeviceSession) -> DomainResult<()> {
        let json =
            serde_json::to_string(session).map_err(|e| DomainError::RepositoryError(e.into()))?;

        let mut conn = self.client.connection();
        redis::cmd("SET")
            .arg(device_session_key(&session.dev_eui))
            .arg(json)
            .arg("PX")
            .arg(self.ttl_millis())
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        info!("device-session saved");
        Ok(())
    }

    #[instrument(skip(self, net_id, dev_eui), fields(net_id = %net_id, dev_eui = %dev_eui))]
    async fn allocate_dev_addr(&self, net_id: &NetId, dev_eui: &Eui64) -> DomainResult<DevAddr> {
        let mut conn = self.client.connection();

        for attempt in 1..=self.allocation_attempts {
            let dev_addr = DevAddr::random(net_id);
            let reserved: Option<String> = redis::cmd("SET")
                .arg(dev_addr_key(&dev_addr))
                .arg(dev_eui.to_string())
                .arg("NX")
                .arg("PX")
                .arg(self.ttl_millis())
                .query_async::<_, Option<String>>(&mut conn)
                .await
                .map_err(|e| DomainError::RepositoryError(e.into()))?;

            if reserved.is_some() {
                debug!(dev_addr = %dev_addr, attempt, "DevAddr reserved");
                return Ok(dev_addr);
            }
            debug!(dev_addr = %dev_addr, attempt, "DevAddr already taken");
        }

        warn!(attempts = self.allocation_attempts, "DevAddr allocation exhausted");
        Err(DomainError::DevAddrAllocationFailed(self.allocation_attempts))
    }

    #[instrument(skip(self, dev_eui), fields(dev_eui = %dev_eui))]
    async fn flush_mac_command_queue(&self, dev_eui: &Eui64) -> DomainResult<()> {
        let mut conn = self.client.connection();
        let removed: i64 = redis::cmd("DEL")
            .arg(mac_command_queue_key(dev_eui))
            .query_async::<_, i64>(&mut conn)
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        info!(removed, "mac-command queue flushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys() {
        let dev_eui: Eui64 = "0102030405060708".parse().unwrap();
        let dev_addr = DevAddr([0x26, 0x01, 0x02, 0x03]);

        assert_eq!(device_session_key(&dev_eui), "lora:ns:device:0102030405060708");
        assert_eq!(dev_addr_key(&dev_addr), "lora:ns:devaddr:26010203");
        assert_eq!(
            mac_command_queue_key(&dev_eui),
            "lora:ns:device:0102030405060708:mac:queue"
        );
    }
}
