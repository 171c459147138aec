use crate::domain::{DeviceSession, DeviceSessionStore, DomainError, DomainResult};
use crate::lorawan::{DevAddr, Eui64, NetId};
use async_trait::async_trait;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

const DEFAULT_ALLOCATION_ATTEMPTS: usize = 16;

#[derive(Default)]
struct SessionState {
    sessions: HashMap<Eui64, DeviceSession>,
    dev_addrs: HashMap<DevAddr, Eui64>,
    mac_command_queues: HashMap<Eui64, Vec<Vec<u8>>>,
}

/// In-memory implementation of DeviceSessionStore using HashMaps
#[derive(Clone)]
pub struct InMemoryDeviceSessionStore {
    state: Arc<RwLock<SessionState>>,
    allocation_attempts: usize,
}

impl InMemoryDeviceSessionStore {
    pub fn new() -> Self {
        Self::with_allocation_attempts(DEFAULT_ALLOCATION_ATTEMPTS)
    }

    pub fn with_allocation_attempts(allocation_attempts: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionState::default())),
            allocation_attempts,
        }
    }

    /// Queue a raw MAC-command for the device
    pub async fn push_mac_command(&self, dev_eui: Eui64, command: Vec<u8>) {
        let mut state = self.state.write().await;
        state
            .mac_command_queues
            .entry(dev_eui)
            .or_default()
            .push(command);
    }

    pub async fn pending_mac_commands(&self, dev_eui: &Eui64) -> Vec<Vec<u8>> {
        let state = self.state.read().await;
        state
            .mac_command_queues
            .get(dev_eui)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for InMemoryDeviceSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceSessionStore for InMemoryDeviceSessionStore {
    async fn get_device_session(&self, dev_eui: &Eui64) -> DomainResult<Option<DeviceSession>> {
        let state = self.state.read().await;
        Ok(state.sessions.get(dev_eui).cloned())
    }

    /// Saving a session releases every other DevAddr the device still holds,
    /// covering both the replaced session and reservations of failed joins
    async fn save_device_session(&self, session: &DeviceSession) -> DomainResult<()> {
        let mut state = self.state.write().await;

        let before = state.dev_addrs.len();
        state
            .dev_addrs
            .retain(|dev_addr, owner| *owner != session.dev_eui || *dev_addr == session.dev_addr);
        let released = before - state.dev_addrs.len();
        state.dev_addrs.insert(session.dev_addr, session.dev_eui);

        state.sessions.insert(session.dev_eui, session.clone());
        info!(
            dev_eui = %session.dev_eui,
            dev_addr = %session.dev_addr,
            released,
            "device-session saved"
        );
        Ok(())
    }

    async fn allocate_dev_addr(&self, net_id: &NetId, dev_eui: &Eui64) -> DomainResult<DevAddr> {
        let mut state = self.state.write().await;

        for _ in 0..self.allocation_attempts {
            let dev_addr = DevAddr::random(net_id);
            if let Entry::Vacant(entry) = state.dev_addrs.entry(dev_addr) {
                entry.insert(*dev_eui);
                debug!(dev_eui = %dev_eui, dev_addr = %dev_addr, "DevAddr reserved");
                return Ok(dev_addr);
            }
        }

        Err(DomainError::DevAddrAllocationFailed(self.allocation_attempts))
    }

    async fn flush_mac_command_queue(&self, dev_eui: &Eui64) -> DomainResult<()> {
        let mut state = self.state.write().await;
        state.mac_command_queues.remove(dev_eui);
        info!(dev_eui = %dev_eui, "mac-command queue flushed");
        Ok(())
    }
}
