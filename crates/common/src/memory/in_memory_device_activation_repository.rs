use crate::domain::{
    CreateDeviceActivationInput, DeviceActivation, DeviceActivationRepository, DomainError,
    DomainResult,
};
use crate::lorawan::{DevNonce, Eui64};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Default)]
struct ActivationState {
    activations: Vec<DeviceActivation>,
    dev_nonces: HashMap<(Eui64, Eui64), DevNonce>,
}

/// In-memory implementation of DeviceActivationRepository
#[derive(Clone, Default)]
pub struct InMemoryDeviceActivationRepository {
    state: Arc<RwLock<ActivationState>>,
}

impl InMemoryDeviceActivationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// All activations of the device, oldest first
    pub async fn activations_for_dev_eui(&self, dev_eui: &Eui64) -> Vec<DeviceActivation> {
        let state = self.state.read().await;
        state
            .activations
            .iter()
            .filter(|activation| activation.dev_eui == *dev_eui)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl DeviceActivationRepository for InMemoryDeviceActivationRepository {
    async fn validate_dev_nonce(
        &self,
        join_eui: &Eui64,
        dev_eui: &Eui64,
        dev_nonce: DevNonce,
    ) -> DomainResult<()> {
        let mut state = self.state.write().await;
        let key = (*dev_eui, *join_eui);

        if let Some(last) = state.dev_nonces.get(&key) {
            if dev_nonce <= *last {
                warn!(dev_eui = %dev_eui, dev_nonce, last_dev_nonce = *last, "DevNonce rejected");
                return Err(DomainError::InvalidDevNonce {
                    dev_eui: dev_eui.to_string(),
                    dev_nonce,
                });
            }
        }

        state.dev_nonces.insert(key, dev_nonce);
        Ok(())
    }

    async fn create_device_activation(
        &self,
        input: CreateDeviceActivationInput,
    ) -> DomainResult<DeviceActivation> {
        let mut state = self.state.write().await;
        let activation = DeviceActivation {
            id: state.activations.len() as i64 + 1,
            created_at: Utc::now(),
            dev_eui: input.dev_eui,
            join_eui: input.join_eui,
            dev_addr: input.dev_addr,
            nwk_s_key: input.nwk_s_key,
            dev_nonce: input.dev_nonce,
        };
        state.activations.push(activation.clone());

        info!(dev_eui = %activation.dev_eui, id = activation.id, "device-activation created");
        Ok(activation)
    }

    async fn get_last_device_activation_for_dev_eui(
        &self,
        dev_eui: &Eui64,
    ) -> DomainResult<Option<DeviceActivation>> {
        let state = self.state.read().await;
        Ok(state
            .activations
            .iter()
            .rev()
            .find(|activation| activation.dev_eui == *dev_eui)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lorawan::{Aes128Key, DevAddr};

    const DEV_EUI: Eui64 = Eui64([1, 2, 3, 4, 5, 6, 7, 8]);
    const JOIN_EUI: Eui64 = Eui64([9, 9, 9, 9, 9, 9, 9, 9]);
    const OTHER_JOIN_EUI: Eui64 = Eui64([8, 8, 8, 8, 8, 8, 8, 8]);

    #[tokio::test]
    async fn test_dev_nonce_must_increase() {
        let repo = InMemoryDeviceActivationRepository::new();

        repo.validate_dev_nonce(&JOIN_EUI, &DEV_EUI, 5).await.unwrap();
        repo.validate_dev_nonce(&JOIN_EUI, &DEV_EUI, 6).await.unwrap();

        for replayed in [6, 5, 0] {
            let result = repo.validate_dev_nonce(&JOIN_EUI, &DEV_EUI, replayed).await;
            assert!(matches!(
                result,
                Err(DomainError::InvalidDevNonce { dev_nonce, .. }) if dev_nonce == replayed
            ));
        }
    }

    #[tokio::test]
    async fn test_dev_nonce_scoped_per_join_eui() {
        let repo = InMemoryDeviceActivationRepository::new();

        repo.validate_dev_nonce(&JOIN_EUI, &DEV_EUI, 10).await.unwrap();
        assert!(repo
            .validate_dev_nonce(&OTHER_JOIN_EUI, &DEV_EUI, 1)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_last_activation() {
        let repo = InMemoryDeviceActivationRepository::new();
        assert!(repo
            .get_last_device_activation_for_dev_eui(&DEV_EUI)
            .await
            .unwrap()
            .is_none());

        for dev_nonce in [1, 2] {
            repo.create_device_activation(CreateDeviceActivationInput {
                dev_eui: DEV_EUI,
                join_eui: JOIN_EUI,
                dev_addr: DevAddr([0x26, 0, 0, dev_nonce as u8]),
                nwk_s_key: Aes128Key::default(),
                dev_nonce,
            })
            .await
            .unwrap();
        }

        let last = repo
            .get_last_device_activation_for_dev_eui(&DEV_EUI)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(last.dev_nonce, 2);
        assert_eq!(repo.activations_for_dev_eui(&DEV_EUI).await.len(), 2);
    }
}
