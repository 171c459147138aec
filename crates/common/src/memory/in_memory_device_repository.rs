use crate::domain::{
    Device, DeviceProfile, DeviceProfileRepository, DeviceRepository, DomainResult,
    RoutingProfile, RoutingProfileRepository, ServiceProfile, ServiceProfileRepository,
};
use crate::lorawan::Eui64;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct ProvisioningState {
    devices: HashMap<Eui64, Device>,
    device_profiles: HashMap<String, DeviceProfile>,
    service_profiles: HashMap<String, ServiceProfile>,
    routing_profiles: HashMap<String, RoutingProfile>,
}

/// In-memory device and profile lookups, populated explicitly
#[derive(Clone, Default)]
pub struct InMemoryDeviceRepository {
    state: Arc<RwLock<ProvisioningState>>,
}

impl InMemoryDeviceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_device(&self, device: Device) {
        self.state.write().await.devices.insert(device.dev_eui, device);
    }

    pub async fn insert_device_profile(&self, profile: DeviceProfile) {
        self.state
            .write()
            .await
            .device_profiles
            .insert(profile.device_profile_id.clone(), profile);
    }

    pub async fn insert_service_profile(&self, profile: ServiceProfile) {
        self.state
            .write()
            .await
            .service_profiles
            .insert(profile.service_profile_id.clone(), profile);
    }

    pub async fn insert_routing_profile(&self, profile: RoutingProfile) {
        self.state
            .write()
            .await
            .routing_profiles
            .insert(profile.routing_profile_id.clone(), profile);
    }
}

#[async_trait]
impl DeviceRepository for InMemoryDeviceRepository {
    async fn get_device(&self, dev_eui: &Eui64) -> DomainResult<Option<Device>> {
        Ok(self.state.read().await.devices.get(dev_eui).cloned())
    }
}

#[async_trait]
impl DeviceProfileRepository for InMemoryDeviceRepository {
    async fn get_device_profile(
        &self,
        device_profile_id: &str,
    ) -> DomainResult<Option<DeviceProfile>> {
        Ok(self
            .state
            .read()
            .await
            .device_profiles
            .get(device_profile_id)
            .cloned())
    }
}

#[async_trait]
impl ServiceProfileRepository for InMemoryDeviceRepository {
    async fn get_service_profile(
        &self,
        service_profile_id: &str,
    ) -> DomainResult<Option<ServiceProfile>> {
        Ok(self
            .state
            .read()
            .await
            .service_profiles
            .get(service_profile_id)
            .cloned())
    }
}

#[async_trait]
impl RoutingProfileRepository for InMemoryDeviceRepository {
    async fn get_routing_profile(
        &self,
        routing_profile_id: &str,
    ) -> DomainResult<Option<RoutingProfile>> {
        Ok(self
            .state
            .read()
            .await
            .routing_profiles
            .get(routing_profile_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookups() {
        let repo = InMemoryDeviceRepository::new();
        let dev_eui = Eui64([1; 8]);
        repo.insert_device(Device {
            dev_eui,
            device_profile_id: "dp-1".to_string(),
            service_profile_id: "sp-1".to_string(),
            routing_profile_id: "rp-1".to_string(),
            created_at: None,
            updated_at: None,
        })
        .await;
        repo.insert_routing_profile(RoutingProfile {
            routing_profile_id: "rp-1".to_string(),
            as_id: "as-1".to_string(),
        })
        .await;

        let device = repo.get_device(&dev_eui).await.unwrap().unwrap();
        let routing = repo
            .get_routing_profile(&device.routing_profile_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(routing.as_id, "as-1");
        assert!(repo.get_device_profile("dp-1").await.unwrap().is_none());
        assert!(repo.get_device(&Eui64([2; 8])).await.unwrap().is_none());
    }
}
