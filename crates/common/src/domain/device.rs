use crate::domain::result::DomainResult;
use crate::lorawan::Eui64;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Provisioned device and its profile linkage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub dev_eui: Eui64,
    pub device_profile_id: String,
    pub service_profile_id: String,
    pub routing_profile_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Device capabilities relevant to activation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProfile {
    pub device_profile_id: String,
    pub supports_join: bool,
    pub mac_version: String,
}

/// Service-level limits applied to a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceProfile {
    pub service_profile_id: String,
    pub dr_max: u8,
}

/// Maps a device to its owning application-server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingProfile {
    pub routing_profile_id: String,
    pub as_id: String,
}

/// Repository trait for device lookups
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Get a device by DevEUI
    async fn get_device(&self, dev_eui: &Eui64) -> DomainResult<Option<Device>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceProfileRepository: Send + Sync {
    async fn get_device_profile(&self, device_profile_id: &str)
        -> DomainResult<Option<DeviceProfile>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ServiceProfileRepository: Send + Sync {
    async fn get_service_profile(
        &self,
        service_profile_id: &str,
    ) -> DomainResult<Option<ServiceProfile>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RoutingProfileRepository: Send + Sync {
    async fn get_routing_profile(
        &self,
        routing_profile_id: &str,
    ) -> DomainResult<Option<RoutingProfile>>;
}
