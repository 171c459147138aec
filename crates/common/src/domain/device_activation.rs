use crate::domain::result::DomainResult;
use crate::lorawan::{Aes128Key, DevAddr, DevNonce, Eui64};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Audit record of a completed join; append-only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceActivation {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub dev_eui: Eui64,
    pub join_eui: Eui64,
    pub dev_addr: DevAddr,
    pub nwk_s_key: Aes128Key,
    pub dev_nonce: DevNonce,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDeviceActivationInput {
    pub dev_eui: Eui64,
    pub join_eui: Eui64,
    pub dev_addr: DevAddr,
    pub nwk_s_key: Aes128Key,
    pub dev_nonce: DevNonce,
}

/// Repository trait for the activation history and join replay protection
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceActivationRepository: Send + Sync {
    /// Accept the DevNonce only if it exceeds every nonce previously accepted
    /// for the device and JoinEUI, and reserve it in the same atomic step.
    /// Fails with `InvalidDevNonce` otherwise.
    async fn validate_dev_nonce(
        &self,
        join_eui: &Eui64,
        dev_eui: &Eui64,
        dev_nonce: DevNonce,
    ) -> DomainResult<()>;

    /// Append an activation record
    async fn create_device_activation(
        &self,
        input: CreateDeviceActivationInput,
    ) -> DomainResult<DeviceActivation>;

    /// Most recent activation of the device
    async fn get_last_device_activation_for_dev_eui(
        &self,
        dev_eui: &Eui64,
    ) -> DomainResult<Option<DeviceActivation>>;
}
