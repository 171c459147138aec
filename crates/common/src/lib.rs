pub mod domain;
pub mod lorawan;
pub mod memory;
pub mod postgres;
pub mod redis;
pub mod telemetry;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use domain::MockApplicationServerClient;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockApplicationServerPool;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockDeviceActivationRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockDeviceProfileRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockDeviceQueueRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockDeviceRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockDeviceSessionStore;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockDownlinkDispatcher;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockJoinServerClient;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockJoinServerPool;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockRoutingProfileRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockServiceProfileRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockUplinkLogger;
