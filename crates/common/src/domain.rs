mod application_server;
mod device;
mod device_activation;
mod device_queue;
mod device_session;
mod downlink;
mod join_server;
mod result;
mod uplink;

pub use application_server::*;
pub use device::*;
pub use device_activation::*;
pub use device_queue::*;
pub use device_session::*;
pub use downlink::*;
pub use join_server::*;
pub use result::*;
pub use uplink::*;
