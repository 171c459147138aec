mod device_queue_service;
mod downlink_data_service;
mod join_request_service;
mod network_settings;
mod upstream;

pub use device_queue_service::*;
pub use downlink_data_service::*;
pub use join_request_service::*;
pub use network_settings::*;
