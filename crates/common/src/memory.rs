mod in_memory_device_activation_repository;
mod in_memory_device_queue_repository;
mod in_memory_device_repository;
mod in_memory_device_session_store;

pub use in_memory_device_activation_repository::*;
pub use in_memory_device_queue_repository::*;
pub use in_memory_device_repository::*;
pub use in_memory_device_session_store::*;
