mod client;
mod config;
mod device_activation_repository;
mod device_queue_repository;
mod device_repository;

pub use client::*;
pub use config::*;
pub use device_activation_repository::*;
pub use device_queue_repository::*;
pub use device_repository::*;
