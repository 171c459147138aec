mod client;
mod config;
mod device_session_store;

pub use client::*;
pub use config::*;
pub use device_session_store::*;
