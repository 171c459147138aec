pub mod config;
pub mod domain;
pub mod network_server;

pub use network_server::*;
