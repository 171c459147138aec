//! Tracing subscriber and OpenTelemetry export setup shared by the binaries.

mod config;
mod init;

pub use config::*;
pub use init::*;
