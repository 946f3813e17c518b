pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod ipc;
pub mod logging;
pub mod model;
pub mod plugin;
pub mod transport;

pub use error::{Result, RsuvError};

/// Version reported by both the command line and the daemon
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
