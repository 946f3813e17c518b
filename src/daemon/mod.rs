pub mod bootstrap;
pub mod connection;
pub mod http;
pub mod registry;
pub mod server;

pub use bootstrap::{Bootstrap, DAEMON_VERB, DaemonBootstrapper, daemon_bootstrapper};
pub use connection::ConnectionHandler;
pub use registry::{ProgramRegistry, SharedRegistry};
pub use server::{BindOutcome, DaemonServer, run_daemon};
