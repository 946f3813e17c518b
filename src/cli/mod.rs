pub mod commands;
pub mod handler;
pub mod program;
pub mod router;

pub use commands::*;
pub use handler::*;
pub use router::{CommandRouter, CommandSpec, Target};
