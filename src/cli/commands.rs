
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// rsuv - supervise programs through a background daemon
#[derive(Parser, Debug)]
#[command(name = "rsuv")]
#[command(about = "Command-line front end for the rsuv program supervisor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct CliArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Daemon HTTP host
    #[arg(long, global = true, env = "RSUV_SERVER_HOST")]
    pub host: Option<String>,

    /// Daemon HTTP port
    #[arg(long, global = true, env = "RSUV_SERVER_PORT")]
    pub port: Option<u16>,

    /// Override default daemon socket path
    #[arg(long, global = true)]
    pub socket: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show client and daemon versions
    Version,

    /// List programs and their status
    #[command(visible_alias = "st")]
    Status,

    /// Register a program with the daemon
    Add {
        /// Program name (defaults to the command)
        #[arg(short, long)]
        name: Option<String>,

        /// Extra environment for the program
        #[arg(short = 'e', long = "env", value_name = "KEY=VALUE")]
        env: Vec<String>,

        /// Command line to run
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Start a registered program
    Start {
        /// Name of the program to start
        name: String,
    },

    /// Stop a running program
    Stop {
        /// Name of the program to stop
        name: String,
    },

    /// Ask the daemon to exit
    Shutdown,

    /// Run as the daemon in the foreground
    #[command(hide = true)]
    Serv,

    /// Installed command plugin
    #[command(external_subcommand)]
    External(Vec<String>),
}

impl Commands {
    /// Verb the invocation was made with, aliases folded to the primary name
    pub fn verb(&self) -> &str {
        match self {
            Commands::Version => "version",
            Commands::Status => "status",
            Commands::Add { .. } => "add",
            Commands::Start { .. } => "start",
            Commands::Stop { .. } => "stop",
            Commands::Shutdown => "shutdown",
            Commands::Serv => "serv",
            Commands::External(argv) => argv.first().map(String::as_str).unwrap_or_default(),
        }
    }
}
