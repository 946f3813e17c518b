
use crate::cli::commands::Commands;
use crate::cli::program::build_spec;
use crate::cli::router::{CommandRouter, Target};
use crate::config::{BridgeConfig, LoggingConfig};
use crate::daemon::{Bootstrap, run_daemon};
use crate::error::{Result, RsuvError};
use crate::model::{OperationResult, ProgramRuntimeView, ProgramSpec};
use crate::plugin::{Plugin, PluginDispatcher};
use crate::transport::DaemonTransport;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// CLI command execution result
#[derive(Debug, PartialEq, Eq)]
pub enum CliResult {
    /// Output to print on stdout before exiting 0
    Success(String),
    /// Exit status to end with, nothing left to print
    Exit(i32),
}

/// Fully prepared work for one invocation
#[derive(Debug)]
enum Action {
    Version,
    Status,
    Add(ProgramSpec),
    Start(String),
    Stop(String),
    Shutdown,
    Serv,
    Plugin { plugin: Plugin, args: Vec<String> },
}

/// Main CLI handler: resolves the verb, brings the daemon up when needed,
/// and runs the command
pub struct CliHandler {
    config: BridgeConfig,
    router: CommandRouter,
    transport: Arc<dyn DaemonTransport>,
    bootstrap: Arc<dyn Bootstrap>,
    plugins: PluginDispatcher,
    daemon_logging: LoggingConfig,
    daemon_log_dir: PathBuf,
}

impl CliHandler {
    pub fn new(
        config: BridgeConfig,
        router: CommandRouter,
        transport: Arc<dyn DaemonTransport>,
        bootstrap: Arc<dyn Bootstrap>,
    ) -> Self {
        let plugins = PluginDispatcher::new(config.server_addr());
        let daemon_log_dir = config.state_dir.join("logs");
        Self {
            config,
            router,
            transport,
            bootstrap,
            plugins,
            daemon_logging: LoggingConfig::default(),
            daemon_log_dir,
        }
    }

    /// Logging used when this invocation becomes the daemon
    pub fn with_daemon_logging(mut self, logging: LoggingConfig, log_dir: PathBuf) -> Self {
        self.daemon_logging = logging;
        self.daemon_log_dir = log_dir;
        self
    }

    /// Main entry point for handling CLI commands
    pub async fn handle_command(&self, command: Commands) -> Result<CliResult> {
        let spec = self.router.resolve(command.verb())?;
        debug!("Resolved '{}' to {:?}", spec.name, spec.target);

        // Local validation happens before any daemon traffic
        let action = self.prepare(&spec.target, command)?;

        if spec.requires_daemon {
            self.bootstrap.ensure_daemon().await?;
        }

        self.execute(action).await
    }

    fn prepare(&self, target: &Target, command: Commands) -> Result<Action> {
        let action = match command {
            Commands::Version => Action::Version,
            Commands::Status => Action::Status,
            Commands::Add { name, env, command } => {
                let cwd = std::env::current_dir()?;
                Action::Add(build_spec(name.as_deref(), &env, &command, &cwd)?)
            }
            Commands::Start { name } => Action::Start(name),
            Commands::Stop { name } => Action::Stop(name),
            Commands::Shutdown => Action::Shutdown,
            Commands::Serv => Action::Serv,
            Commands::External(mut argv) => match target {
                Target::Plugin(plugin) => {
                    argv.remove(0);
                    Action::Plugin {
                        plugin: plugin.clone(),
                        args: argv,
                    }
                }
                Target::Builtin(builtin) => {
                    return Err(RsuvError::Usage(format!(
                        "'{}' is a built-in command ({builtin:?})",
                        argv.first().map(String::as_str).unwrap_or_default()
                    )));
                }
            },
        };

        Ok(action)
    }

    async fn execute(&self, action: Action) -> Result<CliResult> {
        let output = match action {
            Action::Version => {
                let server = self.transport.version().await?;
                format!("Client: {}\nServer: {}", crate::VERSION, server.message)
            }
            Action::Status => format_program_list(&self.transport.list_programs().await?),
            Action::Add(spec) => message(self.transport.add_program(&spec).await?),
            Action::Start(name) => message(self.transport.start(&name).await?),
            Action::Stop(name) => message(self.transport.stop(&name).await?),
            Action::Shutdown => {
                let signal = self.transport.shutdown().await?;
                format!("Return code: {}", signal.code)
            }
            Action::Serv => {
                let code = run_daemon(
                    self.config.clone(),
                    &self.daemon_logging,
                    &self.daemon_log_dir,
                )
                .await?;
                return Ok(CliResult::Exit(code));
            }
            Action::Plugin { plugin, args } => {
                return match self.plugins.invoke(&plugin, &args).await? {
                    0 => Ok(CliResult::Exit(0)),
                    code => Err(RsuvError::PluginExit {
                        name: plugin.name,
                        code,
                    }),
                };
            }
        };

        Ok(CliResult::Success(output))
    }
}

fn message(result: OperationResult) -> String {
    result.message
}

/// Program table with right-aligned names
fn format_program_list(programs: &[ProgramRuntimeView]) -> String {
    let mut lines = vec![format!("{:>10}\t{}", "NAME", "STATUS")];
    lines.extend(
        programs
            .iter()
            .map(|program| format!("{:>10}\t{}", program.info.name, program.status)),
    );
    lines.join("\n")
}
