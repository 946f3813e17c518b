use crate::config::LoggingConfig;
use crate::error::{Result, RsuvError};
use std::path::Path;
use std::sync::Once;
use tracing::{debug, error, info};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*, registry::Registry};

static LOGGER_INIT: Once = Once::new();

/// Where a component's log lines go besides its log file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsoleSink {
    None,
    Stdout,
    Stderr,
}

/// Initialize the logging system for a specific component
fn init_component_logging(
    config: &LoggingConfig,
    log_dir: &Path,
    component: &str,
    console: ConsoleSink,
) -> Result<()> {
    let mut init_result = Ok(());

    LOGGER_INIT.call_once(|| {
        init_result = init_component_logging_internal(config, log_dir, component, console);
    });

    init_result
}

/// Internal logging initialization (only called once)
fn init_component_logging_internal(
    config: &LoggingConfig,
    log_dir: &Path,
    component: &str,
    console: ConsoleSink,
) -> Result<()> {
    let log_level = config.level.to_lowercase();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log_level))
        .map_err(|e| RsuvError::ConfigError(format!("Invalid log level '{log_level}': {e}")))?;

    let file_layer = if config.file_enabled {
        std::fs::create_dir_all(log_dir).map_err(|e| {
            RsuvError::ConfigError(format!("Failed to create log directory: {e}"))
        })?;

        let file_appender =
            tracing_appender::rolling::never(log_dir, format!("{component}.log"));
        Some(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
    } else {
        None
    };

    let stdout_layer = (console == ConsoleSink::Stdout).then(|| {
        fmt::layer()
            .with_writer(std::io::stdout)
            .with_target(false)
    });
    let stderr_layer = (console == ConsoleSink::Stderr).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    Registry::default()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| RsuvError::ConfigError(format!("Failed to install logger: {e}")))?;

    debug!("{} logging initialized with level: {}", component, log_level);
    Ok(())
}

/// Initialize logging for the daemon process.
///
/// The daemon keeps its stdout for foreground runs; a spawned daemon has
/// stdout attached to /dev/null.
pub fn init_daemon_logging(config: &LoggingConfig, log_dir: &Path) -> Result<()> {
    init_component_logging(config, log_dir, "daemon", ConsoleSink::Stdout)?;
    info!("Daemon logging initialized");
    Ok(())
}

/// Initialize logging for CLI commands.
///
/// Stdout carries command output, so console logging goes to stderr and only
/// when `verbose` is set.
pub fn init_cli_logging(config: &LoggingConfig, log_dir: &Path, verbose: bool) -> Result<()> {
    let mut cli_config = config.clone();

    if verbose {
        cli_config.level = "debug".to_string();
    } else if !matches!(cli_config.level.as_str(), "debug" | "trace") {
        cli_config.level = "info".to_string();
    }

    let console = if verbose {
        ConsoleSink::Stderr
    } else {
        ConsoleSink::None
    };
    init_component_logging(&cli_config, log_dir, "cli", console)
}

/// Log a structured message for daemon operations
pub fn log_daemon_event(event: &str, details: &str) {
    info!(target: "daemon", event = event, details = details);
}

/// Log a structured message for managed program operations
pub fn log_program_event(program_name: &str, event: &str, details: &str) {
    info!(target: "program", program = program_name, event = event, details = details);
}

/// Log a structured message for plugin dispatch
pub fn log_plugin_event(plugin_name: &str, event: &str, details: &str) {
    info!(target: "plugin", plugin = plugin_name, event = event, details = details);
}

/// Log an error with context
pub fn log_error(component: &str, error: &str, context: Option<&str>) {
    if let Some(ctx) = context {
        error!(component = component, error = error, context = ctx);
    } else {
        error!(component = component, error = error);
    }
}

/// Log debug information
pub fn log_debug(component: &str, message: &str, context: Option<&str>) {
    if let Some(ctx) = context {
        debug!(component = component, message = message, context = ctx);
    } else {
        debug!(component = component, message = message);
    }
}
