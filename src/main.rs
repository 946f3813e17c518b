use clap::Parser;
use clap::error::ErrorKind;
use rsuv::cli::{CliArgs, CliHandler, CliResult, Commands, CommandRouter};
use rsuv::config::{BridgeConfig, ConnectionOverrides, GlobalConfig, get_state_dir};
use rsuv::daemon::daemon_bootstrapper;
use rsuv::logging;
use rsuv::plugin;
use rsuv::transport::TransportClient;
use rsuv::Result;
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => e.exit(),
            _ => {
                let summary = e.to_string();
                let first_line = summary.lines().next().unwrap_or("invalid arguments");
                eprintln!("{first_line}");
                process::exit(2);
            }
        },
    };

    match run(args).await {
        Ok(CliResult::Success(output)) => {
            if !output.is_empty() {
                println!("{output}");
            }
            process::exit(0);
        }
        Ok(CliResult::Exit(code)) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(e.exit_code());
        }
    }
}

async fn run(args: CliArgs) -> Result<CliResult> {
    let state_dir = get_state_dir()?;
    let global_config = GlobalConfig::load(&state_dir).await?;
    let log_dir = global_config.get_log_dir(&state_dir);

    let overrides = ConnectionOverrides {
        host: args.host,
        port: args.port,
        socket: args.socket,
    };
    let config = BridgeConfig::new(&global_config, &state_dir, &overrides);

    // The daemon sets up its own logging once it owns the endpoints
    if !matches!(args.command, Commands::Serv) {
        if let Err(e) = logging::init_cli_logging(&global_config.logging, &log_dir, args.verbose) {
            if args.verbose {
                eprintln!("Warning: Failed to initialize logging: {e}");
            }
        }
    }

    let router = CommandRouter::new(plugin::discover(&config.plugin_root));
    let transport = TransportClient::new(&config)?;
    let bootstrap = daemon_bootstrapper(&config)?;

    let handler = CliHandler::new(config, router, Arc::new(transport), Arc::new(bootstrap))
        .with_daemon_logging(global_config.logging.clone(), log_dir);

    handler.handle_command(args.command).await
}
