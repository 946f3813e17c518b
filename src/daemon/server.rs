use crate::config::{BridgeConfig, LoggingConfig};
use crate::daemon::connection::ConnectionHandler;
use crate::daemon::http;
use crate::daemon::registry::{ProgramRegistry, Refusal, SharedRegistry};
use crate::error::{Result, RsuvError};
use crate::ipc::{self, SocketFile};
use crate::logging::{init_daemon_logging, log_daemon_event, log_error};
use crate::model::OperationResult;
use crate::transport::{RpcRequest, RpcResponse};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::{mpsc, oneshot};
use tracing::info;

/// Exit status the daemon reports when asked to shut down
pub const SHUTDOWN_EXIT_CODE: i32 = 0;

/// Result of trying to become the daemon
pub enum BindOutcome {
    Bound(DaemonServer),
    /// Another daemon already holds the endpoint
    AlreadyRunning,
}

/// Minimal daemon answering the RPC and HTTP contracts
pub struct DaemonServer {
    config: BridgeConfig,
    registry: SharedRegistry,
    http_listener: TcpListener,
    rpc_listener: UnixListener,
    socket_file: SocketFile,
}

impl DaemonServer {
    /// Claim the daemon endpoints.
    ///
    /// The TCP port is the exclusivity gate: it is bound first, and losing it
    /// to another daemon yields `AlreadyRunning` without touching anything
    /// else. Only the winner replaces a leftover socket file.
    pub async fn bind(config: BridgeConfig) -> Result<BindOutcome> {
        let http_listener =
            match TcpListener::bind((config.http_host.as_str(), config.http_port)).await {
                Ok(listener) => listener,
                Err(e) if e.kind() == ErrorKind::AddrInUse => {
                    return Ok(BindOutcome::AlreadyRunning);
                }
                Err(e) => {
                    return Err(RsuvError::IoError(std::io::Error::new(
                        e.kind(),
                        format!("failed to bind {}: {e}", config.server_addr()),
                    )));
                }
            };

        let (rpc_listener, socket_file) = ipc::bind(&config.socket_path)?;

        Ok(BindOutcome::Bound(Self {
            config,
            registry: ProgramRegistry::shared(),
            http_listener,
            rpc_listener,
            socket_file,
        }))
    }

    /// Serve until a shutdown request or signal; returns the exit status.
    ///
    /// The socket file goes away before the TCP port is released, so a
    /// daemon started after the port frees up never loses its socket to
    /// this one's cleanup.
    pub async fn run(self) -> Result<i32> {
        let DaemonServer {
            config,
            registry,
            http_listener,
            rpc_listener,
            socket_file,
        } = self;

        log_daemon_event(
            "listening",
            &format!(
                "rpc={} http={}",
                config.socket_path.display(),
                config.server_addr()
            ),
        );

        let (http_stop_tx, http_stop_rx) = oneshot::channel::<()>();
        let app = http::router(Arc::clone(&registry));
        let http_task = tokio::spawn(async move {
            axum::serve(http_listener, app)
                .with_graceful_shutdown(async {
                    let _ = http_stop_rx.await;
                })
                .await
        });

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<i32>(1);
        let termination = shutdown_signal();
        tokio::pin!(termination);

        let exit_code = loop {
            tokio::select! {
                accept_result = rpc_listener.accept() => {
                    match accept_result {
                        Ok((stream, _)) => {
                            let registry = Arc::clone(&registry);
                            let shutdown_tx = shutdown_tx.clone();
                            tokio::spawn(async move {
                                let result = ConnectionHandler::handle_connection(stream, |request| {
                                    process_request(registry, request)
                                })
                                .await;

                                match result {
                                    Ok(Some(RpcResponse::Exit { code })) => {
                                        let _ = shutdown_tx.send(code).await;
                                    }
                                    Ok(_) => {}
                                    Err(e) => log_error("daemon", &format!("Error handling connection: {e}"), None),
                                }
                            });
                        }
                        Err(e) => {
                            log_error("daemon", &format!("Error accepting connection: {e}"), None);
                        }
                    }
                }

                Some(code) = shutdown_rx.recv() => {
                    log_daemon_event("shutdown", "requested over rpc");
                    break code;
                }

                _ = &mut termination => {
                    log_daemon_event("shutdown", "received termination signal");
                    break SHUTDOWN_EXIT_CODE;
                }
            }
        };

        registry.lock().await.stop_all().await;

        drop(rpc_listener);
        if let Err(e) = socket_file.remove() {
            log_error("daemon", &format!("Failed to remove socket: {e}"), None);
        }

        // Releasing the port lets the next daemon in
        let _ = http_stop_tx.send(());
        match http_task.await {
            Ok(Err(e)) => log_error("daemon", &format!("HTTP server error: {e}"), None),
            Err(e) => log_error("daemon", &format!("HTTP server task failed: {e}"), None),
            Ok(Ok(())) => {}
        }

        info!("Daemon stopped with exit code {exit_code}");
        Ok(exit_code)
    }
}

/// Become the daemon, or exit quietly when one is already serving.
///
/// Logging starts only after the endpoints are claimed, so a daemon that
/// loses the race leaves no trace in the daemon log.
pub async fn run_daemon(
    config: BridgeConfig,
    logging: &LoggingConfig,
    log_dir: &Path,
) -> Result<i32> {
    match DaemonServer::bind(config).await? {
        BindOutcome::AlreadyRunning => Ok(SHUTDOWN_EXIT_CODE),
        BindOutcome::Bound(server) => {
            if let Err(e) = init_daemon_logging(logging, log_dir) {
                eprintln!("Warning: Failed to initialize daemon logging: {e}");
            }
            server.run().await
        }
    }
}

/// Process a daemon request and return the response
async fn process_request(registry: SharedRegistry, request: RpcRequest) -> RpcResponse {
    match request {
        RpcRequest::Start(request) => reply(registry.lock().await.start(&request.name)),
        RpcRequest::Stop(request) => reply(registry.lock().await.stop(&request.name).await),
        RpcRequest::Version => RpcResponse::ok(crate::VERSION),
        RpcRequest::Shutdown => RpcResponse::Exit {
            code: SHUTDOWN_EXIT_CODE,
        },
    }
}

fn reply(result: std::result::Result<OperationResult, Refusal>) -> RpcResponse {
    match result {
        Ok(result) => RpcResponse::ok(result.message),
        Err(refusal) => RpcResponse::error(refusal.code, refusal.message),
    }
}

/// Resolves on ctrl-c or SIGTERM. The SIGTERM stream is registered here,
/// before the returned future is first polled, and lives as long as it does.
fn shutdown_signal() -> impl std::future::Future<Output = ()> {
    #[cfg(unix)]
    let terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate());

    async move {
        #[cfg(unix)]
        {
            match terminate {
                Ok(mut terminate) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = terminate.recv() => {}
                    }
                }
                Err(e) => {
                    log_error("daemon", &format!("Failed to watch SIGTERM: {e}"), None);
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}
