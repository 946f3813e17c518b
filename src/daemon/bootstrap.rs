use crate::config::{BootstrapPolicy, BridgeConfig};
use crate::error::{Result, RsuvError};
use crate::transport::RpcClient;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tokio::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Internal verb under which the binary runs as the daemon
pub const DAEMON_VERB: &str = "serv";

/// Answers whether a daemon is currently serving requests
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn is_alive(&self) -> bool;
}

/// Starts a daemon process in the background without waiting for it
#[cfg_attr(test, mockall::automock)]
pub trait DaemonLauncher: Send + Sync {
    fn launch(&self) -> Result<()>;
}

/// Makes sure a daemon is reachable before a command talks to it
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Bootstrap: Send + Sync {
    async fn ensure_daemon(&self) -> Result<()>;
}

/// Probes liveness with a `version` call on the RPC socket
pub struct RpcProbe {
    client: RpcClient,
}

impl RpcProbe {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            client: RpcClient::new(config.socket_path.clone(), config.bootstrap.probe_timeout),
        }
    }
}

#[async_trait]
impl LivenessProbe for RpcProbe {
    async fn is_alive(&self) -> bool {
        match self.client.version().await {
            Ok(_) => true,
            Err(e) => {
                trace!("Liveness probe failed: {e}");
                false
            }
        }
    }
}

/// Re-executes the current binary as a detached daemon
pub struct ProcessLauncher {
    executable: PathBuf,
    args: Vec<OsString>,
}

impl ProcessLauncher {
    pub fn new(config: &BridgeConfig) -> Result<Self> {
        let executable = std::env::current_exe()?;
        Ok(Self::with_executable(executable, config))
    }

    pub fn with_executable(executable: PathBuf, config: &BridgeConfig) -> Self {
        let args = vec![
            OsString::from(DAEMON_VERB),
            OsString::from("--host"),
            OsString::from(&config.http_host),
            OsString::from("--port"),
            OsString::from(config.http_port.to_string()),
            OsString::from("--socket"),
            config.socket_path.as_path().as_os_str().to_os_string(),
        ];
        Self { executable, args }
    }

    /// Create command for daemon process (extracted for testing)
    pub fn create_daemon_command(&self) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // Own process group, so a terminal interrupt aimed at the command
        // line does not reach the daemon.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        cmd
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }
}

impl DaemonLauncher for ProcessLauncher {
    fn launch(&self) -> Result<()> {
        let child = self.create_daemon_command().spawn()?;
        debug!("Daemon process spawned with PID: {}", child.id());
        // Dropping a std Child neither waits for nor kills it.
        Ok(())
    }
}

/// States of one bootstrap attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    Probing,
    Spawning,
    Waiting,
    Done,
    TimedOut,
}

/// Probe, spawn at most once, then re-probe with capped exponential backoff
/// until the daemon answers or the policy's maximum wait runs out.
///
/// Several invocations may run this at once. Each of them may spawn a
/// daemon; the daemons settle it between themselves by binding the same
/// endpoint, and every caller's probe loop ends up at the survivor.
pub struct DaemonBootstrapper<P, L> {
    probe: P,
    launcher: L,
    policy: BootstrapPolicy,
}

impl<P: LivenessProbe, L: DaemonLauncher> DaemonBootstrapper<P, L> {
    pub fn new(probe: P, launcher: L, policy: BootstrapPolicy) -> Self {
        Self {
            probe,
            launcher,
            policy,
        }
    }

    pub async fn run(&self) -> Result<()> {
        let started = Instant::now();
        let mut state = BootstrapState::Probing;
        let mut spawned = false;
        let mut backoff = self.policy.initial_backoff;

        loop {
            trace!("Bootstrap state: {state:?}");
            state = match state {
                BootstrapState::Probing => {
                    if self.probe.is_alive().await {
                        BootstrapState::Done
                    } else if spawned {
                        BootstrapState::Waiting
                    } else {
                        BootstrapState::Spawning
                    }
                }
                BootstrapState::Spawning => {
                    info!("Daemon not reachable, starting one");
                    if let Err(e) = self.launcher.launch() {
                        // Another invocation may still bring a daemon up.
                        warn!("Failed to spawn daemon: {e}");
                    }
                    spawned = true;
                    BootstrapState::Waiting
                }
                BootstrapState::Waiting => {
                    let elapsed = started.elapsed();
                    if elapsed >= self.policy.max_wait {
                        BootstrapState::TimedOut
                    } else {
                        let remaining = self.policy.max_wait - elapsed;
                        tokio::time::sleep(backoff.min(remaining)).await;
                        backoff = next_backoff(backoff, self.policy.max_backoff);
                        BootstrapState::Probing
                    }
                }
                BootstrapState::Done => {
                    debug!("Daemon reachable after {:?}", started.elapsed());
                    return Ok(());
                }
                BootstrapState::TimedOut => {
                    return Err(RsuvError::BootstrapTimeout {
                        waited_ms: started.elapsed().as_millis() as u64,
                    });
                }
            };
        }
    }
}

fn next_backoff(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}

#[async_trait]
impl<P: LivenessProbe, L: DaemonLauncher> Bootstrap for DaemonBootstrapper<P, L> {
    async fn ensure_daemon(&self) -> Result<()> {
        self.run().await
    }
}

/// Bootstrapper wired to the real socket probe and process launcher
pub fn daemon_bootstrapper(
    config: &BridgeConfig,
) -> Result<DaemonBootstrapper<RpcProbe, ProcessLauncher>> {
    Ok(DaemonBootstrapper::new(
        RpcProbe::new(config),
        ProcessLauncher::new(config)?,
        config.bootstrap,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy(max_wait_ms: u64) -> BootstrapPolicy {
        BootstrapPolicy {
            probe_timeout: Duration::from_millis(50),
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            max_wait: Duration::from_millis(max_wait_ms),
        }
    }

    #[tokio::test]
    async fn test_alive_daemon_is_left_alone() {
        let mut probe = MockLivenessProbe::new();
        probe.expect_is_alive().times(1).returning(|| true);
        let mut launcher = MockDaemonLauncher::new();
        launcher.expect_launch().never();

        let bootstrapper = DaemonBootstrapper::new(probe, launcher, fast_policy(1000));
        bootstrapper.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_dead_daemon_is_spawned_once_then_probed_until_alive() {
        let probes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&probes);

        let mut probe = MockLivenessProbe::new();
        probe
            .expect_is_alive()
            .returning(move || counter.fetch_add(1, Ordering::SeqCst) >= 3);
        let mut launcher = MockDaemonLauncher::new();
        launcher.expect_launch().times(1).returning(|| Ok(()));

        let bootstrapper = DaemonBootstrapper::new(probe, launcher, fast_policy(5000));
        bootstrapper.run().await.unwrap();

        assert_eq!(probes.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_times_out_under_tiny_bound() {
        let mut probe = MockLivenessProbe::new();
        probe.expect_is_alive().returning(|| false);
        let mut launcher = MockDaemonLauncher::new();
        launcher.expect_launch().times(1).returning(|| Ok(()));

        let bootstrapper = DaemonBootstrapper::new(probe, launcher, fast_policy(20));
        let err = bootstrapper.run().await.unwrap_err();

        assert!(matches!(err, RsuvError::BootstrapTimeout { .. }));
        assert_eq!(err.exit_code(), 3);
    }

    #[tokio::test]
    async fn test_spawn_failure_still_waits_for_another_daemon() {
        let probes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&probes);

        let mut probe = MockLivenessProbe::new();
        probe
            .expect_is_alive()
            .returning(move || counter.fetch_add(1, Ordering::SeqCst) >= 2);
        let mut launcher = MockDaemonLauncher::new();
        launcher.expect_launch().times(1).returning(|| {
            Err(RsuvError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no such binary",
            )))
        });

        let bootstrapper = DaemonBootstrapper::new(probe, launcher, fast_policy(5000));
        bootstrapper.run().await.unwrap();
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let max = Duration::from_millis(100);
        let mut backoff = Duration::from_millis(25);
        let mut seen = Vec::new();
        for _ in 0..4 {
            backoff = next_backoff(backoff, max);
            seen.push(backoff.as_millis());
        }
        assert_eq!(seen, vec![50, 100, 100, 100]);
    }

    #[test]
    fn test_daemon_command_arguments() {
        let config = BridgeConfig::for_state_dir(Path::new("/tmp/state"), "127.0.0.1", 18123);
        let launcher = ProcessLauncher::with_executable(PathBuf::from("/usr/bin/rsuv"), &config);

        let args: Vec<_> = launcher
            .args()
            .iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(
            args,
            vec![
                "serv",
                "--host",
                "127.0.0.1",
                "--port",
                "18123",
                "--socket",
                "/tmp/state/rsuv.sock"
            ]
        );

        let cmd = launcher.create_daemon_command();
        assert_eq!(cmd.get_program(), "/usr/bin/rsuv");
    }

    #[tokio::test]
    async fn test_rpc_probe_reports_missing_daemon_as_dead() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = BridgeConfig::for_state_dir(temp_dir.path(), "127.0.0.1", 1);
        assert!(!RpcProbe::new(&config).is_alive().await);
    }
}
