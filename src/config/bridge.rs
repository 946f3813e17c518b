use crate::config::global::GlobalConfig;
use crate::ipc::IpcPath;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the plugin directory inside the state directory
pub const PLUGIN_DIR_NAME: &str = "cmdplugin";

/// Command-line overrides applied on top of the config file
#[derive(Debug, Clone, Default)]
pub struct ConnectionOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub socket: Option<PathBuf>,
}

/// Timing policy for bringing up the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapPolicy {
    pub probe_timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_wait: Duration,
}

impl Default for BootstrapPolicy {
    fn default() -> Self {
        Self::from_config(&GlobalConfig::default())
    }
}

impl BootstrapPolicy {
    fn from_config(config: &GlobalConfig) -> Self {
        let bootstrap = &config.bootstrap;
        Self {
            probe_timeout: Duration::from_millis(bootstrap.probe_timeout_ms),
            initial_backoff: Duration::from_millis(bootstrap.initial_backoff_ms),
            max_backoff: Duration::from_millis(bootstrap.max_backoff_ms),
            max_wait: Duration::from_millis(bootstrap.max_wait_ms),
        }
    }
}

/// Everything a component needs to find the daemon and the plugins.
///
/// Built once at process start and handed to each component; nothing reads
/// these locations from ambient state afterwards.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub state_dir: PathBuf,
    pub socket_path: IpcPath,
    pub plugin_root: PathBuf,
    pub http_host: String,
    pub http_port: u16,
    pub bootstrap: BootstrapPolicy,
    pub request_timeout: Duration,
}

impl BridgeConfig {
    pub fn new(global: &GlobalConfig, state_dir: &Path, overrides: &ConnectionOverrides) -> Self {
        let socket_path = match &overrides.socket {
            Some(path) => IpcPath::new(path.clone()),
            None => IpcPath::in_state_dir(state_dir),
        };

        Self {
            state_dir: state_dir.to_path_buf(),
            socket_path,
            plugin_root: state_dir.join(PLUGIN_DIR_NAME),
            http_host: overrides
                .host
                .clone()
                .unwrap_or_else(|| global.server.host.clone()),
            http_port: overrides.port.unwrap_or(global.server.port),
            bootstrap: BootstrapPolicy::from_config(global),
            request_timeout: Duration::from_millis(global.transport.request_timeout_ms),
        }
    }

    /// Defaults for a state directory, with the HTTP side on `host:port`
    pub fn for_state_dir(state_dir: &Path, host: &str, port: u16) -> Self {
        let overrides = ConnectionOverrides {
            host: Some(host.to_string()),
            port: Some(port),
            socket: None,
        };
        Self::new(&GlobalConfig::default(), state_dir, &overrides)
    }

    /// `host:port` of the daemon's HTTP endpoint
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.server_addr())
    }
}
