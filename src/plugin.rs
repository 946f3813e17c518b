use crate::error::{Result, RsuvError};
use crate::logging::{log_debug, log_plugin_event};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;

/// Executable every plugin directory must provide
pub const PLUGIN_ENTRY_POINT: &str = "run";

/// Daemon `host:port`, handed to every plugin
pub const ENV_SERVER_ADDR: &str = "RSUV_SERVER_ADDR";

/// Verb the plugin was invoked as
pub const ENV_PLUGIN_NAME: &str = "RSUV_PLUGIN_NAME";

/// An externally installed subcommand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plugin {
    pub name: String,
    pub dir: PathBuf,
}

impl Plugin {
    pub fn entry_point(&self) -> PathBuf {
        self.dir.join(PLUGIN_ENTRY_POINT)
    }
}

/// Scan the plugin root for usable plugins, sorted by name.
///
/// A missing or unreadable root means no plugins.
pub fn discover(root: &Path) -> Vec<Plugin> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            log_debug(
                "plugin",
                &format!("No plugins loaded from {}: {e}", root.display()),
                None,
            );
            return Vec::new();
        }
    };

    let mut plugins: Vec<Plugin> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|entry| {
            let dir = entry.path();
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                log_debug("plugin", "Skipping plugin with non UTF-8 name", Some(&dir.display().to_string()));
                return None;
            };

            if !is_valid_verb(&name) {
                log_debug("plugin", &format!("Skipping '{name}': not a usable verb"), None);
                return None;
            }

            let plugin = Plugin { name, dir };
            if !is_executable(&plugin.entry_point()) {
                log_debug(
                    "plugin",
                    &format!("Skipping '{}': no executable {PLUGIN_ENTRY_POINT}", plugin.name),
                    None,
                );
                return None;
            }

            Some(plugin)
        })
        .collect();

    plugins.sort_by(|a, b| a.name.cmp(&b.name));
    plugins
}

fn is_valid_verb(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.starts_with('-')
        && !name.chars().any(char::is_whitespace)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Runs plugins in the foreground and reports their exit status
#[derive(Debug, Clone)]
pub struct PluginDispatcher {
    server_addr: String,
}

impl PluginDispatcher {
    pub fn new(server_addr: impl Into<String>) -> Self {
        Self {
            server_addr: server_addr.into(),
        }
    }

    /// Create command for a plugin invocation (extracted for testing)
    pub fn command(&self, plugin: &Plugin, args: &[String]) -> Command {
        let mut cmd = Command::new(plugin.entry_point());
        cmd.args(args)
            .current_dir(&plugin.dir)
            .env(ENV_SERVER_ADDR, &self.server_addr)
            .env(ENV_PLUGIN_NAME, &plugin.name)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        cmd
    }

    /// Run the plugin to completion and return its exit code.
    ///
    /// Interrupts reach the plugin through the shared process group; here they
    /// are swallowed so the plugin's own exit status is what gets reported.
    pub async fn invoke(&self, plugin: &Plugin, args: &[String]) -> Result<i32> {
        log_plugin_event(&plugin.name, "invoke", &args.join(" "));

        let mut child = self
            .command(plugin, args)
            .spawn()
            .map_err(|e| RsuvError::PluginLaunch {
                name: plugin.name.clone(),
                reason: e.to_string(),
            })?;

        let status = loop {
            tokio::select! {
                status = child.wait() => break status?,
                signal = tokio::signal::ctrl_c() => {
                    if signal.is_err() {
                        break child.wait().await?;
                    }
                    log_debug("plugin", "Interrupt absorbed while plugin runs", Some(&plugin.name));
                }
            }
        };

        let code = exit_code(status);
        log_plugin_event(&plugin.name, "exited", &format!("status {code}"));
        Ok(code)
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
