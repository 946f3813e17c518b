#![allow(dead_code)]

use assert_cmd::Command;
use rsuv::config::BridgeConfig;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sysinfo::{Pid, ProcessStatus, Signal as SysinfoSignal, System};
use tempfile::TempDir;

pub const HOST: &str = "127.0.0.1";

/// Pick a port nothing is listening on right now
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind((HOST, 0)).expect("Failed to bind probe port");
    listener.local_addr().expect("No local address").port()
}

/// Isolated home directory and daemon port for one test.
///
/// Every command runs with `HOME` pointed into a temp dir, so each test gets
/// its own state directory, socket and plugin root. Any daemon started for the
/// test is shut down on drop.
pub struct RsuvTestEnvironment {
    temp_dir: TempDir,
    home_dir: PathBuf,
    work_dir: PathBuf,
    port: u16,
}

impl RsuvTestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let home_dir = temp_dir.path().join("home");
        let work_dir = temp_dir.path().join("work");

        std::fs::create_dir_all(&home_dir).expect("Failed to create home dir");
        std::fs::create_dir_all(&work_dir).expect("Failed to create work dir");

        Self {
            temp_dir,
            home_dir,
            work_dir,
            port: free_port(),
        }
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state_dir(&self) -> PathBuf {
        self.home_dir.join(".rsuv")
    }

    pub fn socket_path(&self) -> PathBuf {
        self.state_dir().join("rsuv.sock")
    }

    pub fn plugin_root(&self) -> PathBuf {
        self.state_dir().join("cmdplugin")
    }

    pub fn binary_path(&self) -> PathBuf {
        assert_cmd::cargo::cargo_bin("rsuv")
    }

    /// Config the binary ends up with for this environment
    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig::for_state_dir(&self.state_dir(), HOST, self.port)
    }

    /// Create an rsuv command with the environment's variables set
    pub fn rsuv_cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("rsuv").expect("rsuv binary not built");
        cmd.env("HOME", &self.home_dir)
            .env("RSUV_SERVER_HOST", HOST)
            .env("RSUV_SERVER_PORT", self.port.to_string())
            .env_remove("RUST_LOG")
            .current_dir(&self.work_dir)
            .timeout(Duration::from_secs(30));
        cmd
    }

    /// Async variant of [`Self::rsuv_cmd`] for concurrent invocations
    pub fn rsuv_tokio_cmd(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(self.binary_path());
        cmd.env("HOME", &self.home_dir)
            .env("RSUV_SERVER_HOST", HOST)
            .env("RSUV_SERVER_PORT", self.port.to_string())
            .env_remove("RUST_LOG")
            .current_dir(&self.work_dir);
        cmd
    }

    pub fn write_config(&self, content: &str) {
        std::fs::create_dir_all(self.state_dir()).expect("Failed to create state dir");
        std::fs::write(self.state_dir().join("config.toml"), content)
            .expect("Failed to write config.toml");
    }

    /// Install `<plugin root>/<name>/run` with the given script and mode
    pub fn install_plugin(&self, name: &str, script: &str, mode: u32) -> PathBuf {
        let dir = self.plugin_root().join(name);
        std::fs::create_dir_all(&dir).expect("Failed to create plugin dir");
        let run = dir.join("run");
        std::fs::write(&run, script).expect("Failed to write plugin");
        std::fs::set_permissions(&run, std::fs::Permissions::from_mode(mode))
            .expect("Failed to set plugin mode");
        dir
    }

    /// PIDs of live daemons serving this environment's socket
    pub fn daemon_pids(&self) -> Vec<Pid> {
        let system = System::new_all();
        let socket = self.socket_path().to_string_lossy().to_string();

        system
            .processes()
            .iter()
            .filter(|(_, process)| process.status() != ProcessStatus::Zombie)
            // sysinfo lists Linux threads as processes; keep only real processes
            .filter(|(_, process)| process.thread_kind().is_none())
            .filter(|(_, process)| {
                let cmd: Vec<String> = process
                    .cmd()
                    .iter()
                    .map(|arg| arg.to_string_lossy().to_string())
                    .collect();
                cmd.iter().any(|arg| arg == "serv") && cmd.iter().any(|arg| *arg == socket)
            })
            .map(|(pid, _)| *pid)
            .collect()
    }

    /// Wait until exactly `expected` daemons remain or the deadline passes
    pub async fn settle_daemon_count(&self, expected: usize, deadline: Duration) -> usize {
        let started = std::time::Instant::now();
        loop {
            let count = self.daemon_pids().len();
            if count == expected || started.elapsed() >= deadline {
                return count;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    fn request_shutdown(&self) {
        let Ok(mut stream) = std::os::unix::net::UnixStream::connect(self.socket_path()) else {
            return;
        };
        let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
        let _ = stream.write_all(b"{\"op\":\"shutdown\"}\n");
        let mut reply = String::new();
        let _ = std::io::Read::read_to_string(&mut stream, &mut reply);
    }
}

impl Drop for RsuvTestEnvironment {
    fn drop(&mut self) {
        self.request_shutdown();

        // Anything still around after a grace period gets killed
        for _ in 0..20 {
            if self.daemon_pids().is_empty() {
                return;
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        let system = System::new_all();
        for pid in self.daemon_pids() {
            if let Some(process) = system.process(pid) {
                let _ = process.kill_with(SysinfoSignal::Kill);
            }
        }
    }
}
