use crate::error::RemoteErrorCode;
use crate::logging::log_program_event;
use crate::model::{OperationResult, ProgramRuntimeView, ProgramSpec};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::warn;

pub type SharedRegistry = Arc<Mutex<ProgramRegistry>>;

/// Why the registry turned an operation down
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refusal {
    pub code: RemoteErrorCode,
    pub message: String,
}

impl Refusal {
    fn new(code: RemoteErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn not_found(name: &str) -> Self {
        Self::new(RemoteErrorCode::NotFound, format!("program {name:?} not found"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ProgramStatus {
    Stopped,
    Running,
    Exited(i32),
    Fatal(String),
}

impl std::fmt::Display for ProgramStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgramStatus::Stopped => write!(f, "stopped"),
            ProgramStatus::Running => write!(f, "running"),
            ProgramStatus::Exited(code) => write!(f, "exited({code})"),
            ProgramStatus::Fatal(reason) => write!(f, "fatal: {reason}"),
        }
    }
}

struct ManagedProgram {
    spec: ProgramSpec,
    child: Option<Child>,
    status: ProgramStatus,
}

impl ManagedProgram {
    /// Pick up an exit that happened since the last look
    fn refresh(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                let code = status.code().unwrap_or(-1);
                log_program_event(&self.spec.name, "exited", &format!("status {code}"));
                self.status = ProgramStatus::Exited(code);
                self.child = None;
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to poll program {}: {e}", self.spec.name),
        }
    }

    fn view(&self) -> ProgramRuntimeView {
        ProgramRuntimeView {
            info: self.spec.clone(),
            status: self.status.to_string(),
        }
    }
}

/// In-memory table of the programs the daemon knows about, in the order they
/// were added. Names match byte for byte.
#[derive(Default)]
pub struct ProgramRegistry {
    programs: Vec<ManagedProgram>,
}

impl ProgramRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRegistry {
        Arc::new(Mutex::new(Self::new()))
    }

    fn find_mut(&mut self, name: &str) -> Result<&mut ManagedProgram, Refusal> {
        self.programs
            .iter_mut()
            .find(|p| p.spec.name == name)
            .ok_or_else(|| Refusal::not_found(name))
    }

    pub fn add(&mut self, spec: ProgramSpec) -> Result<OperationResult, Refusal> {
        spec.validate()
            .map_err(|e| Refusal::new(RemoteErrorCode::Invalid, e.to_string()))?;

        if self.programs.iter().any(|p| p.spec.name == spec.name) {
            return Err(Refusal::new(
                RemoteErrorCode::Conflict,
                format!("program {:?} already exists", spec.name),
            ));
        }

        let message = format!("program {:?} has been added", spec.name);
        log_program_event(&spec.name, "added", &spec.command.join(" "));
        self.programs.push(ManagedProgram {
            spec,
            child: None,
            status: ProgramStatus::Stopped,
        });

        Ok(OperationResult::new(message))
    }

    pub fn start(&mut self, name: &str) -> Result<OperationResult, Refusal> {
        let program = self.find_mut(name)?;
        program.refresh();

        if program.child.is_some() {
            return Ok(OperationResult::new(format!(
                "program {name:?} is already running"
            )));
        }

        let spec = &program.spec;
        let mut cmd = Command::new(&spec.command[0]);
        cmd.args(&spec.command[1..])
            .current_dir(&spec.dir)
            .envs(spec.env_pairs())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        match cmd.spawn() {
            Ok(child) => {
                let pid = child.id().unwrap_or_default();
                log_program_event(name, "started", &format!("pid {pid}"));
                program.child = Some(child);
                program.status = ProgramStatus::Running;
                Ok(OperationResult::new(format!("program {name:?} started")))
            }
            Err(e) => {
                program.status = ProgramStatus::Fatal(e.to_string());
                Err(Refusal::new(
                    RemoteErrorCode::Internal,
                    format!("failed to start program {name:?}: {e}"),
                ))
            }
        }
    }

    pub async fn stop(&mut self, name: &str) -> Result<OperationResult, Refusal> {
        let program = self.find_mut(name)?;
        program.refresh();

        let Some(mut child) = program.child.take() else {
            return Ok(OperationResult::new(format!("program {name:?} is not running")));
        };

        if let Err(e) = child.kill().await {
            warn!("Failed to kill program {name}: {e}");
        }
        program.status = ProgramStatus::Stopped;
        log_program_event(name, "stopped", "");

        Ok(OperationResult::new(format!("program {name:?} stopped")))
    }

    pub fn list(&mut self) -> Vec<ProgramRuntimeView> {
        self.programs
            .iter_mut()
            .map(|program| {
                program.refresh();
                program.view()
            })
            .collect()
    }

    pub async fn stop_all(&mut self) {
        for program in &mut self.programs {
            if let Some(mut child) = program.child.take() {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill program {}: {e}", program.spec.name);
                }
                program.status = ProgramStatus::Stopped;
            }
        }
    }
}
