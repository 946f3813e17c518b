use crate::error::{Result, RsuvError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A named command the daemon can start and stop.
///
/// The first element of `command` is an absolute executable path; callers
/// resolve it before the spec is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramSpec {
    pub name: String,
    pub dir: PathBuf,
    pub command: Vec<String>,
    #[serde(default)]
    pub environ: Vec<String>,
}

impl ProgramSpec {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(RsuvError::Usage("program name must not be empty".to_string()));
        }

        let Some(executable) = self.command.first() else {
            return Err(RsuvError::Usage(format!(
                "program '{}' has an empty command line",
                self.name
            )));
        };

        if !std::path::Path::new(executable).is_absolute() {
            return Err(RsuvError::Usage(format!(
                "program '{}' executable '{executable}' is not an absolute path",
                self.name
            )));
        }

        for entry in &self.environ {
            if parse_env_entry(entry).is_none() {
                return Err(RsuvError::Usage(format!(
                    "invalid environment entry '{entry}', expected KEY=VALUE"
                )));
            }
        }

        Ok(())
    }

    /// Environment entries split into key/value pairs, skipping malformed ones.
    pub fn env_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.environ.iter().filter_map(|entry| parse_env_entry(entry))
    }
}

pub fn parse_env_entry(entry: &str) -> Option<(&str, &str)> {
    match entry.split_once('=') {
        Some((key, value)) if !key.is_empty() => Some((key, value)),
        _ => None,
    }
}

/// Read-only view of a program as reported by the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramRuntimeView {
    pub info: ProgramSpec,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRequest {
    pub name: String,
}

impl OperationRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub message: String,
}

impl OperationResult {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Exit status the daemon intends to terminate with after a shutdown request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitSignal {
    pub code: i32,
}
