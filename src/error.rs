#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_error_display() {
        let error = RsuvError::Usage("unrecognized command 'frob'".to_string());
        assert_eq!(error.to_string(), "unrecognized command 'frob'");
        assert_eq!(error.exit_code(), 2);
        assert_eq!(error.error_code(), "USAGE_ERROR");
    }

    #[test]
    fn test_bootstrap_timeout_exit_code() {
        let error = RsuvError::BootstrapTimeout { waited_ms: 250 };
        assert_eq!(
            error.to_string(),
            "daemon did not become reachable within 250ms"
        );
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_plugin_exit_code_is_propagated() {
        let error = RsuvError::PluginExit {
            name: "foo".to_string(),
            code: 42,
        };
        assert_eq!(error.exit_code(), 42);
        assert_eq!(error.to_string(), "plugin 'foo' exited with status 42");
    }

    #[test]
    fn test_remote_not_found_is_discriminated() {
        let error: RsuvError = TransportError::Remote {
            code: RemoteErrorCode::NotFound,
            message: "no such program".to_string(),
        }
        .into();
        assert!(error.is_not_found());
        assert_eq!(error.exit_code(), 1);

        let other: RsuvError = TransportError::Malformed("garbage".to_string()).into();
        assert!(!other.is_not_found());
    }

    #[test]
    fn test_http_status_body_is_single_line() {
        let error = TransportError::http_status(409, "program exists\nsecond line\n");
        assert_eq!(
            error.to_string(),
            "daemon returned HTTP 409: program exists second line"
        );
    }

    #[test]
    fn test_remote_error_code_wire_format() {
        let json = serde_json::to_string(&RemoteErrorCode::NotFound).unwrap();
        assert_eq!(json, "\"not_found\"");
        let code: RemoteErrorCode = serde_json::from_str("\"conflict\"").unwrap();
        assert_eq!(code, RemoteErrorCode::Conflict);
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_error = toml::from_str::<toml::Value>("invalid = [toml").unwrap_err();
        let error: RsuvError = toml_error.into();
        assert!(matches!(error, RsuvError::ConfigError(_)));
    }
}

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reason a daemon refused an operation, carried on the wire so callers can
/// match on it instead of parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorCode {
    NotFound,
    Invalid,
    Conflict,
    Internal,
}

impl std::fmt::Display for RemoteErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RemoteErrorCode::NotFound => "not_found",
            RemoteErrorCode::Invalid => "invalid",
            RemoteErrorCode::Conflict => "conflict",
            RemoteErrorCode::Internal => "internal",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("cannot connect to daemon at {endpoint}: {reason}")]
    Dial { endpoint: String, reason: String },

    #[error("timed out {0}")]
    Timeout(String),

    #[error("daemon refused request ({code}): {message}")]
    Remote {
        code: RemoteErrorCode,
        message: String,
    },

    #[error("daemon returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("malformed response from daemon: {0}")]
    Malformed(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl TransportError {
    /// Builds an HTTP status error, folding a multi-line body onto one line.
    pub fn http_status(status: u16, body: &str) -> Self {
        let body = body.split_whitespace().collect::<Vec<_>>().join(" ");
        TransportError::HttpStatus { status, body }
    }
}

#[derive(Error, Debug)]
pub enum RsuvError {
    #[error("daemon did not become reachable within {waited_ms}ms")]
    BootstrapTimeout { waited_ms: u64 },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("{0}")]
    Usage(String),

    #[error("plugin '{name}' exited with status {code}")]
    PluginExit { name: String, code: i32 },

    #[error("cannot run plugin '{name}': {reason}")]
    PluginLaunch { name: String, reason: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<toml::de::Error> for RsuvError {
    fn from(error: toml::de::Error) -> Self {
        RsuvError::ConfigError(error.to_string())
    }
}

impl RsuvError {
    pub fn error_code(&self) -> &'static str {
        match self {
            RsuvError::BootstrapTimeout { .. } => "BOOTSTRAP_TIMEOUT",
            RsuvError::Transport(_) => "TRANSPORT_ERROR",
            RsuvError::Usage(_) => "USAGE_ERROR",
            RsuvError::PluginExit { .. } => "PLUGIN_EXIT",
            RsuvError::PluginLaunch { .. } => "PLUGIN_LAUNCH_ERROR",
            RsuvError::ConfigError(_) => "CONFIG_ERROR",
            RsuvError::IoError(_) => "IO_ERROR",
        }
    }

    /// Process exit status the invocation should end with.
    pub fn exit_code(&self) -> i32 {
        match self {
            RsuvError::Usage(_) => 2,
            RsuvError::BootstrapTimeout { .. } => 3,
            RsuvError::PluginExit { code, .. } => *code,
            RsuvError::PluginLaunch { .. } => 126,
            RsuvError::Transport(_) | RsuvError::ConfigError(_) | RsuvError::IoError(_) => 1,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RsuvError::Transport(TransportError::Remote {
                code: RemoteErrorCode::NotFound,
                ..
            })
        )
    }
}

pub type Result<T> = std::result::Result<T, RsuvError>;
