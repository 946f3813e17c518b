
use crate::error::{RemoteErrorCode, TransportError};
use crate::ipc::{self, IpcPath};
use crate::model::{ExitSignal, OperationRequest, OperationResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::time::timeout;

/// Unary requests understood by the daemon's local socket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RpcRequest {
    Start(OperationRequest),
    Stop(OperationRequest),
    Shutdown,
    Version,
}

/// Replies written by the daemon, one JSON object per line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RpcResponse {
    Ok {
        message: String,
    },
    Exit {
        code: i32,
    },
    Error {
        code: RemoteErrorCode,
        message: String,
    },
}

impl RpcResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        RpcResponse::Ok {
            message: message.into(),
        }
    }

    pub fn error(code: RemoteErrorCode, message: impl Into<String>) -> Self {
        RpcResponse::Error {
            code,
            message: message.into(),
        }
    }
}

/// Client for the daemon's local RPC socket.
///
/// Every call dials a fresh connection; the stream is dropped when the call
/// returns, whichever way it returns.
#[derive(Debug, Clone)]
pub struct RpcClient {
    pub socket_path: IpcPath,
    pub timeout: Duration,
}

impl RpcClient {
    pub fn new(socket_path: IpcPath, timeout: Duration) -> Self {
        Self {
            socket_path,
            timeout,
        }
    }

    /// Send one request and read one response
    pub async fn call(&self, request: &RpcRequest) -> Result<RpcResponse, TransportError> {
        let request_json = serde_json::to_string(request)
            .map_err(|e| TransportError::Malformed(format!("failed to encode request: {e}")))?;

        let stream = ipc::connect(&self.socket_path, self.timeout).await?;
        let (reader, mut writer) = stream.into_split();

        timeout(
            self.timeout,
            writer.write_all(format!("{request_json}\n").as_bytes()),
        )
        .await
        .map_err(|_| TransportError::Timeout("sending request".to_string()))?
        .map_err(|e| TransportError::Connection(format!("failed to send request: {e}")))?;

        let mut reader = BufReader::new(reader);
        let mut response_line = String::new();
        let bytes_read = timeout(self.timeout, reader.read_line(&mut response_line))
            .await
            .map_err(|_| TransportError::Timeout("waiting for daemon reply".to_string()))?
            .map_err(|e| TransportError::Connection(format!("failed to read response: {e}")))?;

        if bytes_read == 0 {
            return Err(TransportError::Malformed(
                "daemon closed the connection without replying".to_string(),
            ));
        }

        serde_json::from_str(response_line.trim())
            .map_err(|e| TransportError::Malformed(format!("failed to parse response: {e}")))
    }

    pub async fn start(&self, name: &str) -> Result<OperationResult, TransportError> {
        let response = self
            .call(&RpcRequest::Start(OperationRequest::new(name)))
            .await?;
        expect_message("start", response)
    }

    pub async fn stop(&self, name: &str) -> Result<OperationResult, TransportError> {
        let response = self
            .call(&RpcRequest::Stop(OperationRequest::new(name)))
            .await?;
        expect_message("stop", response)
    }

    pub async fn version(&self) -> Result<OperationResult, TransportError> {
        let response = self.call(&RpcRequest::Version).await?;
        expect_message("version", response)
    }

    pub async fn shutdown(&self) -> Result<ExitSignal, TransportError> {
        match self.call(&RpcRequest::Shutdown).await? {
            RpcResponse::Exit { code } => Ok(ExitSignal { code }),
            RpcResponse::Error { code, message } => Err(TransportError::Remote { code, message }),
            other => Err(unexpected("shutdown", &other)),
        }
    }
}

fn expect_message(op: &str, response: RpcResponse) -> Result<OperationResult, TransportError> {
    match response {
        RpcResponse::Ok { message } => Ok(OperationResult { message }),
        RpcResponse::Error { code, message } => Err(TransportError::Remote { code, message }),
        other => Err(unexpected(op, &other)),
    }
}

fn unexpected(op: &str, response: &RpcResponse) -> TransportError {
    TransportError::Malformed(format!("unexpected reply to {op}: {response:?}"))
}
