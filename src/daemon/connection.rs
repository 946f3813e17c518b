use crate::error::{RemoteErrorCode, Result, RsuvError};
use crate::logging::{log_debug, log_error};
use crate::transport::{RpcRequest, RpcResponse};
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::time::timeout;

/// Longest request line the daemon accepts, newline included
pub const MAX_REQUEST_BYTES: u64 = 64 * 1024;

/// How long a client gets to deliver its request line
pub const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(10);

enum RequestLine {
    Line(String),
    Oversized,
    HungUp,
}

/// Handles one RPC connection on the daemon socket
pub struct ConnectionHandler;

impl ConnectionHandler {
    /// Read one request line, answer it, and return what was sent back.
    ///
    /// Returns `None` when the client hung up without sending anything.
    pub async fn handle_connection<F, Fut>(
        stream: UnixStream,
        request_processor: F,
    ) -> Result<Option<RpcResponse>>
    where
        F: FnOnce(RpcRequest) -> Fut,
        Fut: std::future::Future<Output = RpcResponse>,
    {
        Self::handle_connection_within(stream, REQUEST_READ_TIMEOUT, request_processor).await
    }

    async fn handle_connection_within<F, Fut>(
        stream: UnixStream,
        read_timeout: Duration,
        request_processor: F,
    ) -> Result<Option<RpcResponse>>
    where
        F: FnOnce(RpcRequest) -> Fut,
        Fut: std::future::Future<Output = RpcResponse>,
    {
        let mut reader = BufReader::new(stream);

        let request_line = match read_request(&mut reader, read_timeout).await {
            Ok(RequestLine::Line(line)) => line,
            Ok(RequestLine::HungUp) => {
                log_debug("daemon", "Client disconnected (0 bytes read)", None);
                return Ok(None);
            }
            Ok(RequestLine::Oversized) => {
                let response = RpcResponse::error(
                    RemoteErrorCode::Invalid,
                    format!("request exceeds {MAX_REQUEST_BYTES} bytes"),
                );
                return send_response(reader.into_inner(), response).await.map(Some);
            }
            Err(e) => {
                log_error("daemon", &format!("Failed to read request: {e}"), None);
                return Err(RsuvError::IoError(e));
            }
        };

        let response = match serde_json::from_str::<RpcRequest>(request_line.trim()) {
            Ok(request) => {
                log_debug("daemon", &format!("Processing request: {request:?}"), None);
                request_processor(request).await
            }
            Err(e) => {
                log_error(
                    "daemon",
                    &format!("Failed to parse request '{}': {e}", request_line.trim()),
                    None,
                );
                RpcResponse::error(RemoteErrorCode::Invalid, format!("invalid request: {e}"))
            }
        };

        send_response(reader.into_inner(), response).await.map(Some)
    }
}

async fn read_request(
    reader: &mut BufReader<UnixStream>,
    read_timeout: Duration,
) -> std::io::Result<RequestLine> {
    let mut line = String::new();
    let bytes_read = timeout(
        read_timeout,
        (&mut *reader).take(MAX_REQUEST_BYTES).read_line(&mut line),
    )
    .await
    .map_err(|_| std::io::Error::new(ErrorKind::TimedOut, "timed out waiting for request"))??;

    if bytes_read == 0 {
        Ok(RequestLine::HungUp)
    } else if bytes_read as u64 >= MAX_REQUEST_BYTES && !line.ends_with('\n') {
        Ok(RequestLine::Oversized)
    } else {
        Ok(RequestLine::Line(line))
    }
}

async fn send_response(mut stream: UnixStream, response: RpcResponse) -> Result<RpcResponse> {
    let response_json = serde_json::to_string(&response).map_err(|e| {
        RsuvError::IoError(std::io::Error::new(
            ErrorKind::InvalidData,
            format!("failed to serialize response: {e}"),
        ))
    })?;

    stream
        .write_all(format!("{response_json}\n").as_bytes())
        .await
        .map_err(|e| {
            log_error("daemon", &format!("Failed to send response: {e}"), None);
            RsuvError::IoError(e)
        })?;

    Ok(response)
}
