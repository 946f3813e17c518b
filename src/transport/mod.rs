//! Uniform call surface over the daemon's two wire protocols.
//!
//! Lifecycle operations (start, stop, shutdown, version) go over the local
//! RPC socket; introspection and bulk operations (listing and registering
//! programs) go over JSON/HTTP. Nothing here retries: the first failure is
//! returned to the caller.

pub mod http;
pub mod rpc;

pub use http::HttpClient;
pub use rpc::{RpcClient, RpcRequest, RpcResponse};

use crate::config::BridgeConfig;
use crate::error::Result;
use crate::model::{ExitSignal, OperationResult, ProgramRuntimeView, ProgramSpec};
use async_trait::async_trait;

/// Every daemon operation the command line can issue
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DaemonTransport: Send + Sync {
    async fn start(&self, name: &str) -> Result<OperationResult>;

    async fn stop(&self, name: &str) -> Result<OperationResult>;

    async fn shutdown(&self) -> Result<ExitSignal>;

    async fn version(&self) -> Result<OperationResult>;

    async fn list_programs(&self) -> Result<Vec<ProgramRuntimeView>>;

    async fn add_program(&self, spec: &ProgramSpec) -> Result<OperationResult>;
}

pub struct TransportClient {
    rpc: RpcClient,
    http: HttpClient,
}

impl TransportClient {
    pub fn new(config: &BridgeConfig) -> Result<Self> {
        Ok(Self {
            rpc: RpcClient::new(config.socket_path.clone(), config.request_timeout),
            http: HttpClient::new(config.base_url(), config.request_timeout)?,
        })
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }
}

#[async_trait]
impl DaemonTransport for TransportClient {
    async fn start(&self, name: &str) -> Result<OperationResult> {
        Ok(self.rpc.start(name).await?)
    }

    async fn stop(&self, name: &str) -> Result<OperationResult> {
        Ok(self.rpc.stop(name).await?)
    }

    async fn shutdown(&self) -> Result<ExitSignal> {
        Ok(self.rpc.shutdown().await?)
    }

    async fn version(&self) -> Result<OperationResult> {
        Ok(self.rpc.version().await?)
    }

    async fn list_programs(&self) -> Result<Vec<ProgramRuntimeView>> {
        Ok(self.http.list_programs().await?)
    }

    async fn add_program(&self, spec: &ProgramSpec) -> Result<OperationResult> {
        Ok(self.http.add_program(spec).await?)
    }
}
