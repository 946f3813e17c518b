use crate::error::TransportError;
use crate::model::{OperationResult, ProgramRuntimeView, ProgramSpec};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const PROGRAMS_PATH: &str = "/api/programs";
pub const VERSION_PATH: &str = "/api/version";

/// JSON-over-HTTP client for the daemon's introspection endpoints
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        // The daemon is always local; environment proxies must not intercept it.
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `GET /api/programs`
    pub async fn list_programs(&self) -> Result<Vec<ProgramRuntimeView>, TransportError> {
        let response = self.client.get(self.url(PROGRAMS_PATH)).send().await?;
        decode(response).await
    }

    /// `POST /api/programs`
    pub async fn add_program(&self, spec: &ProgramSpec) -> Result<OperationResult, TransportError> {
        let response = self
            .client
            .post(self.url(PROGRAMS_PATH))
            .json(spec)
            .send()
            .await?;
        decode(response).await
    }

    /// `GET /api/version`
    pub async fn version(&self) -> Result<OperationResult, TransportError> {
        let response = self.client.get(self.url(VERSION_PATH)).send().await?;
        decode(response).await
    }
}

/// Turn a response into `T`, or into an error carrying the plain-text body
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, TransportError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(TransportError::http_status(status.as_u16(), &body));
    }

    serde_json::from_str(&body)
        .map_err(|e| TransportError::Malformed(format!("invalid JSON body: {e}")))
}
