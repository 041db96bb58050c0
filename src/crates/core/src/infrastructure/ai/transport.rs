//! HTTP plumbing for both backends.

use super::config::TarxClientConfig;
use super::routing::{MeshHealthProbe, MESH_PROBE_TIMEOUT};
use crate::util::errors::{TarxError, TarxResult};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tarx_ai_adapters::{ChatCompletionRequest, MeshQueryRequest, MeshStatus};

pub const LOCAL_BACKEND: &str = "local-server";
pub const MESH_BACKEND: &str = "mesh";
pub const LOCAL_HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const EVENT_STREAM: &str = "text/event-stream";

pub struct HttpTransport {
    client: Client,
    completions_url: String,
    local_health_url: String,
    mesh_status_url: String,
    mesh_query_url: String,
}

impl HttpTransport {
    pub fn new(config: &TarxClientConfig) -> Self {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("tarx-core/", env!("CARGO_PKG_VERSION"))),
        );

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .use_rustls_tls()
            .default_headers(default_headers)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to create HTTP client, using default config: {}", e);
                Client::new()
            });

        Self {
            client,
            completions_url: config.local_endpoint("/v1/chat/completions"),
            local_health_url: config.local_endpoint("/health"),
            mesh_status_url: config.mesh_endpoint("/mesh/status"),
            mesh_query_url: config.mesh_endpoint("/mesh/query/stream"),
        }
    }

    /// Opens the local streaming completion; resolves once headers arrive.
    pub async fn open_local_stream(&self, body: &ChatCompletionRequest<'_>) -> TarxResult<Response> {
        debug!(
            "Opening local stream: url={}, model={}, messages={}",
            self.completions_url,
            body.model,
            body.messages.len()
        );
        let response = self
            .client
            .post(&self.completions_url)
            .json(body)
            .send()
            .await
            .map_err(|e| TarxError::transport(LOCAL_BACKEND, e.to_string()))?;
        check_stream_response(LOCAL_BACKEND, response).await
    }

    pub async fn open_mesh_stream(&self, body: &MeshQueryRequest<'_>) -> TarxResult<Response> {
        debug!(
            "Opening mesh stream: url={}, model={}",
            self.mesh_query_url, body.model
        );
        let response = self
            .client
            .post(&self.mesh_query_url)
            .header(ACCEPT, EVENT_STREAM)
            .json(body)
            .send()
            .await
            .map_err(|e| TarxError::transport(MESH_BACKEND, e.to_string()))?;
        check_stream_response(MESH_BACKEND, response).await
    }

    /// `GET {localBase}/health`; any 2xx counts as healthy.
    pub async fn local_health(&self) -> TarxResult<()> {
        let response = self
            .client
            .get(&self.local_health_url)
            .timeout(LOCAL_HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| TarxError::from_reqwest(LOCAL_BACKEND, LOCAL_HEALTH_TIMEOUT, e))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(TarxError::Http {
                backend: LOCAL_BACKEND,
                status: status.as_u16(),
                body: String::new(),
            })
        }
    }
}

#[async_trait]
impl MeshHealthProbe for HttpTransport {
    async fn mesh_status(&self) -> TarxResult<MeshStatus> {
        let response = self
            .client
            .get(&self.mesh_status_url)
            .timeout(MESH_PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| TarxError::from_reqwest(MESH_BACKEND, MESH_PROBE_TIMEOUT, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TarxError::Http {
                backend: MESH_BACKEND,
                status: status.as_u16(),
                body: String::new(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TarxError::from_reqwest(MESH_BACKEND, MESH_PROBE_TIMEOUT, e))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

async fn check_stream_response(backend: &'static str, response: Response) -> TarxResult<Response> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(TarxError::Http {
            backend,
            status: status.as_u16(),
            body,
        });
    }
    // Null-body statuses carry no stream at all.
    if status == StatusCode::NO_CONTENT || status == StatusCode::RESET_CONTENT {
        return Err(TarxError::MissingBody { backend });
    }
    Ok(response)
}
