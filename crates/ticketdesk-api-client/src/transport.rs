use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use ticketdesk_client_core::auth::{AuthInputError, normalize_base_url, resolve_api_base_url};
use ticketdesk_client_core::transport::{MultipartFile, RequestBody};
use ticketdesk_client_core::{ApiRequest, ApiResponse, HttpMethod, HttpTransport, TransportError};
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const MIN_TIMEOUT_MS: u64 = 250;

#[derive(Debug, Clone)]
pub struct ReqwestTransportConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl ReqwestTransportConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Base URL from `TICKETDESK_API_BASE_URL`, falling back to the local default.
    pub fn from_env() -> Result<Self, TransportConfigError> {
        let (base_url, source) = resolve_api_base_url()?;
        debug!(%base_url, source, "resolved api base url");
        Ok(Self::new(base_url))
    }
}

#[derive(Debug, Error)]
pub enum TransportConfigError {
    #[error(transparent)]
    BaseUrl(#[from] AuthInputError),
    #[error("ticketdesk_http_client_build_failed:{message}")]
    Build { message: String },
}

/// `HttpTransport` over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    base_url: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: ReqwestTransportConfig) -> Result<Self, TransportConfigError> {
        let base_url = normalize_base_url(&config.base_url)?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(|error| TransportConfigError::Build {
                message: error.to_string(),
            })?;
        Ok(Self {
            base_url,
            timeout: Duration::from_millis(config.timeout_ms.max(MIN_TIMEOUT_MS)),
            http,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn endpoint(&self, path: &str) -> Option<String> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.starts_with('/') {
            Some(format!("{}{}", self.base_url, trimmed))
        } else {
            Some(format!("{}/{}", self.base_url, trimmed))
        }
    }

    fn build(&self, request: &ApiRequest) -> Result<reqwest::RequestBuilder, TransportError> {
        let url = self
            .endpoint(&request.path)
            .ok_or_else(|| TransportError::InvalidRequest {
                message: "request path is empty".to_string(),
            })?;

        let mut builder = self
            .http
            .request(method(request.method), url.as_str())
            .header("x-request-id", format!("req_{}", Uuid::new_v4().simple()))
            .timeout(self.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        Ok(match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(files) => builder.multipart(multipart_form(files)?),
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let response = self
            .build(request)?
            .send()
            .await
            .map_err(|error| TransportError::Network {
                message: error.to_string(),
            })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|error| TransportError::Network {
                message: error.to_string(),
            })?;

        debug!(
            method = request.method.as_str(),
            path = %request.path,
            status,
            "response received"
        );
        Ok(ApiResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

fn method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

fn multipart_form(files: &[MultipartFile]) -> Result<reqwest::multipart::Form, TransportError> {
    let mut form = reqwest::multipart::Form::new();
    for file in files {
        let mut part =
            reqwest::multipart::Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
        if let Some(content_type) = file.content_type.as_deref() {
            part = part
                .mime_str(content_type)
                .map_err(|error| TransportError::InvalidRequest {
                    message: format!("invalid content type {content_type}: {error}"),
                })?;
        }
        form = form.part(file.field.clone(), part);
    }
    Ok(form)
}
