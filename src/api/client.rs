use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::api::transport::{ApiRequest, MultipartForm, RawResponse, RequestBody, Transport, Verb};
use crate::config::ApiConfig;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Unexpected non-JSON response (status {status})")]
    UnexpectedBody { status: u16 },
}

/// What a caller hands to `post`/`put`. Multipart bypasses JSON serialization.
#[derive(Debug, Clone, Default)]
pub enum Payload {
    #[default]
    Empty,
    Json(Value),
    Multipart(MultipartForm),
}

#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Backend cookie of the signed-in session.
    pub cookie: Option<String>,
}

impl RequestOptions {
    pub fn with_cookie(cookie: Option<&str>) -> Self {
        Self {
            cookie: cookie.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub set_cookies: Vec<String>,
    pub body: ResponseBody,
}

/// Application-level outcome of a backend call that answered with JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply<T> {
    Success(T),
    Failure(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

pub const UNKNOWN_FAILURE: &str = "عملیات ناموفق بود";

impl ApiResponse {
    /// Read the `success`/`message` envelope and, on success, the typed payload.
    pub fn reply<T: DeserializeOwned>(&self) -> Result<Reply<T>, ApiError> {
        let value = match &self.body {
            ResponseBody::Json(value) => value,
            ResponseBody::Text(_) => {
                return Err(ApiError::UnexpectedBody {
                    status: self.status,
                })
            }
        };

        let envelope = Envelope::deserialize(value)?;
        if !envelope.success {
            let message = envelope
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| UNKNOWN_FAILURE.to_string());
            return Ok(Reply::Failure(message));
        }

        Ok(Reply::Success(T::deserialize(value)?))
    }
}

/// Thin wrapper over the backend REST API.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    with_credentials: bool,
    #[allow(dead_code)]
    timeout: Duration,
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: config.base_url.clone(),
            with_credentials: config.with_credentials,
            timeout: Duration::from_millis(config.timeout_ms),
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, endpoint: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let endpoint = endpoint.trim_start_matches('/');
        format!("{}/{}", base, endpoint)
    }

    pub async fn get(&self, endpoint: &str, options: RequestOptions) -> Result<ApiResponse, ApiError> {
        self.request(Verb::Get, endpoint, Payload::Empty, options).await
    }

    pub async fn post(
        &self,
        endpoint: &str,
        payload: Payload,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        self.request(Verb::Post, endpoint, payload, options).await
    }

    pub async fn put(
        &self,
        endpoint: &str,
        payload: Payload,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        self.request(Verb::Put, endpoint, payload, options).await
    }

    pub async fn delete(&self, endpoint: &str, options: RequestOptions) -> Result<ApiResponse, ApiError> {
        self.request(Verb::Delete, endpoint, Payload::Empty, options).await
    }

    async fn request(
        &self,
        verb: Verb,
        endpoint: &str,
        payload: Payload,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        let url = self.build_url(endpoint);
        let body = match payload {
            Payload::Empty => RequestBody::Empty,
            Payload::Json(value) => RequestBody::Json(serde_json::to_vec(&value)?),
            Payload::Multipart(form) => RequestBody::Multipart(form),
        };
        let cookie = if self.with_credentials {
            options.cookie
        } else {
            None
        };

        let request = ApiRequest {
            verb,
            url,
            cookie,
            body,
        };

        let raw = self.transport.send(request).await.map_err(|e| {
            tracing::error!("API request to {} failed: {}", endpoint, e);
            ApiError::Transport(e)
        })?;

        decode(raw)
    }
}

fn decode(raw: RawResponse) -> Result<ApiResponse, ApiError> {
    let is_json = raw
        .content_type
        .as_deref()
        .map(|ct| ct.contains("application/json"))
        .unwrap_or(false);

    let body = if is_json {
        ResponseBody::Json(serde_json::from_slice(&raw.body)?)
    } else {
        ResponseBody::Text(String::from_utf8_lossy(&raw.body).into_owned())
    };

    Ok(ApiResponse {
        status: raw.status,
        content_type: raw.content_type,
        set_cookies: raw.set_cookies,
        body,
    })
}
