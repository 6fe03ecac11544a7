//! Transport trait and the reqwest-backed implementation.

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// HTTP method of a service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// A fully described call against the service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRequest {
    pub method: HttpMethod,
    pub url: String,
    pub body: Option<serde_json::Value>,
}

impl ServiceRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            body: None,
        }
    }

    pub fn post<T: Serialize>(url: impl Into<String>, body: &T) -> ClientResult<Self> {
        Ok(Self {
            method: HttpMethod::Post,
            url: url.into(),
            body: Some(serde_json::to_value(body)?),
        })
    }

    /// Path component of the URL, for logs and mock matching.
    pub fn path(&self) -> &str {
        self.url
            .split_once("://")
            .and_then(|(_, rest)| rest.find('/').map(|i| &rest[i..]))
            .unwrap_or("/")
    }
}

/// Raw reply from one attempt, before status classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ServiceReply {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Performs a single network attempt.
///
/// Implementations must return promptly once `cancel` fires; the executor
/// owns timeouts and retries.
#[async_trait]
pub trait ServiceTransport: Send + Sync {
    async fn send(
        &self,
        request: &ServiceRequest,
        cancel: CancellationToken,
    ) -> ClientResult<ServiceReply>;
}

/// Transport over `reqwest`.
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn perform(&self, request: &ServiceRequest) -> ClientResult<ServiceReply> {
        let builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        let builder = match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        };

        let response = builder.send().await.map_err(classify_reqwest)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(classify_reqwest)?;

        debug!(url = %request.url, status, bytes = body.len(), "service replied");
        Ok(ServiceReply::new(status, body.to_vec()))
    }
}

#[async_trait]
impl ServiceTransport for HttpTransport {
    async fn send(
        &self,
        request: &ServiceRequest,
        cancel: CancellationToken,
    ) -> ClientResult<ServiceReply> {
        tokio::select! {
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            reply = self.perform(request) => reply,
        }
    }
}

fn classify_reqwest(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::timeout(err.to_string())
    } else {
        ClientError::transport(err.to_string())
    }
}
