//! Wire types and the typed client for the generation service.
//!
//! Endpoints:
//! - `GET /`        liveness probe
//! - `POST /chat`   primary generation turn
//! - `POST /refine` instruction-driven edit of the current files
//! - `POST /export` packaged archive of the current files

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{ForgeSettings, RetryPolicy, API_URL_ENV};
use crate::error::{ClientError, ClientResult};
use crate::executor::{validate_url, RequestExecutor};
use crate::transport::{HttpTransport, ServiceRequest, ServiceTransport};

/// Map of filepath to full file content, as sent over the wire.
pub type FileMap = BTreeMap<String, String>;

/// Status of one plan task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
}

/// One step of the service's execution plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanTask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
}

/// A generated source file. `filepath` is its identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeArtifact {
    pub filepath: String,
    pub content: String,
}

impl CodeArtifact {
    pub fn new(filepath: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filepath: filepath.into(),
            content: content.into(),
        }
    }
}

/// Security verdict the service attaches to generated code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Clean,
    Vulnerable,
    Broken,
}

impl BuildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Vulnerable => "vulnerable",
            Self::Broken => "broken",
        }
    }
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

/// Reply of `POST /chat`. `response` is required; everything else is an
/// optional slot update.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ChatReply {
    pub response: String,
    #[serde(default)]
    pub spec_document: Option<String>,
    #[serde(default)]
    pub plan: Option<Vec<PlanTask>>,
    #[serde(default)]
    pub code_generated: Option<Vec<CodeArtifact>>,
    #[serde(default)]
    pub build_status: Option<BuildStatus>,
}

/// Body of `POST /refine`.
#[derive(Debug, Clone, Serialize)]
pub struct RefineRequest {
    pub instruction: String,
    pub current_files: FileMap,
}

/// Reply of `POST /refine`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RefineReply {
    pub success: bool,
    #[serde(default)]
    pub modified_files: Option<FileMap>,
}

/// Body of `POST /export`.
#[derive(Debug, Clone, Serialize)]
pub struct ExportRequest {
    pub files: FileMap,
}

/// Typed client for the generation service.
///
/// Holds the base URL (if configured) and the executor. A missing base URL
/// is reported as a configuration error by every call, before any network
/// activity.
#[derive(Clone)]
pub struct ForgeClient {
    base_url: Option<String>,
    executor: RequestExecutor,
    probe_timeout: Duration,
}

impl ForgeClient {
    pub fn new(base_url: Option<String>, transport: Arc<dyn ServiceTransport>, policy: RetryPolicy) -> Self {
        Self {
            base_url: base_url
                .map(|u| u.trim().trim_end_matches('/').to_string())
                .filter(|u| !u.is_empty()),
            executor: RequestExecutor::new(transport, policy),
            probe_timeout: Duration::from_secs(15),
        }
    }

    /// Build a client over HTTP from resolved settings.
    pub fn from_settings(settings: &ForgeSettings) -> Self {
        Self::new(
            settings.api_url.clone(),
            Arc::new(HttpTransport::new()),
            settings.retry_policy(),
        )
        .with_probe_timeout(settings.probe_interval())
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Absolute URL for an endpoint path. A missing or malformed base URL is a
    /// configuration error.
    pub fn endpoint(&self, path: &str) -> ClientResult<String> {
        let base = self.base_url.as_deref().ok_or_else(|| {
            ClientError::Configuration(format!(
                "set {} (e.g. http://localhost:8000) to connect to the backend",
                API_URL_ENV
            ))
        })?;
        validate_url(base)?;
        Ok(format!("{}{}", base, path))
    }

    /// Single liveness probe against `GET /`. Never retried.
    pub async fn probe(&self, scope: &CancellationToken) -> ClientResult<()> {
        let request = ServiceRequest::get(self.endpoint("/")?);
        self.executor
            .with_policy(RetryPolicy::single_attempt(self.probe_timeout))
            .execute(&request, scope)
            .await
            .map(|_| ())
    }

    pub async fn chat(&self, request: &ChatRequest, scope: &CancellationToken) -> ClientResult<ChatReply> {
        let request = ServiceRequest::post(self.endpoint("/chat")?, request)?;
        self.executor.execute_json(&request, scope).await
    }

    pub async fn refine(
        &self,
        request: &RefineRequest,
        scope: &CancellationToken,
    ) -> ClientResult<RefineReply> {
        let request = ServiceRequest::post(self.endpoint("/refine")?, request)?;
        self.executor.execute_json(&request, scope).await
    }

    /// Returns the opaque archive bytes.
    pub async fn export(&self, request: &ExportRequest, scope: &CancellationToken) -> ClientResult<Vec<u8>> {
        let service_request = ServiceRequest::post(self.endpoint("/export")?, request)?;
        let reply = self.executor.execute(&service_request, scope).await?;
        info!(files = request.files.len(), bytes = reply.body.len(), "export archive received");
        Ok(reply.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockReply, MockTransport};
    use serde_json::json;

    fn client(transport: &MockTransport) -> ForgeClient {
        ForgeClient::new(
            Some("http://localhost:8000/".to_string()),
            Arc::new(transport.clone()),
            RetryPolicy::default(),
        )
    }

    #[test]
    fn test_chat_reply_with_all_slots() {
        let reply: ChatReply = serde_json::from_value(json!({
            "response": "Plan ready",
            "spec_document": "# Spec",
            "plan": [
                { "id": "TASK-001", "description": "Initialize schema", "status": "completed" },
                { "description": "Create auth endpoints" }
            ],
            "code_generated": [{ "filepath": "src/app.ts", "content": "export {}" }],
            "build_status": "vulnerable"
        }))
        .unwrap();

        let plan = reply.plan.unwrap();
        assert_eq!(plan[0].status, TaskStatus::Completed);
        assert_eq!(plan[1].status, TaskStatus::Pending);
        assert_eq!(plan[1].id, None);
        assert_eq!(reply.code_generated.unwrap()[0].filepath, "src/app.ts");
        assert_eq!(reply.build_status, Some(BuildStatus::Vulnerable));
    }

    #[test]
    fn test_chat_reply_requires_response() {
        let result = serde_json::from_value::<ChatReply>(json!({ "plan": [] }));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_build_status_is_rejected() {
        let result = serde_json::from_value::<ChatReply>(json!({
            "response": "x",
            "build_status": "exploded"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_endpoint_requires_base_url() {
        let unconfigured = ForgeClient::new(None, Arc::new(MockTransport::new()), RetryPolicy::default());
        assert!(!unconfigured.is_configured());
        assert!(matches!(
            unconfigured.endpoint("/chat"),
            Err(ClientError::Configuration(_))
        ));

        let blank = ForgeClient::new(Some("   ".into()), Arc::new(MockTransport::new()), RetryPolicy::default());
        assert!(!blank.is_configured());

        let configured = client(&MockTransport::new());
        assert_eq!(configured.endpoint("/chat").unwrap(), "http://localhost:8000/chat");
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheme_less_base_url_is_configuration_error() {
        let transport = MockTransport::new();
        let client = ForgeClient::new(
            Some("localhost:8000".into()),
            Arc::new(transport.clone()),
            RetryPolicy::default(),
        );

        assert!(matches!(client.endpoint("/chat"), Err(ClientError::Configuration(_))));
        assert!(matches!(
            client.probe(&CancellationToken::new()).await,
            Err(ClientError::Configuration(_))
        ));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_is_never_retried() {
        let transport = MockTransport::new().on("/", MockReply::status(503));

        let result = client(&transport).probe(&CancellationToken::new()).await;

        assert!(result.is_err());
        assert_eq!(transport.get_path_calls("/").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chat_sends_message_and_thread() {
        let transport = MockTransport::new().on("/chat", MockReply::ok(json!({ "response": "hello" })));

        let reply = client(&transport)
            .chat(
                &ChatRequest {
                    message: "Build a todo API".into(),
                    thread_id: Some("t-1".into()),
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(reply.response, "hello");
        let calls = transport.get_path_calls("/chat");
        assert_eq!(
            calls[0].body,
            Some(json!({ "message": "Build a todo API", "thread_id": "t-1" }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_export_returns_raw_bytes() {
        let transport = MockTransport::new().on("/export", MockReply::bytes(200, vec![0x50u8, 0x4b, 0x03, 0x04]));

        let mut files = FileMap::new();
        files.insert("a.ts".into(), "1".into());
        let bytes = client(&transport)
            .export(&ExportRequest { files }, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(bytes, vec![0x50u8, 0x4b, 0x03, 0x04]);
        assert_eq!(
            transport.get_path_calls("/export")[0].body,
            Some(json!({ "files": { "a.ts": "1" } }))
        );
    }
}
