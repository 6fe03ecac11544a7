//! Resilient request executor.
//!
//! Wraps one logical service call with a per-attempt timeout, an independent
//! cancellation scope for every attempt, and bounded linear backoff between
//! retryable failures.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::RetryPolicy;
use crate::error::{ClientError, ClientResult};
use crate::transport::{ServiceReply, ServiceRequest, ServiceTransport};

/// Longest service body excerpt carried in a service error.
const DETAIL_LIMIT: usize = 200;

/// State of one attempt inside an executor invocation.
#[derive(Debug)]
pub struct RequestAttempt {
    /// 0-based attempt index.
    pub index: u32,
    /// Scope for this attempt only; a child of the caller's scope.
    pub cancel: CancellationToken,
    pub started_at: Instant,
    pub budget: Duration,
}

impl RequestAttempt {
    fn begin(index: u32, scope: &CancellationToken, budget: Duration) -> Self {
        Self {
            index,
            cancel: scope.child_token(),
            started_at: Instant::now(),
            budget,
        }
    }
}

/// Executes service calls with timeout, retry, and failure classification.
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn ServiceTransport>,
    policy: RetryPolicy,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn ServiceTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Same transport, different policy.
    pub fn with_policy(&self, policy: RetryPolicy) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            policy,
        }
    }

    /// Run the call until it succeeds, fails with a non-retryable error, or
    /// the retry budget is spent. Only 2xx replies are returned.
    pub async fn execute(
        &self,
        request: &ServiceRequest,
        scope: &CancellationToken,
    ) -> ClientResult<ServiceReply> {
        validate_url(&request.url)?;

        let started = Instant::now();
        let mut index = 0;
        loop {
            let attempt = RequestAttempt::begin(index, scope, self.policy.timeout);
            debug!(
                path = request.path(),
                attempt = index + 1,
                max_attempts = self.policy.max_attempts(),
                "sending request"
            );

            let err = match self.run_attempt(request, &attempt, scope).await {
                Ok(reply) => {
                    debug!(
                        path = request.path(),
                        attempt = index + 1,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "request succeeded"
                    );
                    return Ok(reply);
                }
                Err(err) => err,
            };

            if !err.is_retryable() || index >= self.policy.max_retries {
                warn!(
                    path = request.path(),
                    attempts = index + 1,
                    kind = err.kind(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "request failed: {}",
                    err
                );
                return Err(err);
            }

            let delay = self.policy.delay_after(index);
            warn!(
                path = request.path(),
                attempt = index + 1,
                kind = err.kind(),
                delay_ms = delay.as_millis() as u64,
                "retrying after error: {}",
                err
            );

            tokio::select! {
                biased;
                _ = scope.cancelled() => return Err(ClientError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            index += 1;
        }
    }

    /// Execute and decode a JSON body. Decode failures are data errors and
    /// are never retried.
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        request: &ServiceRequest,
        scope: &CancellationToken,
    ) -> ClientResult<T> {
        let reply = self.execute(request, scope).await?;
        serde_json::from_slice(&reply.body).map_err(|e| {
            ClientError::Data(format!("{} returned an unexpected body: {}", request.path(), e))
        })
    }

    async fn run_attempt(
        &self,
        request: &ServiceRequest,
        attempt: &RequestAttempt,
        scope: &CancellationToken,
    ) -> ClientResult<ServiceReply> {
        let outcome = tokio::select! {
            biased;
            _ = scope.cancelled() => Err(ClientError::Cancelled),
            reply = self.transport.send(request, attempt.cancel.clone()) => reply,
            _ = tokio::time::sleep(attempt.budget) => {
                attempt.cancel.cancel();
                Err(ClientError::timeout(format!(
                    "no reply within {}s (attempt {})",
                    attempt.budget.as_secs(),
                    attempt.index + 1
                )))
            }
        };

        let reply = outcome?;
        if reply.is_success() {
            Ok(reply)
        } else {
            Err(ClientError::Service {
                status: reply.status,
                detail: service_detail(&reply),
            })
        }
    }
}

/// Reject URLs without an explicit http(s) scheme before any attempt.
pub fn validate_url(url: &str) -> ClientResult<()> {
    let parsed = reqwest::Url::parse(url).map_err(|e| {
        ClientError::Configuration(format!(
            "service URL '{}' is not valid ({}); it must include http:// or https://",
            url, e
        ))
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ClientError::Configuration(format!(
            "service URL '{}' uses scheme '{}'; it must include http:// or https://",
            url, other
        ))),
    }
}

/// Prefer the service's JSON `detail` field, otherwise a body excerpt.
fn service_detail(reply: &ServiceReply) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&reply.body) {
        if let Some(detail) = value.get("detail").and_then(|d| d.as_str()) {
            return detail.to_string();
        }
    }

    let text = reply.text();
    if text.trim().is_empty() {
        return "no detail".to_string();
    }
    text.chars().take(DETAIL_LIMIT).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockReply, MockTransport};
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    fn executor(transport: &MockTransport) -> RequestExecutor {
        RequestExecutor::new(Arc::new(transport.clone()), RetryPolicy::default())
    }

    fn chat_request() -> ServiceRequest {
        ServiceRequest::post("http://localhost:8000/chat", &json!({ "message": "build" })).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success() {
        let transport = MockTransport::new().on("/chat", MockReply::ok(json!({ "response": "hi" })));

        let reply = assert_ok!(
            executor(&transport)
                .execute(&chat_request(), &CancellationToken::new())
                .await
        );

        assert_eq!(reply.status, 200);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_url_without_scheme_makes_no_attempt() {
        let transport = MockTransport::new();
        let exec = executor(&transport);

        for url in ["localhost:8000/chat", "forge.example.com/chat", "", "ftp://host/chat"] {
            let err = assert_err!(
                exec.execute(&ServiceRequest::get(url), &CancellationToken::new())
                    .await
            );
            assert!(matches!(err, ClientError::Configuration(_)), "{url}: {err}");
        }

        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_errors_exhaust_retry_budget() {
        let transport = MockTransport::new().on(
            "/chat",
            MockReply::json(503, json!({ "detail": "Backend error while processing request." })),
        );

        let err = assert_err!(
            executor(&transport)
                .execute(&chat_request(), &CancellationToken::new())
                .await
        );

        match err {
            ClientError::Service { status, detail } => {
                assert_eq!(status, 503);
                assert_eq!(detail, "Backend error while processing request.");
            }
            other => panic!("expected service error, got {other:?}"),
        }

        let calls = transport.get_calls();
        assert_eq!(calls.len(), 3);

        let gaps: Vec<_> = calls.windows(2).map(|w| w[1].at - w[0].at).collect();
        assert!(gaps[0] >= Duration::from_millis(1000) && gaps[0] < Duration::from_millis(1100));
        assert!(gaps[1] >= Duration::from_millis(2000) && gaps[1] < Duration::from_millis(2100));
        assert!(gaps.windows(2).all(|g| g[0] <= g[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_never_exceed_max_retries_plus_one() {
        for max_retries in 0..4 {
            let transport = MockTransport::new().on("/chat", MockReply::refused());
            let exec = executor(&transport).with_policy(
                RetryPolicy::default()
                    .max_retries(max_retries)
                    .backoff_base(Duration::from_millis(10)),
            );

            assert_err!(exec.execute(&chat_request(), &CancellationToken::new()).await);
            assert_eq!(transport.call_count() as u32, max_retries + 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_then_success_use_independent_scopes() {
        let transport = MockTransport::new()
            .on("/chat", MockReply::Hang)
            .on("/chat", MockReply::Hang)
            .on("/chat", MockReply::ok(json!({ "response": "generated" })));

        let started = Instant::now();
        let reply = assert_ok!(
            executor(&transport)
                .execute(&chat_request(), &CancellationToken::new())
                .await
        );
        assert_eq!(reply.status, 200);

        let calls = transport.get_calls();
        assert_eq!(calls.len(), 3);
        assert!(calls[0].cancel.is_cancelled());
        assert!(calls[1].cancel.is_cancelled());
        assert!(!calls[2].cancel.is_cancelled());

        // 90s + 1s backoff + 90s + 2s backoff
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(183) && elapsed < Duration::from_secs(184));
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_body_is_not_retried() {
        let transport = MockTransport::new().on("/chat", MockReply::bytes(200, "<html>oops</html>"));

        let err = assert_err!(
            executor(&transport)
                .execute_json::<serde_json::Value>(&chat_request(), &CancellationToken::new())
                .await
        );

        assert!(matches!(err, ClientError::Data(_)));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_then_recovery() {
        let transport = MockTransport::new()
            .on("/chat", MockReply::refused())
            .on("/chat", MockReply::ok(json!({ "response": "ok" })));

        assert_ok!(
            executor(&transport)
                .execute(&chat_request(), &CancellationToken::new())
                .await
        );
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_scope_stops_before_sending() {
        let transport = MockTransport::new();
        let scope = CancellationToken::new();
        scope.cancel();

        let err = assert_err!(executor(&transport).execute(&chat_request(), &scope).await);

        assert!(matches!(err, ClientError::Cancelled));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_stops_retrying() {
        let transport = MockTransport::new().on("/chat", MockReply::status(502));
        let exec = executor(&transport);
        let scope = CancellationToken::new();

        let canceller = {
            let scope = scope.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                scope.cancel();
            })
        };

        let err = assert_err!(exec.execute(&chat_request(), &scope).await);
        canceller.await.unwrap();

        assert!(matches!(err, ClientError::Cancelled));
        assert_eq!(transport.call_count(), 1);
    }

    #[test]
    fn test_service_detail_fallbacks() {
        let reply = ServiceReply::new(500, "plain failure");
        assert_eq!(service_detail(&reply), "plain failure");

        let empty = ServiceReply::new(502, "");
        assert_eq!(service_detail(&empty), "no detail");

        let long = ServiceReply::new(500, "x".repeat(1000));
        assert_eq!(service_detail(&long).len(), DETAIL_LIMIT);
    }
}
