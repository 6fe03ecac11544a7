//! Mock transport for testing.
//!
//! Provides a scripted implementation of the ServiceTransport trait so the
//! executor and the session workflows can be exercised without a running
//! generation service.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{ClientError, ClientResult};
use crate::transport::{HttpMethod, ServiceReply, ServiceRequest, ServiceTransport};

/// Predefined outcome for one attempt.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Reply with a status and body.
    Reply(ServiceReply),
    /// Never reply; resolves only once the attempt is cancelled.
    Hang,
    /// Fail the attempt with the given error.
    Fail(ClientError),
}

impl MockReply {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self::Reply(ServiceReply::new(status, body.to_string()))
    }

    pub fn ok(body: serde_json::Value) -> Self {
        Self::json(200, body)
    }

    pub fn bytes(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self::Reply(ServiceReply::new(status, body))
    }

    pub fn status(status: u16) -> Self {
        Self::Reply(ServiceReply::new(status, Vec::new()))
    }

    pub fn refused() -> Self {
        Self::Fail(ClientError::transport("connection refused"))
    }
}

/// Captured call information for verification.
#[derive(Debug, Clone)]
pub struct CapturedCall {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<serde_json::Value>,
    /// When the attempt started (tokio clock, so paused-time tests can
    /// measure backoff gaps).
    pub at: Instant,
    /// The cancellation scope the attempt ran under.
    pub cancel: CancellationToken,
}

/// Mock transport for testing.
///
/// Replies are queued per path. The last queued reply for a path is sticky:
/// once the queue is down to one entry it is returned for every further
/// call. Paths with nothing queued answer `200 {}`.
#[derive(Clone, Default)]
pub struct MockTransport {
    replies: Arc<RwLock<HashMap<String, VecDeque<MockReply>>>>,
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the next call to `path`.
    pub fn on(self, path: impl Into<String>, reply: MockReply) -> Self {
        self.push(path, reply);
        self
    }

    /// Queue a reply on an already shared transport.
    pub fn push(&self, path: impl Into<String>, reply: MockReply) {
        self.replies
            .write()
            .entry(path.into())
            .or_default()
            .push_back(reply);
    }

    /// Get all captured calls.
    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    /// Get calls made to a specific path.
    pub fn get_path_calls(&self, path: &str) -> Vec<CapturedCall> {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.path == path)
            .cloned()
            .collect()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    pub fn was_called(&self, path: &str) -> bool {
        self.captured_calls.read().iter().any(|c| c.path == path)
    }

    /// Clear all captured calls.
    pub fn clear_calls(&self) {
        self.captured_calls.write().clear();
    }

    fn next_reply(&self, path: &str) -> MockReply {
        let mut replies = self.replies.write();
        match replies.get_mut(path) {
            Some(queue) if queue.len() > 1 => queue
                .pop_front()
                .unwrap_or_else(|| MockReply::ok(serde_json::json!({}))),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| MockReply::ok(serde_json::json!({}))),
            None => MockReply::ok(serde_json::json!({})),
        }
    }
}

#[async_trait]
impl ServiceTransport for MockTransport {
    async fn send(
        &self,
        request: &ServiceRequest,
        cancel: CancellationToken,
    ) -> ClientResult<ServiceReply> {
        let path = request.path().to_string();
        self.captured_calls.write().push(CapturedCall {
            method: request.method,
            path: path.clone(),
            body: request.body.clone(),
            at: Instant::now(),
            cancel: cancel.clone(),
        });

        match self.next_reply(&path) {
            MockReply::Reply(reply) => Ok(reply),
            MockReply::Fail(err) => Err(err),
            MockReply::Hang => {
                cancel.cancelled().await;
                Err(ClientError::Cancelled)
            }
        }
    }
}
