//! Conversation sequencer.
//!
//! Drives the primary generation turn: `idle -> sending -> idle`. There is
//! no error state; every failure becomes an assistant message in the log.

use std::sync::Arc;

use forge_client::{ChatReply, ChatRequest, ClientError, ForgeClient, NetworkFailure};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::session::SessionContext;
use crate::types::{InFlight, LivenessState, Message, WorkflowState};

pub const OFFLINE_MESSAGE: &str = "Cannot send the message: the backend server is not responding. \
     Make sure the system is running before continuing.";
pub const TIMEOUT_MESSAGE: &str = "The request took too long. The server is processing a lot of \
     information, please try again in a moment.";
pub const CONNECTIVITY_MESSAGE: &str = "Could not reach the server. Check that the backend is \
     running and accessible.";
pub const GENERIC_MESSAGE: &str = "Sorry, an unexpected error occurred while processing your request.";

/// What a call to [`ConversationSequencer::submit`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Input was blank or a turn was already in flight; nothing changed.
    Ignored,
    /// A precondition failed; the explanation was appended to the log.
    Blocked,
    /// The service replied and its slots were applied.
    Replied,
    /// The call failed; a failure message was appended to the log.
    Failed,
}

pub struct ConversationSequencer {
    session: Arc<SessionContext>,
    client: ForgeClient,
    input: Mutex<String>,
    in_flight: InFlight,
}

impl ConversationSequencer {
    pub fn new(session: Arc<SessionContext>, client: ForgeClient) -> Self {
        Self {
            session,
            client,
            input: Mutex::new(String::new()),
            in_flight: InFlight::default(),
        }
    }

    pub fn state(&self) -> WorkflowState {
        if self.in_flight.is_active() {
            WorkflowState::Sending
        } else {
            WorkflowState::Idle
        }
    }

    pub fn set_input(&self, text: impl Into<String>) {
        *self.input.lock() = text.into();
    }

    pub fn input(&self) -> String {
        self.input.lock().clone()
    }

    /// Set the input and submit it.
    pub async fn send(&self, text: impl Into<String>) -> SubmitOutcome {
        self.set_input(text);
        self.submit().await
    }

    /// Submit the current input as one chat turn.
    pub async fn submit(&self) -> SubmitOutcome {
        if self.input.lock().trim().is_empty() {
            return SubmitOutcome::Ignored;
        }
        let Some(_guard) = self.in_flight.try_claim() else {
            return SubmitOutcome::Ignored;
        };

        if let Err(err) = self.client.endpoint("/chat") {
            self.session.push_message(Message::assistant(err.to_string()));
            return SubmitOutcome::Blocked;
        }

        let text = std::mem::take(&mut *self.input.lock());
        self.session.push_message(Message::user(text.clone()));

        let liveness = self.session.liveness();
        if liveness != LivenessState::Online {
            warn!(liveness = %liveness, "chat blocked: service not online");
            self.session.push_message(Message::assistant(OFFLINE_MESSAGE));
            return SubmitOutcome::Blocked;
        }

        let request = ChatRequest {
            message: text,
            thread_id: Some(self.session.thread_id().to_string()),
        };

        match self.client.chat(&request, self.session.shutdown_token()).await {
            Ok(reply) => {
                self.apply_reply(reply);
                SubmitOutcome::Replied
            }
            Err(err) => {
                self.session.push_message(Message::assistant(failure_message(&err)));
                SubmitOutcome::Failed
            }
        }
    }

    fn apply_reply(&self, reply: ChatReply) {
        self.session.push_message(Message::assistant(reply.response));

        if let Some(spec) = reply.spec_document.filter(|s| !s.is_empty()) {
            self.session.set_spec_document(spec);
        }
        if let Some(plan) = reply.plan {
            self.session.set_plan(plan);
        }
        if let Some(artifacts) = reply.code_generated.filter(|a| !a.is_empty()) {
            let first = artifacts[0].filepath.clone();
            let summary = self.session.artifacts().merge_artifacts(artifacts);
            self.session.select_file(first);
            info!(
                updated = summary.updated.len(),
                added = summary.added.len(),
                "applied generated files"
            );
        }
        if let Some(status) = reply.build_status {
            self.session.set_build_status(status);
        }
    }
}

/// Human-readable text for a terminal chat failure.
pub fn failure_message(err: &ClientError) -> String {
    match err {
        ClientError::Configuration(_) => err.to_string(),
        ClientError::Network {
            kind: NetworkFailure::Timeout,
            ..
        } => TIMEOUT_MESSAGE.to_string(),
        ClientError::Network { .. } | ClientError::Service { .. } => CONNECTIVITY_MESSAGE.to_string(),
        ClientError::Data(_) | ClientError::Cancelled => GENERIC_MESSAGE.to_string(),
    }
}
