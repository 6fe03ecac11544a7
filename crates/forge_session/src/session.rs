//! Session context.
//!
//! One `SessionContext` exists per interactive session and is shared by the
//! monitor and the workflows through an `Arc`. Nothing here is persisted;
//! [`SessionContext::close`] tears down the monitor loop and every in-flight
//! request attempt.

use std::sync::Arc;

use forge_client::{BuildStatus, PlanTask};
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::store::ArtifactStore;
use crate::types::{LivenessState, Message};

/// Slots written from chat replies.
#[derive(Debug, Default)]
struct Slots {
    spec_document: Option<String>,
    plan: Vec<PlanTask>,
    build_status: Option<BuildStatus>,
    selected_file: Option<String>,
}

/// Process-wide state for one session.
pub struct SessionContext {
    thread_id: String,
    messages: RwLock<Vec<Message>>,
    slots: RwLock<Slots>,
    artifacts: ArtifactStore,
    liveness: watch::Sender<LivenessState>,
    shutdown: CancellationToken,
}

impl SessionContext {
    pub fn new() -> Arc<Self> {
        let (liveness, _) = watch::channel(LivenessState::Checking);
        let thread_id = uuid::Uuid::new_v4().to_string();
        info!(thread_id = %thread_id, "session started");

        Arc::new(Self {
            thread_id,
            messages: RwLock::new(Vec::new()),
            slots: RwLock::new(Slots::default()),
            artifacts: ArtifactStore::new(),
            liveness,
            shutdown: CancellationToken::new(),
        })
    }

    /// Identifier sent with every chat turn.
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Root scope; every request attempt is a child of it.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// End the session: stops the monitor and cancels in-flight attempts.
    pub fn close(&self) {
        if !self.shutdown.is_cancelled() {
            info!(thread_id = %self.thread_id, "session closed");
            self.shutdown.cancel();
        }
    }

    // Messages

    pub fn push_message(&self, message: Message) {
        self.messages.write().push(message);
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.read().clone()
    }

    pub fn message_count(&self) -> usize {
        self.messages.read().len()
    }

    pub fn last_message(&self) -> Option<Message> {
        self.messages.read().last().cloned()
    }

    // Liveness

    pub fn liveness(&self) -> LivenessState {
        *self.liveness.borrow()
    }

    /// Subscribe to liveness transitions.
    pub fn watch_liveness(&self) -> watch::Receiver<LivenessState> {
        self.liveness.subscribe()
    }

    /// Returns the previous state. Only the connectivity monitor should call
    /// this outside of tests.
    pub fn set_liveness(&self, state: LivenessState) -> LivenessState {
        self.liveness.send_replace(state)
    }

    // Reply slots

    pub fn spec_document(&self) -> Option<String> {
        self.slots.read().spec_document.clone()
    }

    pub fn set_spec_document(&self, spec: String) {
        self.slots.write().spec_document = Some(spec);
    }

    pub fn plan(&self) -> Vec<PlanTask> {
        self.slots.read().plan.clone()
    }

    /// Replaces the whole plan.
    pub fn set_plan(&self, plan: Vec<PlanTask>) {
        self.slots.write().plan = plan;
    }

    pub fn build_status(&self) -> Option<BuildStatus> {
        self.slots.read().build_status
    }

    pub fn set_build_status(&self, status: BuildStatus) {
        self.slots.write().build_status = Some(status);
    }

    pub fn selected_file(&self) -> Option<String> {
        self.slots.read().selected_file.clone()
    }

    pub fn select_file(&self, filepath: impl Into<String>) {
        self.slots.write().selected_file = Some(filepath.into());
    }
}
