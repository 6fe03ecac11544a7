//! Refinement workflow.
//!
//! Sends the current files plus a natural-language instruction to
//! `POST /refine` and merges the returned files back into the store. A failed
//! refinement is reported, never re-sent: the instruction is user-authored
//! and replaying it could apply the same edit twice.

use std::sync::Arc;

use forge_client::{ForgeClient, RefineRequest};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{SessionError, SessionResult};
use crate::session::SessionContext;
use crate::store::MergeSummary;
use crate::types::{InFlight, WorkflowState};

pub struct RefinementWorkflow {
    session: Arc<SessionContext>,
    client: ForgeClient,
    instruction: Mutex<String>,
    in_flight: InFlight,
}

impl RefinementWorkflow {
    pub fn new(session: Arc<SessionContext>, client: ForgeClient) -> Self {
        Self {
            session,
            client,
            instruction: Mutex::new(String::new()),
            in_flight: InFlight::default(),
        }
    }

    pub fn state(&self) -> WorkflowState {
        if self.in_flight.is_active() {
            WorkflowState::Refining
        } else {
            WorkflowState::Idle
        }
    }

    pub fn set_instruction(&self, text: impl Into<String>) {
        *self.instruction.lock() = text.into();
    }

    pub fn instruction(&self) -> String {
        self.instruction.lock().clone()
    }

    /// Set the instruction and run it.
    pub async fn refine(&self, instruction: impl Into<String>) -> SessionResult<MergeSummary> {
        self.set_instruction(instruction);
        self.run().await
    }

    /// Run the current instruction. On success the instruction is cleared and
    /// the merge summary says which files changed; on any failure the store
    /// and the instruction are left as they were.
    pub async fn run(&self) -> SessionResult<MergeSummary> {
        let instruction = self.instruction();
        if instruction.trim().is_empty() {
            return Err(SessionError::EmptyInput("instruction"));
        }
        let Some(_guard) = self.in_flight.try_claim() else {
            return Err(SessionError::Busy("refinement"));
        };

        let request = RefineRequest {
            instruction,
            current_files: self.session.artifacts().snapshot().to_file_map(),
        };
        info!(files = request.current_files.len(), "requesting refinement");

        let reply = self
            .client
            .refine(&request, self.session.shutdown_token())
            .await
            .map_err(|err| {
                debug!(kind = err.kind(), "refinement request failed");
                err
            })?;

        if !reply.success {
            warn!("service reported refinement failure");
            return Err(SessionError::RefinementRejected(
                "the service could not apply the instruction".to_string(),
            ));
        }

        let modified = reply.modified_files.unwrap_or_default();
        if modified.is_empty() {
            return Err(SessionError::RefinementRejected(
                "the service returned no modified files".to_string(),
            ));
        }

        let summary = self.session.artifacts().merge(modified);
        self.instruction.lock().clear();
        info!(
            updated = summary.updated.len(),
            added = summary.added.len(),
            "refinement applied"
        );
        Ok(summary)
    }
}
