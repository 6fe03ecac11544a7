//! # forge_session - Session orchestration for the forge client
//!
//! This crate owns everything a single working session needs on top of the
//! raw client:
//! - **Liveness**: a background monitor probing the service on an interval
//! - **Conversation**: one in-flight chat turn at a time, with offline gating
//!   and user-facing failure messages
//! - **Artifacts**: an ordered, filepath-keyed store with additive merge
//! - **Refinement**: instruction-driven edits merged back into the store
//! - **Export**: the current files packaged by the service and saved locally
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   probe    ┌──────────────────┐
//! │ ConnectivityMon. │──────────▶│                  │
//! └────────┬─────────┘            │                  │
//!          │ liveness             │   ForgeClient    │
//!          ▼                      │  (executor with  │
//! ┌──────────────────┐   chat     │  retry/timeout)  │
//! │  SessionContext  │◀─────────▶│                  │
//! │  messages/slots  │  refine    │                  │
//! │  ArtifactStore   │  export    │                  │
//! └──────────────────┘            └──────────────────┘
//! ```
//!
//! Closing the session cancels its shutdown token, which stops the monitor and
//! aborts any request still in flight.

pub mod conversation;
pub mod error;
pub mod export;
pub mod monitor;
pub mod refine;
pub mod session;
pub mod store;
pub mod types;

pub use conversation::{
    failure_message, ConversationSequencer, SubmitOutcome, CONNECTIVITY_MESSAGE, GENERIC_MESSAGE,
    OFFLINE_MESSAGE, TIMEOUT_MESSAGE,
};
pub use error::{SessionError, SessionResult};
pub use export::{BundleSink, DirectorySink, ExportReceipt, ExportTrigger};
pub use monitor::{ConnectivityMonitor, DEFAULT_PROBE_INTERVAL};
pub use refine::RefinementWorkflow;
pub use session::SessionContext;
pub use store::{ArtifactSnapshot, ArtifactStore, MergeSummary};
pub use types::{LivenessState, Message, MessageRole, WorkflowState};
