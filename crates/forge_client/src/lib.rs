//! # forge_client
//!
//! Resilient HTTP client for the Aegis Forge code-generation service.
//!
//! This crate owns everything on the network side of the session: the wire
//! types, the transport seam, and the executor that gives every call a
//! bounded timeout, an independent cancellation scope per attempt, and
//! linear backoff between retryable failures.
//!
//! # Features
//!
//! - **Classified errors**: configuration, network, service, data, cancelled
//! - **Retry policy**: `backoff_base * (attempt + 1)`, 3 attempts by default
//! - **Transport trait**: reqwest in production, `MockTransport` in tests
//! - **Layered settings**: defaults, `.forge/settings.toml`, `FORGE_API_URL`
//!
//! # Example
//!
//! ```rust,no_run
//! use forge_client::{ChatRequest, ForgeClient, ForgeSettings};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = ForgeSettings::default().with_api_url("http://localhost:8000");
//!     let client = ForgeClient::from_settings(&settings);
//!
//!     let reply = client
//!         .chat(
//!             &ChatRequest { message: "Build a todo API".into(), thread_id: None },
//!             &CancellationToken::new(),
//!         )
//!         .await?;
//!     println!("{}", reply.response);
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod executor;
pub mod mock;
pub mod transport;

pub use api::{
    BuildStatus, ChatReply, ChatRequest, CodeArtifact, ExportRequest, FileMap, ForgeClient,
    PlanTask, RefineReply, RefineRequest, TaskStatus,
};
pub use config::{ForgeSettings, RetryPolicy, API_URL_ENV, DEFAULT_EXPORT_FILE_NAME};
pub use error::{ClientError, ClientResult, NetworkFailure};
pub use executor::{validate_url, RequestAttempt, RequestExecutor};
pub use mock::{CapturedCall, MockReply, MockTransport};
pub use transport::{HttpMethod, HttpTransport, ServiceReply, ServiceRequest, ServiceTransport};
