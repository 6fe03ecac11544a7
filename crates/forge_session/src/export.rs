//! Export trigger.
//!
//! Ships the current snapshot to `POST /export` and hands the returned
//! archive to a [`BundleSink`]. Packaging happens entirely on the service.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use forge_client::{ExportRequest, ForgeClient, DEFAULT_EXPORT_FILE_NAME};
use tracing::{debug, info};

use crate::error::{SessionError, SessionResult};
use crate::session::SessionContext;

/// Where exported archives end up.
#[cfg_attr(test, mockall::automock)]
pub trait BundleSink: Send + Sync {
    /// Persist `bytes` under the suggested `file_name`; returns the location.
    fn save(&self, file_name: &str, bytes: &[u8]) -> std::io::Result<PathBuf>;
}

/// Writes bundles into a directory, creating it if needed.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

impl BundleSink for DirectorySink {
    fn save(&self, file_name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        std::fs::write(&path, bytes)?;
        Ok(path)
    }
}

/// Result of a successful export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReceipt {
    pub path: PathBuf,
    pub files: usize,
    pub bytes: usize,
}

pub struct ExportTrigger {
    session: Arc<SessionContext>,
    client: ForgeClient,
    sink: Arc<dyn BundleSink>,
    file_name: String,
}

impl ExportTrigger {
    pub fn new(session: Arc<SessionContext>, client: ForgeClient, sink: Arc<dyn BundleSink>) -> Self {
        Self {
            session,
            client,
            sink,
            file_name: DEFAULT_EXPORT_FILE_NAME.to_string(),
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }

    /// Export the current snapshot. No session state is touched either way.
    pub async fn export(&self) -> SessionResult<ExportReceipt> {
        let snapshot = self.session.artifacts().snapshot();
        if snapshot.is_empty() {
            return Err(SessionError::NothingToExport);
        }

        let request = ExportRequest {
            files: snapshot.to_file_map(),
        };
        let bytes = self
            .client
            .export(&request, self.session.shutdown_token())
            .await
            .map_err(|err| {
                debug!(kind = err.kind(), "export request failed");
                err
            })?;

        let path = self.sink.save(&self.file_name, &bytes)?;
        info!(path = %path.display(), files = snapshot.len(), "export saved");

        Ok(ExportReceipt {
            path,
            files: snapshot.len(),
            bytes: bytes.len(),
        })
    }
}
