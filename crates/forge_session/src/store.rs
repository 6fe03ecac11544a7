//! Artifact store.
//!
//! Holds the generated files in first-seen order, keyed by filepath. The
//! only write is [`ArtifactStore::merge`]: existing paths get their content
//! replaced in place, new paths are appended, and paths absent from the
//! update are left alone. Nothing is ever removed.

use forge_client::{CodeArtifact, FileMap};
use parking_lot::RwLock;
use tracing::debug;

/// Which keys a merge touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Existing paths whose content was replaced
    pub updated: Vec<String>,
    /// New paths appended at the end
    pub added: Vec<String>,
}

impl MergeSummary {
    pub fn total(&self) -> usize {
        self.updated.len() + self.added.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Immutable point-in-time copy of the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactSnapshot {
    artifacts: Vec<CodeArtifact>,
}

impl ArtifactSnapshot {
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn get(&self, filepath: &str) -> Option<&str> {
        self.artifacts
            .iter()
            .find(|a| a.filepath == filepath)
            .map(|a| a.content.as_str())
    }

    /// Artifacts in store order.
    pub fn iter(&self) -> impl Iterator<Item = &CodeArtifact> {
        self.artifacts.iter()
    }

    pub fn paths(&self) -> Vec<&str> {
        self.artifacts.iter().map(|a| a.filepath.as_str()).collect()
    }

    /// Keyed view used for request payloads.
    pub fn to_file_map(&self) -> FileMap {
        self.artifacts
            .iter()
            .map(|a| (a.filepath.clone(), a.content.clone()))
            .collect()
    }
}

/// The session's generated files.
#[derive(Debug, Default)]
pub struct ArtifactStore {
    artifacts: RwLock<Vec<CodeArtifact>>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `update` by key under a single write lock, so readers see
    /// either none or all of it.
    ///
    /// If `update` repeats a path, the later entry wins.
    pub fn merge<I>(&self, update: I) -> MergeSummary
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut summary = MergeSummary::default();
        let mut artifacts = self.artifacts.write();

        for (filepath, content) in update {
            match artifacts.iter_mut().find(|a| a.filepath == filepath) {
                Some(existing) => {
                    existing.content = content;
                    if !summary.updated.contains(&filepath) && !summary.added.contains(&filepath) {
                        summary.updated.push(filepath);
                    }
                }
                None => {
                    summary.added.push(filepath.clone());
                    artifacts.push(CodeArtifact { filepath, content });
                }
            }
        }

        debug!(
            updated = summary.updated.len(),
            added = summary.added.len(),
            total = artifacts.len(),
            "merged artifacts"
        );
        summary
    }

    /// Merge a list of artifacts as returned by the chat endpoint.
    pub fn merge_artifacts(&self, artifacts: Vec<CodeArtifact>) -> MergeSummary {
        self.merge(artifacts.into_iter().map(|a| (a.filepath, a.content)))
    }

    pub fn snapshot(&self) -> ArtifactSnapshot {
        ArtifactSnapshot {
            artifacts: self.artifacts.read().clone(),
        }
    }

    pub fn get(&self, filepath: &str) -> Option<String> {
        self.artifacts
            .read()
            .iter()
            .find(|a| a.filepath == filepath)
            .map(|a| a.content.clone())
    }

    pub fn paths(&self) -> Vec<String> {
        self.artifacts.read().iter().map(|a| a.filepath.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.artifacts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.read().is_empty()
    }
}
