//! CLI command definitions.
//!
//! This module defines the command structure for the forge CLI and the
//! helpers the commands share: settings resolution, session wiring and the
//! directory <-> store bridge.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use forge_client::{ForgeClient, ForgeSettings};
use forge_session::{ArtifactStore, SessionContext};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

pub mod chat;
pub mod export;
pub mod refine;
pub mod shell;
pub mod status;

/// Aegis Forge - client for the Aegis Forge code-generation service
#[derive(Parser)]
#[command(name = "forge")]
#[command(version, about = "Aegis Forge - client for the code-generation service")]
#[command(long_about = r#"
Aegis Forge talks to a remote code-generation service: describe what you want,
review the generated spec, plan and files, refine them with follow-up
instructions and export the result as an archive.

COMMANDS:
  status   → Probe the service once
  chat     → Send one message and print (or write) the result
  refine   → Apply an instruction to the files in a directory
  export   → Package the files in a directory into an archive
  shell    → Interactive session with background liveness checks

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Configuration error
  4 - Service unreachable
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Base URL of the generation service
    #[arg(long, global = true, env = "FORGE_API_URL")]
    pub api_url: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn global(&self) -> GlobalArgs {
        GlobalArgs {
            api_url: self.api_url.clone(),
            quiet: self.quiet,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe the service once and print online/offline
    Status,

    /// Send one chat message
    Chat(chat::ChatArgs),

    /// Refine the files in a directory with an instruction
    Refine(refine::RefineArgs),

    /// Export the files in a directory as an archive
    Export(export::ExportArgs),

    /// Start an interactive session
    Shell,
}

/// Flags every command sees.
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub api_url: Option<String>,
    pub quiet: bool,
}

/// Failures raised by the CLI itself rather than the client libraries.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Service unreachable at {0}")]
    Unreachable(String),

    #[error("{0}")]
    TurnFailed(String),
}

/// Everything a command needs to talk to the service.
pub struct Workspace {
    pub settings: ForgeSettings,
    pub client: ForgeClient,
    pub session: Arc<SessionContext>,
}

impl Workspace {
    /// Resolve settings (defaults, `.forge/settings.toml`, environment, flag)
    /// and open a fresh session.
    pub fn open(global: &GlobalArgs) -> Result<Self> {
        let root = std::env::current_dir()?;
        let mut settings = ForgeSettings::load(&root)?;
        if let Some(url) = global.api_url.as_deref().filter(|u| !u.trim().is_empty()) {
            settings = settings.with_api_url(url);
        }
        Ok(Self::with_settings(settings))
    }

    pub fn with_settings(settings: ForgeSettings) -> Self {
        let client = ForgeClient::from_settings(&settings);
        Self::new(settings, client)
    }

    pub fn new(settings: ForgeSettings, client: ForgeClient) -> Self {
        Self {
            settings,
            client,
            session: SessionContext::new(),
        }
    }

    /// Fail fast with a configuration error when no base URL is set.
    pub fn require_configured(&self) -> Result<()> {
        self.client.endpoint("/")?;
        Ok(())
    }

    pub fn target(&self) -> String {
        self.client.base_url().unwrap_or("<unset>").to_string()
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.session.close();
    }
}

/// Require `dir` to be an existing directory.
pub fn require_dir(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Err(CliError::InvalidArgument(format!("{} is not a directory", dir.display())).into());
    }
    Ok(())
}

/// Read every UTF-8 file under `dir` into `(relative path, content)` pairs.
///
/// Hidden entries (`.git`, `.forge`, ...) are skipped, as are files that are
/// not valid UTF-8. Paths use `/` separators.
pub fn load_dir(dir: &Path) -> Result<Vec<(String, String)>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(dir)?;
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        match std::fs::read_to_string(entry.path()) {
            Ok(content) => files.push((key, content)),
            Err(e) => debug!("skipping {}: {}", entry.path().display(), e),
        }
    }
    Ok(files)
}

/// Resolve a service-supplied filepath inside `dir`. Absolute paths and
/// parent components are refused.
pub fn resolve_within(dir: &Path, filepath: &str) -> Result<PathBuf> {
    let relative = Path::new(filepath);
    let safe = relative.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !safe || filepath.is_empty() {
        anyhow::bail!("refusing to write outside the output directory: {}", filepath);
    }
    Ok(dir.join(relative))
}

/// Write the named files from the store into `dir`, creating parents.
pub fn write_files(dir: &Path, store: &ArtifactStore, paths: &[String]) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(paths.len());
    for filepath in paths {
        let Some(content) = store.get(filepath) else {
            continue;
        };
        let target = resolve_within(dir, filepath)?;
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        std::fs::write(&target, content).with_context(|| format!("cannot write {}", target.display()))?;
        written.push(target);
    }
    Ok(written)
}
