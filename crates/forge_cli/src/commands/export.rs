//! Export command - Package the files in a directory into an archive.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use forge_session::{DirectorySink, ExportReceipt, ExportTrigger};

use super::{load_dir, require_dir, GlobalArgs, Workspace};

#[derive(Args)]
pub struct ExportArgs {
    /// Directory holding the files to export
    #[arg(short, long)]
    dir: PathBuf,

    /// Where to save the archive (defaults to the current directory)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Archive file name (defaults to the configured export name)
    #[arg(long)]
    name: Option<String>,
}

pub async fn execute(global: &GlobalArgs, args: ExportArgs) -> Result<()> {
    let workspace = Workspace::open(global)?;
    let receipt = run(&workspace, args).await?;
    println!(
        "📦 Exported {} files ({} bytes) to {}",
        receipt.files,
        receipt.bytes,
        receipt.path.display()
    );
    Ok(())
}

pub(crate) async fn run(workspace: &Workspace, args: ExportArgs) -> Result<ExportReceipt> {
    require_dir(&args.dir)?;
    workspace.require_configured()?;

    workspace.session.artifacts().merge(load_dir(&args.dir)?);

    let out = match args.out {
        Some(out) => out,
        None => std::env::current_dir()?,
    };
    export_to(workspace, out, args.name).await
}

/// Export whatever the session currently holds into `out`.
pub(crate) async fn export_to(
    workspace: &Workspace,
    out: PathBuf,
    name: Option<String>,
) -> Result<ExportReceipt> {
    let file_name = name.unwrap_or_else(|| workspace.settings.export_file_name.clone());
    let trigger = ExportTrigger::new(
        workspace.session.clone(),
        workspace.client.clone(),
        Arc::new(DirectorySink::new(out)),
    )
    .with_file_name(file_name);

    trigger.export().await.context("Export failed")
}
