//! Refine command - Apply an instruction to the files in a directory.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use forge_session::RefinementWorkflow;
use tracing::info;

use super::{load_dir, require_dir, write_files, CliError, GlobalArgs, Workspace};

#[derive(Args)]
pub struct RefineArgs {
    /// Natural-language instruction, e.g. "add input validation to payment.ts"
    instruction: String,

    /// Directory holding the files to refine; modified files are written back
    #[arg(short, long)]
    dir: PathBuf,
}

pub async fn execute(global: &GlobalArgs, args: RefineArgs) -> Result<()> {
    let workspace = Workspace::open(global)?;
    run(&workspace, args).await
}

pub(crate) async fn run(workspace: &Workspace, args: RefineArgs) -> Result<()> {
    require_dir(&args.dir)?;
    workspace.require_configured()?;

    let files = load_dir(&args.dir)?;
    if files.is_empty() {
        return Err(CliError::InvalidArgument(format!("no files found in {}", args.dir.display())).into());
    }
    info!("Loaded {} files from {}", files.len(), args.dir.display());
    workspace.session.artifacts().merge(files);

    let workflow = RefinementWorkflow::new(workspace.session.clone(), workspace.client.clone());
    let summary = workflow
        .refine(args.instruction)
        .await
        .context("Refinement failed")?;

    let changed: Vec<String> = summary.updated.iter().chain(summary.added.iter()).cloned().collect();
    write_files(&args.dir, workspace.session.artifacts(), &changed)?;

    for path in &summary.updated {
        println!("  ✏️  {}", path);
    }
    for path in &summary.added {
        println!("  ➕ {}", path);
    }
    println!("✅ Refinement applied to {} files", summary.total());
    Ok(())
}
