//! Chat command - Send one message to the service.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use forge_client::TaskStatus;
use forge_session::{ConnectivityMonitor, ConversationSequencer, MessageRole, SessionContext, SubmitOutcome};
use tracing::info;

use super::{write_files, CliError, GlobalArgs, Workspace};

#[derive(Args)]
pub struct ChatArgs {
    /// Message to send
    message: String,

    /// Write generated files into this directory
    #[arg(short, long)]
    out: Option<PathBuf>,
}

pub async fn execute(global: &GlobalArgs, args: ChatArgs) -> Result<()> {
    let workspace = Workspace::open(global)?;
    run(&workspace, args, global.quiet).await
}

pub(crate) async fn run(workspace: &Workspace, args: ChatArgs, quiet: bool) -> Result<()> {
    workspace.require_configured()?;
    if args.message.trim().is_empty() {
        return Err(CliError::InvalidArgument("message is empty".to_string()).into());
    }

    ConnectivityMonitor::new(workspace.session.clone(), workspace.client.clone())
        .probe_once()
        .await;

    let sequencer = ConversationSequencer::new(workspace.session.clone(), workspace.client.clone());
    let outcome = sequencer.send(args.message).await;
    let reply = workspace
        .session
        .last_message()
        .filter(|m| m.role == MessageRole::Assistant)
        .map(|m| m.content)
        .unwrap_or_default();

    match outcome {
        SubmitOutcome::Replied => {}
        SubmitOutcome::Blocked | SubmitOutcome::Failed => {
            return Err(CliError::TurnFailed(reply).into());
        }
        SubmitOutcome::Ignored => {
            return Err(CliError::InvalidArgument("message is empty".to_string()).into());
        }
    }

    println!("{}", reply);
    if !quiet {
        print_spec(&workspace.session);
        print_plan(&workspace.session);
        print_build_status(&workspace.session);
        print_files(&workspace.session);
    }

    if let Some(out) = args.out {
        let paths = workspace.session.artifacts().paths();
        let written = write_files(&out, workspace.session.artifacts(), &paths)?;
        info!("Wrote {} files to {}", written.len(), out.display());
        println!("📁 Wrote {} files to {}", written.len(), out.display());
    }

    Ok(())
}

pub(crate) fn print_spec(session: &SessionContext) {
    if let Some(spec) = session.spec_document() {
        println!();
        println!("📋 Specification");
        println!("{}", spec);
    }
}

pub(crate) fn print_plan(session: &SessionContext) {
    let plan = session.plan();
    if plan.is_empty() {
        return;
    }
    println!();
    println!("🗺️  Plan");
    for task in plan {
        let mark = match task.status {
            TaskStatus::Completed => "x",
            TaskStatus::Pending => " ",
        };
        match task.id {
            Some(id) => println!("   [{}] {} {}", mark, id, task.description),
            None => println!("   [{}] {}", mark, task.description),
        }
    }
}

pub(crate) fn print_build_status(session: &SessionContext) {
    if let Some(status) = session.build_status() {
        println!();
        println!("🔒 Build status: {}", status.as_str());
    }
}

pub(crate) fn print_files(session: &SessionContext) {
    let paths = session.artifacts().paths();
    if paths.is_empty() {
        return;
    }
    let selected = session.selected_file();
    println!();
    println!("📄 Files ({})", paths.len());
    for path in paths {
        let marker = if selected.as_deref() == Some(path.as_str()) { "*" } else { " " };
        println!("  {} {}", marker, path);
    }
}
