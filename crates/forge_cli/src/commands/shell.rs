//! Shell command - Interactive session.
//!
//! Plain lines are chat turns. Slash commands drive the other workflows:
//!
//! ```text
//! /refine <instruction>   refine the current files
//! /export [dir]           export the current files
//! /files                  list files
//! /show <path>            print one file
//! /spec                   print the specification
//! /plan                   print the plan
//! /status                 print service liveness
//! /help                   print this list
//! /quit                   leave
//! ```

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use forge_session::{
    ConnectivityMonitor, ConversationSequencer, MessageRole, RefinementWorkflow, SubmitOutcome,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use super::chat::{print_build_status, print_files, print_plan, print_spec};
use super::export::export_to;
use super::{GlobalArgs, Workspace};

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Chat(String),
    Refine(String),
    Export(Option<PathBuf>),
    Files,
    Show(String),
    Spec,
    Plan,
    Status,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_line(line: &str) -> ShellCommand {
    let line = line.trim();
    if line.is_empty() {
        return ShellCommand::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return ShellCommand::Chat(line.to_string());
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    match (name, arg) {
        ("refine", "") | ("show", "") => ShellCommand::Unknown(format!("/{} needs an argument", name)),
        ("refine", text) => ShellCommand::Refine(text.to_string()),
        ("export", "") => ShellCommand::Export(None),
        ("export", dir) => ShellCommand::Export(Some(PathBuf::from(dir))),
        ("files", _) => ShellCommand::Files,
        ("show", path) => ShellCommand::Show(path.to_string()),
        ("spec", _) => ShellCommand::Spec,
        ("plan", _) => ShellCommand::Plan,
        ("status", _) => ShellCommand::Status,
        ("help", _) => ShellCommand::Help,
        ("quit", _) | ("exit", _) => ShellCommand::Quit,
        _ => ShellCommand::Unknown(format!("unknown command /{}", name)),
    }
}

pub async fn execute(global: &GlobalArgs) -> Result<()> {
    let workspace = Workspace::open(global)?;
    workspace.require_configured()?;

    let monitor = ConnectivityMonitor::new(workspace.session.clone(), workspace.client.clone())
        .with_interval(workspace.settings.probe_interval())
        .spawn();
    let sequencer = ConversationSequencer::new(workspace.session.clone(), workspace.client.clone());
    let refiner = RefinementWorkflow::new(workspace.session.clone(), workspace.client.clone());

    println!("🔧 Aegis Forge shell ({})", workspace.target());
    println!("   Type a message to chat, /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("forge> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_line(&line) {
            ShellCommand::Empty => {}
            ShellCommand::Quit => break,
            ShellCommand::Chat(text) => {
                let before = workspace.session.message_count();
                let outcome = sequencer.send(text).await;
                for message in workspace.session.messages().into_iter().skip(before) {
                    if message.role == MessageRole::Assistant {
                        println!("{}", message.content);
                    }
                }
                if outcome == SubmitOutcome::Replied {
                    print_build_status(&workspace.session);
                    print_files(&workspace.session);
                }
            }
            ShellCommand::Refine(instruction) => match refiner.refine(instruction).await {
                Ok(summary) => println!("✅ Refinement applied to {} files", summary.total()),
                Err(e) => println!("❌ {}", e),
            },
            ShellCommand::Export(dir) => {
                let out = match dir {
                    Some(dir) => dir,
                    None => std::env::current_dir()?,
                };
                match export_to(&workspace, out, None).await {
                    Ok(receipt) => println!("📦 Saved {}", receipt.path.display()),
                    Err(e) => println!("❌ {:#}", e),
                }
            }
            ShellCommand::Files => print_files(&workspace.session),
            ShellCommand::Show(path) => match workspace.session.artifacts().get(&path) {
                Some(content) => {
                    workspace.session.select_file(path);
                    println!("{}", content);
                }
                None => println!("No such file: {}", path),
            },
            ShellCommand::Spec => match workspace.session.spec_document() {
                Some(_) => print_spec(&workspace.session),
                None => println!("No specification yet."),
            },
            ShellCommand::Plan => print_plan(&workspace.session),
            ShellCommand::Status => println!("Service: {}", workspace.session.liveness()),
            ShellCommand::Help => print_help(),
            ShellCommand::Unknown(reason) => println!("{} (try /help)", reason),
        }
    }

    workspace.session.close();
    if let Err(e) = monitor.await {
        debug!("monitor task ended abnormally: {}", e);
    }
    Ok(())
}

fn print_help() {
    println!("  <message>             chat with the service");
    println!("  /refine <instruction> refine the current files");
    println!("  /export [dir]         export the current files");
    println!("  /files                list files");
    println!("  /show <path>          print one file");
    println!("  /spec                 print the specification");
    println!("  /plan                 print the plan");
    println!("  /status               print service liveness");
    println!("  /quit                 leave");
}
