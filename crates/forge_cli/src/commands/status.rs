//! Status command - Probe the service once.

use anyhow::Result;
use forge_session::{ConnectivityMonitor, LivenessState};

use super::{CliError, GlobalArgs, Workspace};

pub async fn execute(global: &GlobalArgs) -> Result<()> {
    let workspace = Workspace::open(global)?;
    let state = run(&workspace).await?;
    println!("{}", state);

    match state {
        LivenessState::Online => Ok(()),
        _ => Err(CliError::Unreachable(workspace.target()).into()),
    }
}

pub(crate) async fn run(workspace: &Workspace) -> Result<LivenessState> {
    workspace.require_configured()?;
    let monitor = ConnectivityMonitor::new(workspace.session.clone(), workspace.client.clone());
    Ok(monitor.probe_once().await)
}
