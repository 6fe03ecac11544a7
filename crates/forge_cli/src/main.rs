//! Aegis Forge CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Configuration error
//! - 4: Service unreachable

use std::process::ExitCode;

use clap::Parser;
use forge_client::ClientError;
use forge_session::SessionError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, CliError, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const CONFIGURATION_ERROR: u8 = 3;
    pub const SERVICE_UNREACHABLE: u8 = 4;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "forge=debug"
    } else if cli.quiet {
        "forge=warn"
    } else {
        "forge=info"
    };
    let mut filter = EnvFilter::from_default_env();
    for directive in [level, "warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let global = cli.global();
    let result = match cli.command {
        Commands::Status => commands::status::execute(&global).await,
        Commands::Chat(args) => commands::chat::execute(&global, args).await,
        Commands::Refine(args) => commands::refine::execute(&global, args).await,
        Commands::Export(args) => commands::export::execute(&global, args).await,
        Commands::Shell => commands::shell::execute(&global).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(err) = cause.downcast_ref::<CliError>() {
            return match err {
                CliError::InvalidArgument(_) => ExitCodes::INVALID_ARGS,
                CliError::Unreachable(_) | CliError::TurnFailed(_) => ExitCodes::SERVICE_UNREACHABLE,
            };
        }
        let client_err = cause.downcast_ref::<ClientError>().or_else(|| {
            match cause.downcast_ref::<SessionError>() {
                Some(SessionError::Client(err)) => Some(err),
                _ => None,
            }
        });
        if let Some(err) = client_err {
            return match err {
                ClientError::Configuration(_) => ExitCodes::CONFIGURATION_ERROR,
                ClientError::Network { .. } | ClientError::Service { .. } => {
                    ExitCodes::SERVICE_UNREACHABLE
                }
                ClientError::Data(_) | ClientError::Cancelled => ExitCodes::GENERAL_ERROR,
            };
        }
    }
    ExitCodes::GENERAL_ERROR
}
