//! Outreach agent CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments or configuration
//! - 3: Iteration limit exceeded
//! - 4: Checkpoint or resume error

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use outreach_core::{CoreError, Settings};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const ITERATION_LIMIT: u8 = 3;
    pub const CHECKPOINT_ERROR: u8 = 4;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(&cli);

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            return ExitCode::from(ExitCodes::INVALID_ARGS);
        }
    };

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args, &settings, cli.quiet).await,
        Commands::Resume(args) => commands::resume::execute(args, &settings, cli.quiet).await,
        Commands::Show(args) => commands::show::execute(args, &settings).await,
        Commands::Stages(args) => commands::stages::execute(args).await,
        Commands::Graph(args) => commands::graph::execute(args).await,
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

fn init_logging(cli: &Cli) {
    let default_level = if cli.verbose {
        "outreach=debug"
    } else if cli.quiet {
        "outreach=warn"
    } else {
        "outreach=info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,{}", default_level)));

    let log_result = if cli.json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(false))
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false))
            .with(filter)
            .try_init()
    };

    if log_result.is_err() {
        // Logging already initialized, continue
    }
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::from_env(),
    };

    for problem in settings.validate() {
        tracing::warn!("Configuration: {}", problem);
    }
    Ok(settings)
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if let Some(core) = e.downcast_ref::<CoreError>() {
        return match core {
            CoreError::IterationLimitExceeded { .. } => ExitCodes::ITERATION_LIMIT,
            CoreError::Checkpoint(_) | CoreError::InvalidState(_) => ExitCodes::CHECKPOINT_ERROR,
            CoreError::Config(_) | CoreError::StageNotFound(_) => ExitCodes::INVALID_ARGS,
            _ => ExitCodes::GENERAL_ERROR,
        };
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("checkpoint") || msg.contains("thread") {
        ExitCodes::CHECKPOINT_ERROR
    } else if msg.contains("argument") || msg.contains("option") || msg.contains("not found") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}
