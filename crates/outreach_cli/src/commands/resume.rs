//! Resume command - Continue a thread from its latest checkpoint.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use outreach_core::Settings;

use super::run::print_summary;
use super::{build_executor, ExecutorOptions};

#[derive(Args)]
pub struct ResumeArgs {
    /// Thread identifier (defaults to the configured thread id)
    #[arg(short, long)]
    pub thread: Option<String>,

    /// YAML list of scripted replies for the remaining stages
    #[arg(short, long)]
    pub replies: Option<PathBuf>,

    /// Seed for greeting selection
    #[arg(long)]
    pub seed: Option<u64>,

    /// Override the iteration ceiling
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Override the state directory
    #[arg(long)]
    pub state_dir: Option<PathBuf>,

    /// Address the influencer by nickname in every message
    #[arg(long)]
    pub salutation: bool,
}

pub async fn execute(args: ResumeArgs, settings: &Settings, quiet: bool) -> Result<()> {
    let thread_id = args
        .thread
        .clone()
        .unwrap_or_else(|| settings.default_thread_id.clone());
    let state_dir = args.state_dir.clone().unwrap_or_else(|| settings.state_dir.clone());

    info!("Resuming outreach thread: {}", thread_id);

    let executor = build_executor(
        settings,
        ExecutorOptions {
            state_dir: &state_dir,
            replies: args.replies.as_deref(),
            seed: args.seed,
            max_steps: args.max_steps.unwrap_or(settings.max_steps),
            salutation: args.salutation,
        },
    )?;

    let outcome = executor.resume(&thread_id).await?;

    if !quiet {
        if outcome.stages_visited.is_empty() && outcome.state.workflow_complete {
            println!("ℹ️  Thread '{}' had already finished", thread_id);
            println!();
        }
        print_summary(&outcome);
    }

    Ok(())
}
