//! Run command - Start a new outreach conversation.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use outreach_core::{InfluencerInfo, RunOutcome, Settings};

use super::{build_executor, mark, ExecutorOptions};

#[derive(Args)]
pub struct RunArgs {
    /// Thread identifier (defaults to the configured thread id)
    #[arg(short, long)]
    pub thread: Option<String>,

    /// Influencer nickname
    #[arg(short, long)]
    pub nickname: Option<String>,

    /// Platform the influencer publishes on
    #[arg(short, long, default_value = "xiaohongshu")]
    pub platform: String,

    /// Follower count
    #[arg(long, default_value_t = 0)]
    pub followers: u64,

    /// Profile URL
    #[arg(long)]
    pub profile_url: Option<String>,

    /// Profile bio
    #[arg(long)]
    pub bio: Option<String>,

    /// Content category (beauty, fashion, ...)
    #[arg(long)]
    pub category: Option<String>,

    /// YAML list of scripted replies; simulated replies are used otherwise
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

impl RunArgs {
    fn influencer(&self) -> Option<InfluencerInfo> {
        let nickname = self.nickname.as_deref()?;
        let mut info = InfluencerInfo::new(nickname, &self.platform).with_followers(self.followers);
        if let Some(url) = &self.profile_url {
            info = info.with_profile_url(url);
        }
        if let Some(bio) = &self.bio {
            info = info.with_bio(bio);
        }
        if let Some(category) = &self.category {
            info = info.with_content_type(category);
        }
        Some(info)
    }
}

pub async fn execute(args: RunArgs, settings: &Settings, quiet: bool) -> Result<()> {
    let thread_id = args
        .thread
        .clone()
        .unwrap_or_else(|| settings.default_thread_id.clone());
    let state_dir = args.state_dir.clone().unwrap_or_else(|| settings.state_dir.clone());

    info!("Starting outreach thread: {}", thread_id);

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

    if !quiet {
        println!("🚀 Starting outreach on thread '{}'", thread_id);
        if let Some(path) = &args.replies {
            println!("   Replies: {}", path.display());
        } else {
            println!("   Replies: simulated");
        }
        println!();
    }

    let outcome = executor.run(&thread_id, args.influencer()).await?;

    if !quiet {
        print_summary(&outcome);
        println!();
        println!("💾 Checkpoints saved under {}", state_dir.display());
    }

    Ok(())
}

/// Print the end-of-run summary.
pub fn print_summary(outcome: &RunOutcome) {
    let state = &outcome.state;

    println!("🏁 Thread '{}' finished in {} steps", outcome.thread_id, outcome.steps);
    if !outcome.stages_visited.is_empty() {
        let stages: Vec<&str> = outcome.stages_visited.iter().map(|s| s.as_str()).collect();
        println!("   Stages: {}", stages.join(" → "));
    }
    println!("   Workflow complete:   {}", mark(state.workflow_complete));
    println!("   Schedule confirmed:  {}", mark(state.schedule_confirmed));
    println!("   Product selected:    {}", mark(state.product_selected));
    println!("   Address collected:   {}", mark(state.address_collected));
    println!("   Had questions:       {}", mark(state.has_questions));
    println!("   Needs human review:  {}", mark(state.needs_human_review));

    if let Some(kind) = &state.collaboration_type {
        println!("   Collaboration type:  {}", kind);
    }
    if let Some(price) = &state.price_range {
        println!("   Price range:         {}", price);
    }
    if state.needs_human_review {
        println!();
        println!("⚠️  A human operator has been notified for this thread");
    }
}
