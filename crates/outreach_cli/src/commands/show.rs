//! Show command - Inspect a thread.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use outreach_core::{CheckpointStore, FileCheckpointStore, Settings, STAGE_ORDER};

use super::mark;

#[derive(Args)]
pub struct ShowArgs {
    /// Thread identifier (defaults to the configured thread id)
    #[arg(short, long)]
    pub thread: Option<String>,

    /// Print the full audit log
    #[arg(short, long)]
    pub log: bool,

    /// List every known thread instead
    #[arg(long, conflicts_with = "thread")]
    pub all: bool,

    /// Override the state directory
    #[arg(long)]
    pub state_dir: Option<PathBuf>,
}

pub async fn execute(args: ShowArgs, settings: &Settings) -> Result<()> {
    let state_dir = args.state_dir.clone().unwrap_or_else(|| settings.state_dir.clone());
    let store = FileCheckpointStore::new(&state_dir);

    if args.all {
        let threads = store.threads()?;
        if threads.is_empty() {
            println!("No threads under {}", state_dir.display());
        }
        for thread in threads {
            if let Some(checkpoint) = store.load_latest(&thread)? {
                let status = if checkpoint.is_finished() { "finished" } else { "in progress" };
                println!(
                    "🧵 {:<28} {:<16} step {:<4} {}",
                    thread, checkpoint.state.current_stage.as_str(), checkpoint.step, status
                );
            }
        }
        return Ok(());
    }

    let thread_id = args
        .thread
        .clone()
        .unwrap_or_else(|| settings.default_thread_id.clone());
    let Some(checkpoint) = store.load_latest(&thread_id)? else {
        anyhow::bail!("Thread not found: {}", thread_id);
    };
    let state = &checkpoint.state;

    println!("🧵 Thread '{}'", thread_id);
    println!("   Saved at: {}", checkpoint.saved_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("   Step:     {}", checkpoint.step);
    println!(
        "   Stage:    {} [{}/{}] {}",
        state.current_stage,
        state.current_stage_index + 1,
        STAGE_ORDER.len(),
        state.current_stage.label()
    );
    match checkpoint.next {
        Some(node) => println!("   Next:     {}", node),
        None => println!("   Next:     END"),
    }
    if let Some(info) = &state.influencer_info {
        println!("   Influencer: {} ({}, {} followers)", info.nickname, info.platform, info.followers);
        if let Some(contact) = &info.contact_info {
            println!("   Contact:  {}", contact);
        }
    }

    println!();
    println!("   Workflow complete:   {}", mark(state.workflow_complete));
    println!("   Schedule confirmed:  {}", mark(state.schedule_confirmed));
    println!("   Product selected:    {}", mark(state.product_selected));
    println!("   Address collected:   {}", mark(state.address_collected));
    println!("   Needs human review:  {}", mark(state.needs_human_review));
    if let Some(address) = &state.shipping_address {
        println!("   Shipping address:    {}", address);
    }

    if args.log {
        println!();
        println!("📜 Audit log ({} entries):", state.message_log.len());
        for (i, entry) in state.message_log.iter().enumerate() {
            println!("   {:>3}. {}", i + 1, entry);
        }
    } else if let Some(latest) = state.latest_log() {
        println!();
        println!("   Last entry: {}", latest);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_show_unknown_thread() {
        let temp = TempDir::new().unwrap();
        let args = ShowArgs {
            thread: Some("nobody".to_string()),
            log: false,
            all: false,
            state_dir: Some(temp.path().to_path_buf()),
        };
        let err = execute(args, &Settings::default()).await.unwrap_err();
        assert!(err.to_string().contains("Thread not found"));
    }

    #[tokio::test]
    async fn test_show_all_on_empty_dir() {
        let temp = TempDir::new().unwrap();
        let args = ShowArgs {
            thread: None,
            log: false,
            all: true,
            state_dir: Some(temp.path().to_path_buf()),
        };
        execute(args, &Settings::default()).await.unwrap();
    }
}
