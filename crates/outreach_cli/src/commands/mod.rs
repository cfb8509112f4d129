//! CLI command definitions.
//!
//! Each subcommand maps to one operation on an outreach thread.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;

use outreach_core::{
    ExecutorConfig, FileCheckpointStore, JsonlEscalationSink, MessagePolisher, PassthroughPolisher,
    RetryingTransport, SalutationPolisher, ScriptedTransport, Settings, SimulatedTransport, StageId,
    StageRegistry, TemplateContentProvider, Transport, WorkflowExecutor,
};

pub mod graph;
pub mod resume;
pub mod run;
pub mod show;
pub mod stages;

/// Outreach agent - multi-stage influencer negotiation workflow
#[derive(Parser)]
#[command(name = "outreach")]
#[command(version, about = "Outreach agent - multi-stage influencer negotiation workflow")]
#[command(long_about = r#"
Drives a nine-stage outreach conversation with an influencer, from the first
greeting to the closing message. Every step is checkpointed so an
interrupted conversation can be resumed.

COMMANDS:
  run      → Start a conversation on a new thread
  resume   → Continue a thread from its latest checkpoint
  show     → Inspect a thread's state and audit log
  stages   → List the stages in order
  graph    → Print the workflow graph

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments or configuration
  3 - Iteration limit exceeded
  4 - Checkpoint or resume error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Settings file (YAML)
    #[arg(short, long, global = true, env = "OUTREACH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a new outreach conversation
    Run(run::RunArgs),

    /// Resume a thread from its latest checkpoint
    Resume(resume::ResumeArgs),

    /// Show a thread's current state
    Show(show::ShowArgs),

    /// List the workflow stages
    Stages(stages::StagesArgs),

    /// Print the workflow graph
    Graph(graph::GraphArgs),
}

/// One scripted reply from a `--replies` file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ReplyEntry {
    /// Answer for whichever stage asks next
    Next(String),
    /// Answer for a specific stage
    Staged { stage: StageId, reply: String },
}

/// Read a YAML list of replies.
pub fn load_replies(path: &Path) -> Result<ScriptedTransport> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read replies file {}", path.display()))?;
    let entries: Vec<ReplyEntry> = serde_yaml::from_str(&content)
        .with_context(|| format!("Invalid replies file {}", path.display()))?;

    let mut transport = ScriptedTransport::new();
    for entry in entries {
        transport = match entry {
            ReplyEntry::Next(reply) => {
                transport.push_reply(reply);
                transport
            }
            ReplyEntry::Staged { stage, reply } => transport.reply_at(stage, reply),
        };
    }
    Ok(transport)
}

/// Options shared by the commands that drive a thread.
pub struct ExecutorOptions<'a> {
    pub state_dir: &'a Path,
    pub replies: Option<&'a Path>,
    pub seed: Option<u64>,
    pub max_steps: usize,
    pub salutation: bool,
}

/// Build an executor persisting checkpoints and escalations under `state_dir`.
pub fn build_executor(settings: &Settings, options: ExecutorOptions<'_>) -> Result<WorkflowExecutor> {
    let content = match options.seed {
        Some(seed) => TemplateContentProvider::seeded(seed),
        None => TemplateContentProvider::new(),
    };
    let registry = StageRegistry::standard(Arc::new(content));

    let transport: Arc<dyn Transport> = match options.replies {
        Some(path) => Arc::new(RetryingTransport::new(load_replies(path)?, settings.max_retries)),
        None => Arc::new(RetryingTransport::new(SimulatedTransport, settings.max_retries)),
    };

    let polisher: Arc<dyn MessagePolisher> = if options.salutation {
        Arc::new(SalutationPolisher)
    } else {
        Arc::new(PassthroughPolisher)
    };

    let executor = WorkflowExecutor::builder(Arc::new(registry))
        .transport(transport)
        .polisher(polisher)
        .checkpoints(Arc::new(FileCheckpointStore::new(options.state_dir)))
        .escalation_sink(Arc::new(JsonlEscalationSink::new(
            options.state_dir.join("escalations.jsonl"),
        )))
        .config(ExecutorConfig {
            max_steps: options.max_steps,
        })
        .build()?;
    Ok(executor)
}

/// Yes/no marker for summaries.
pub fn mark(flag: bool) -> &'static str {
    if flag {
        "✅"
    } else {
        "❌"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "outreach", "--verbose", "run", "--thread", "t1", "--nickname", "Mia", "--seed", "7",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Run(_)));
    }

    #[test]
    fn test_cli_rejects_unknown_graph_format() {
        assert!(Cli::try_parse_from(["outreach", "graph", "--format", "svg"]).is_err());
    }

    #[test]
    fn test_reply_entries() {
        let entries: Vec<ReplyEntry> =
            serde_yaml::from_str("- Sounds good\n- stage: schedule\n  reply: Which week?\n").unwrap();
        assert_eq!(entries[0], ReplyEntry::Next("Sounds good".to_string()));
        assert_eq!(
            entries[1],
            ReplyEntry::Staged {
                stage: StageId::Schedule,
                reply: "Which week?".to_string()
            }
        );
    }

    #[test]
    fn test_load_replies_missing_file() {
        let temp = TempDir::new().unwrap();
        assert!(load_replies(&temp.path().join("absent.yaml")).is_err());
    }
}
