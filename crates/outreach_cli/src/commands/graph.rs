//! Graph command - Print the workflow graph.

use anyhow::Result;
use clap::{Args, ValueEnum};

use outreach_core::graph::{render_ascii, render_mermaid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    /// Mermaid flowchart
    Mermaid,
    /// Plain text adjacency list
    Ascii,
}

#[derive(Args)]
pub struct GraphArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = GraphFormat::Ascii)]
    pub format: GraphFormat,
}

pub async fn execute(args: GraphArgs) -> Result<()> {
    let rendered = match args.format {
        GraphFormat::Mermaid => render_mermaid(),
        GraphFormat::Ascii => render_ascii(),
    };
    print!("{}", rendered);
    Ok(())
}
