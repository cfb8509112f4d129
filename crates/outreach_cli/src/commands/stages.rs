//! Stages command - List the workflow stages.

use anyhow::Result;
use clap::Args;

use outreach_core::STAGE_ORDER;

#[derive(Args)]
pub struct StagesArgs {
    /// Print identifiers only, one per line
    #[arg(long)]
    pub ids: bool,
}

pub async fn execute(args: StagesArgs) -> Result<()> {
    if args.ids {
        for stage in STAGE_ORDER {
            println!("{}", stage);
        }
        return Ok(());
    }

    println!("📋 Outreach stages ({}):", STAGE_ORDER.len());
    for stage in STAGE_ORDER {
        println!("   {}. {:<16} {}", stage.index() + 1, stage.as_str(), stage.label());
    }
    Ok(())
}
