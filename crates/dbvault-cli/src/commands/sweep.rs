//! One-shot retention sweep

use super::Context;
use clap::Args;

#[derive(Debug, Args)]
pub struct SweepArgs {
    /// Override the configured retention window
    #[arg(long)]
    pub days: Option<u32>,
}

pub async fn execute(ctx: &Context, args: SweepArgs) -> anyhow::Result<()> {
    let days = args.days.unwrap_or(ctx.vault.retention_days());
    let report = ctx.vault.sweeper().sweep(days).await?;

    for key in &report.deleted {
        println!("deleted       {}", key);
    }
    for key in &report.already_gone {
        println!("already gone  {}", key);
    }
    for key in &report.failed {
        println!("failed        {}", key);
    }
    println!(
        "{} deleted, {} retained (window {} days)",
        report.deleted.len(),
        report.retained,
        days
    );

    if !report.is_clean() {
        anyhow::bail!("{} snapshot(s) could not be deleted", report.failed.len());
    }
    Ok(())
}
