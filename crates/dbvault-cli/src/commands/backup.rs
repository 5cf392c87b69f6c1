//! One-shot backup cycle

use super::Context;
use dbvault_core::model::CycleOutcome;

pub async fn execute(ctx: &Context) -> anyhow::Result<()> {
    match ctx.vault.backup().run_cycle().await? {
        CycleOutcome::Uploaded(snapshot) => {
            println!("Uploaded {} ({} bytes)", snapshot.key, snapshot.size_bytes)
        }
        CycleOutcome::Unchanged { size_bytes } => {
            println!("No changes detected ({} bytes), nothing uploaded", size_bytes)
        }
        CycleOutcome::Skipped => println!("Another backup is running"),
    }
    Ok(())
}
