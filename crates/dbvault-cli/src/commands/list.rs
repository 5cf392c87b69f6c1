//! Snapshot listing

use super::Context;
use dbvault_store::remote::SnapshotStore;

pub async fn execute(ctx: &Context) -> anyhow::Result<()> {
    let snapshots = ctx.vault.store().list(&ctx.settings.backup_folder).await?;
    if snapshots.is_empty() {
        println!("No snapshots in {}", ctx.settings.backup_folder);
        return Ok(());
    }
    for s in &snapshots {
        println!(
            "{}  {:>12}  {}",
            s.created_at.format("%Y-%m-%d %H:%M:%S"),
            s.size_bytes,
            s.key
        );
    }
    Ok(())
}
