//! One-shot restore

use super::Context;
use dbvault_core::model::RestoreOutcome;

pub async fn execute(ctx: &Context) -> anyhow::Result<()> {
    match ctx.vault.restorer().restore().await? {
        RestoreOutcome::Restored { key, size_bytes } => println!(
            "Restored {} into {} ({} bytes)",
            key,
            ctx.settings.database_path.display(),
            size_bytes
        ),
        RestoreOutcome::NotFound => println!("No backup found in {}", ctx.settings.backup_folder),
    }
    Ok(())
}
