//! Long-running mode

use super::Context;
use anyhow::Context as _;
use dbvault_engine::RestoreDecision;
use dbvault_store::db::SqliteDatabase;

pub async fn execute(ctx: &Context) -> anyhow::Result<()> {
    let mut db = SqliteDatabase::new(&ctx.settings.database_path);
    let report = ctx.vault.init_database(&mut db).await?;
    match &report.restore {
        RestoreDecision::Restored { key, size_bytes } => {
            println!("Restored {} ({} bytes)", key, size_bytes)
        }
        RestoreDecision::NoBackup => println!("No backup found, starting fresh"),
        RestoreDecision::FreshStart { error } => {
            println!("Restore failed ({}), starting fresh", error.code())
        }
    }

    let tasks = ctx.vault.spawn_background();
    println!(
        "Serving {}; press Ctrl-C to stop",
        ctx.settings.database_path.display()
    );

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    tracing::info!("Shutdown requested");

    tasks.shutdown().await?;
    db.close()?;
    Ok(())
}
