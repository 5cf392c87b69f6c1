//! dbvault CLI
//!
//! Keeps one SQLite file backed up to a remote folder

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "dbvault")]
#[command(about = "dbvault - SQLite backup and restore against object storage", long_about = None)]
struct Cli {
    /// Settings file (defaults to ./dbvault.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use an in-process store instead of Cloudinary
    #[arg(long, global = true)]
    dry: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Restore, sync the schema, then back up and sweep until Ctrl-C
    Serve,
    /// Run one backup cycle
    Backup,
    /// Replace the local database with the latest snapshot
    Restore,
    /// Delete snapshots outside the retention window
    Sweep(commands::sweep::SweepArgs),
    /// Print the folder's snapshots, newest first
    List,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match commands::Context::load(cli.config.as_deref(), cli.dry) {
        Ok(ctx) => match cli.command {
            Commands::Serve => commands::serve::execute(&ctx).await,
            Commands::Backup => commands::backup::execute(&ctx).await,
            Commands::Restore => commands::restore::execute(&ctx).await,
            Commands::Sweep(args) => commands::sweep::execute(&ctx, args).await,
            Commands::List => commands::list::execute(&ctx).await,
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
