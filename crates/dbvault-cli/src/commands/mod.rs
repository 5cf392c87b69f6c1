//! Subcommand implementations

pub mod backup;
pub mod list;
pub mod restore;
pub mod serve;
pub mod sweep;

use anyhow::Context as _;
use dbvault_core::logging_facility;
use dbvault_engine::{Settings, Vault};
use dbvault_store::remote::MemoryStore;
use std::path::Path;
use std::sync::Arc;

/// Loaded settings plus the engine wired from them
pub struct Context {
    pub settings: Settings,
    pub vault: Vault,
}

impl Context {
    pub fn load(config: Option<&Path>, dry: bool) -> anyhow::Result<Self> {
        let settings = Settings::load(config).context("loading settings")?;
        logging_facility::init(settings.log_profile);

        let vault = if dry {
            tracing::warn!("Dry run: snapshots go to an in-process store and are lost on exit");
            Vault::new(&settings, Arc::new(MemoryStore::new()))
        } else {
            Vault::with_cloudinary(&settings).context("building Cloudinary client")?
        };

        Ok(Self { settings, vault })
    }
}
