//! Settings loading
//!
//! Layers, lowest precedence first:
//! 1. built-in defaults
//! 2. a TOML file (`dbvault.toml` in the working directory unless a path is given)
//! 3. `DBVAULT_*` environment variables, `__` separating nested keys
//! 4. the legacy `CLOUDINARY_API_NAME` / `CLOUDINARY_API_KEY` / `CLOUDINARY_API_SECRET` variables
//!
//! A `.env` file is read into the process environment before any of this.

use config::{Config, ConfigError, Environment, File};
use dbvault_core::errors::{ExError, Result, VaultError};
use dbvault_core::logging_facility::Profile;
use dbvault_core_types::Sensitive;
use dbvault_store::remote::CloudinaryCredentials;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "DBVAULT";
const DEFAULT_FILE: &str = "dbvault";

/// Legacy credential variables and the keys they override
const LEGACY_OVERRIDES: [(&str, &str); 3] = [
    ("CLOUDINARY_API_NAME", "remote.cloud_name"),
    ("CLOUDINARY_API_KEY", "remote.api_key"),
    ("CLOUDINARY_API_SECRET", "remote.api_secret"),
];

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Live database file
    pub database_path: PathBuf,
    /// Where backup snapshots are staged before upload
    pub snapshot_path: PathBuf,
    /// Remote folder holding every snapshot
    pub backup_folder: String,
    pub backup_interval_secs: u64,
    pub sweep_interval_secs: u64,
    /// Snapshots older than this many days are swept
    pub retention_days: u32,
    /// Upper bound on any single remote call, downloads included
    pub remote_timeout_secs: u64,
    pub log_profile: Profile,
    pub remote: RemoteSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSettings {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: Sensitive<String>,
}

impl Settings {
    /// Load settings from the process environment and an optional file
    ///
    /// # Errors
    ///
    /// `ERR_CONFIG` when a source cannot be read, a value has the wrong
    /// type, or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // A missing .env file is normal
        let _ = dotenvy::dotenv();
        Self::load_from(path, None)
    }

    /// Load settings with an explicit variable map instead of the process
    /// environment
    ///
    /// # Errors
    ///
    /// See [`Settings::load`].
    pub fn load_from(path: Option<&Path>, vars: Option<HashMap<String, String>>) -> Result<Self> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_FILE).required(false),
        };

        let mut builder = Config::builder()
            .set_default("database_path", "database.sqlite")
            .and_then(|b| b.set_default("snapshot_path", "backup-database.sqlite"))
            .and_then(|b| b.set_default("backup_folder", "Backups"))
            .and_then(|b| b.set_default("backup_interval_secs", 3600_i64))
            .and_then(|b| b.set_default("sweep_interval_secs", 86_400_i64))
            .and_then(|b| b.set_default("retention_days", 3_i64))
            .and_then(|b| b.set_default("remote_timeout_secs", 60_i64))
            .and_then(|b| b.set_default("log_profile", "development"))
            .and_then(|b| b.set_default("remote.cloud_name", "default_cloud_name"))
            .and_then(|b| b.set_default("remote.api_key", "default_api_key"))
            .and_then(|b| b.set_default("remote.api_secret", "default_api_secret"))
            .map_err(|e| config_error("defaults", e))?
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(vars.clone()),
            );

        for (var, key) in LEGACY_OVERRIDES {
            let value = match &vars {
                Some(map) => map.get(var).cloned(),
                None => std::env::var(var).ok(),
            };
            builder = builder
                .set_override_option(key, value)
                .map_err(|e| config_error(key, e))?;
        }

        let settings: Settings = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| config_error("*", e))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the scheduler and store cannot run with
    ///
    /// # Errors
    ///
    /// `ERR_CONFIG` naming the offending key.
    pub fn validate(&self) -> Result<()> {
        let non_zero = [
            ("backup_interval_secs", self.backup_interval_secs),
            ("sweep_interval_secs", self.sweep_interval_secs),
            ("remote_timeout_secs", self.remote_timeout_secs),
        ];
        for (key, value) in non_zero {
            if value == 0 {
                return Err(invalid(key, "must be greater than zero"));
            }
        }
        if self.backup_folder.trim().is_empty() {
            return Err(invalid("backup_folder", "must not be empty"));
        }
        Ok(())
    }

    pub fn backup_interval(&self) -> Duration {
        Duration::from_secs(self.backup_interval_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }

    pub fn cloudinary_credentials(&self) -> CloudinaryCredentials {
        CloudinaryCredentials {
            cloud_name: self.remote.cloud_name.clone(),
            api_key: self.remote.api_key.clone(),
            api_secret: self.remote.api_secret.clone(),
        }
    }
}

fn invalid(key: &str, reason: &str) -> ExError {
    VaultError::InvalidConfig {
        key: key.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

fn config_error(key: &str, err: ConfigError) -> ExError {
    invalid(key, &err.to_string())
}
