//! Process-wide subscriber installation

use super::test_capture::init_test_capture;
use serde::Deserialize;
use std::sync::Once;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

/// Output style, selected by the `log_profile` setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Human-readable lines, `dbvault=debug`
    Development,
    /// One JSON object per event, `dbvault=info`
    Production,
    /// Events go to the in-memory capture layer
    Test,
}

impl Profile {
    fn default_directive(self) -> &'static str {
        match self {
            Profile::Development | Profile::Test => "dbvault=debug",
            Profile::Production => "dbvault=info",
        }
    }
}

static INIT_ONCE: Once = Once::new();

/// `RUST_LOG` when set, the profile's directive otherwise
fn filter_for(profile: Profile) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(profile.default_directive()))
}

/// Install the global subscriber for `profile`
///
/// Call once at process startup, before the restore runs. Later calls are
/// ignored whatever profile they pass.
pub fn init(profile: Profile) {
    INIT_ONCE.call_once(|| match profile {
        Profile::Development => {
            tracing_subscriber::fmt()
                .with_env_filter(filter_for(profile))
                .with_target(false)
                .finish()
                .init();
        }
        Profile::Production => {
            tracing_subscriber::fmt()
                .json()
                .flatten_event(true)
                .with_env_filter(filter_for(profile))
                .finish()
                .init();
        }
        Profile::Test => {
            init_test_capture();
        }
    });
}
