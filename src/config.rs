//! xsweep configuration loaded from `xsweep.toml`.
//!
//! [`SweepConfig`] holds every tunable. Keys missing from the file fall back
//! to defaults. `XSWEEP_USER_TOKEN` and `XSWEEP_BEARER_TOKEN` take precedence
//! over the file for the credentials.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::FixedOffset;
use serde::Deserialize;

use crate::error::SweepError;

pub const DEFAULT_CONFIG_FILE: &str = "xsweep.toml";

/// Top-level configuration loaded from `xsweep.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct SweepConfig {
    /// OAuth 2.0 user-context access token, required for deletes.
    #[serde(default)]
    pub user_token: String,

    /// App-only bearer token used for read endpoints.
    #[serde(default)]
    pub bearer_token: String,

    /// Base URL of the X API v2.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Fixed pause between two deletes, in seconds.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Pause between two lookups while the rate-limit window has room.
    #[serde(default = "default_lookup_interval_secs")]
    pub lookup_interval_secs: u64,

    /// Granularity at which pause/cancel are re-checked during a wait.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Per-request HTTP timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Directory receiving the audit logs.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Fixed UTC offset used for every timestamp written to an audit log.
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,

    /// Bind address of the status/control HTTP surface.
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_api_base() -> String {
    crate::x_api::client::API_BASE.to_string()
}

fn default_interval_secs() -> u64 {
    20
}

fn default_lookup_interval_secs() -> u64 {
    1
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_request_timeout_secs() -> u64 {
    20
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

// JST
fn default_utc_offset_hours() -> i32 {
    9
}

fn default_listen() -> String {
    "127.0.0.1:5000".to_string()
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            user_token: String::new(),
            bearer_token: String::new(),
            api_base: default_api_base(),
            interval_secs: default_interval_secs(),
            lookup_interval_secs: default_lookup_interval_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            log_dir: default_log_dir(),
            utc_offset_hours: default_utc_offset_hours(),
            listen: default_listen(),
        }
    }
}

impl SweepConfig {
    /// Loads the given file, or defaults if it does not exist, then applies
    /// the environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, SweepError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<SweepConfig>(&contents)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    // Environment wins over the file for credentials.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup("XSWEEP_USER_TOKEN").filter(|t| !t.is_empty()) {
            self.user_token = token;
        }
        if let Some(token) = lookup("XSWEEP_BEARER_TOKEN").filter(|t| !t.is_empty()) {
            self.bearer_token = token;
        }
    }

    fn validate(&self) -> Result<(), SweepError> {
        if self.poll_interval_ms == 0 {
            return Err(SweepError::Config("poll_interval_ms must be positive".into()));
        }
        if self.timezone().is_none() {
            return Err(SweepError::Config(format!(
                "utc_offset_hours out of range: {}",
                self.utc_offset_hours
            )));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn lookup_interval(&self) -> Duration {
        Duration::from_secs(self.lookup_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn timezone(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
    }

    /// Token for write endpoints; an empty string means "not configured".
    pub fn require_user_token(&self) -> Result<&str, SweepError> {
        if self.user_token.is_empty() {
            return Err(SweepError::Config(
                "user_token missing (set it in xsweep.toml or XSWEEP_USER_TOKEN)".into(),
            ));
        }
        Ok(&self.user_token)
    }

    /// Token for read endpoints; falls back to the user token.
    pub fn read_token(&self) -> Result<&str, SweepError> {
        if !self.bearer_token.is_empty() {
            return Ok(&self.bearer_token);
        }
        if !self.user_token.is_empty() {
            return Ok(&self.user_token);
        }
        Err(SweepError::Config(
            "bearer_token missing (set it in xsweep.toml or XSWEEP_BEARER_TOKEN)".into(),
        ))
    }
}
