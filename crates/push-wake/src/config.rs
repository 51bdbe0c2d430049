//! Configuration for push-wake
//!
//! Loaded once at startup from a TOML file (plus `PUSH_WAKE__*` environment
//! overrides) and validated eagerly: a malformed profile is a
//! [`PushWakeError::Configuration`] at load, never a surprise at send time.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::{PushWakeError, Result};
use crate::push::profile::AuthMode;
use crate::types::PushKind;

/// Main configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PushWakeConfig {
    /// Verbose logging, including per-token send results
    #[serde(default)]
    pub debug: bool,

    /// Log level name (`trace` .. `error`); takes precedence over `debug`
    #[serde(default)]
    pub log_level: Option<String>,

    /// sqlx connection string for the token store, e.g. `sqlite://push.db?mode=rwc`
    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default = "default_max_db_connections")]
    pub max_db_connections: u32,

    /// App id whose `voip` profile is used for wake pushes
    pub voip_app: String,

    /// Realm applied when a wake destination carries no `@realm`
    #[serde(default)]
    pub default_realm: Option<String>,

    /// Wake window when the caller supplies none
    #[serde(default = "default_wake_timeout_secs")]
    pub default_wake_timeout_secs: u64,

    /// How often the wait loop re-checks session liveness and cancellation
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Body text of the wake push
    #[serde(default = "default_wake_body")]
    pub wake_body: String,

    #[serde(default)]
    pub profiles: Vec<ProfileConfig>,
}

/// One push profile, addressed as `<app_id>-<kind>`
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileConfig {
    pub app_id: String,
    pub kind: PushKind,

    /// Provider endpoint; `{token}` is replaced with the device token
    pub target: String,

    #[serde(default)]
    pub auth: AuthMode,

    /// JSON payload template; the built-in APNs layout is used when absent
    #[serde(default)]
    pub template: Option<String>,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_total_timeout_ms")]
    pub total_timeout_ms: u64,
}

fn default_database_url() -> String {
    "sqlite://push_wake.db?mode=rwc".to_string()
}

fn default_max_db_connections() -> u32 {
    4
}

fn default_wake_timeout_secs() -> u64 {
    60
}

fn default_tick_interval_ms() -> u64 {
    500
}

fn default_wake_body() -> String {
    "WakeUP".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    3_000
}

fn default_total_timeout_ms() -> u64 {
    10_000
}

impl PushWakeConfig {
    /// Minimal configuration with no profiles
    pub fn new(voip_app: impl Into<String>) -> Self {
        Self {
            debug: false,
            log_level: None,
            database_url: default_database_url(),
            max_db_connections: default_max_db_connections(),
            voip_app: voip_app.into(),
            default_realm: None,
            default_wake_timeout_secs: default_wake_timeout_secs(),
            tick_interval_ms: default_tick_interval_ms(),
            wake_body: default_wake_body(),
            profiles: Vec::new(),
        }
    }

    /// Load from a TOML file with `PUSH_WAKE__` environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix("PUSH_WAKE").separator("__"))
            .build()?;
        let config: PushWakeConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an in-memory TOML document
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?;
        let config: PushWakeConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_wake_timeout(&self) -> Duration {
        Duration::from_secs(self.default_wake_timeout_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Check everything that does not need a profile to be built
    pub fn validate(&self) -> Result<()> {
        if self.voip_app.trim().is_empty() {
            return Err(PushWakeError::config("voip_app (VoIP application id) not set"));
        }
        if self.default_wake_timeout_secs == 0 {
            return Err(PushWakeError::config("default_wake_timeout_secs must be positive"));
        }
        if self.tick_interval_ms == 0 || self.tick_interval_ms >= 1_000 {
            return Err(PushWakeError::config(format!(
                "tick_interval_ms must be between 1 and 999, got {}",
                self.tick_interval_ms
            )));
        }
        if let Some(level) = &self.log_level {
            crate::logging::parse_log_level(level)?;
        }
        if self.max_db_connections == 0 {
            return Err(PushWakeError::config("max_db_connections must be positive"));
        }
        for profile in &self.profiles {
            profile.validate()?;
        }
        Ok(())
    }
}

impl ProfileConfig {
    /// Catalog key, `<app_id>-<kind>`
    pub fn name(&self) -> String {
        format!("{}-{}", self.app_id, self.kind)
    }

    pub fn validate(&self) -> Result<()> {
        let name = self.name();
        if self.app_id.trim().is_empty() {
            return Err(PushWakeError::config("profile without app_id"));
        }
        if !(self.target.starts_with("http://") || self.target.starts_with("https://")) {
            return Err(PushWakeError::config(format!(
                "profile '{}': target '{}' is not an http(s) URL",
                name, self.target
            )));
        }
        if self.connect_timeout_ms == 0 || self.total_timeout_ms < self.connect_timeout_ms {
            return Err(PushWakeError::config(format!(
                "profile '{}': need 0 < connect_timeout_ms <= total_timeout_ms",
                name
            )));
        }
        self.auth
            .validate()
            .map_err(|msg| PushWakeError::config(format!("profile '{}': {}", name, msg)))
    }
}
