//! Shared push-wake context
//!
//! Everything that used to be process-wide state lives here and is handed to
//! the registry, dispatcher and coordinator at construction. Readers take an
//! `Arc<Settings>` snapshot; a reload validates the new configuration first
//! and only then swaps the snapshot, so a bad reload leaves the running
//! settings untouched and in-flight wakes keep the snapshot they started with.

use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::PushWakeConfig;
use crate::error::Result;
use crate::push::profile::ProfileCatalog;

/// One validated configuration generation
#[derive(Debug)]
pub struct Settings {
    pub config: PushWakeConfig,
    pub profiles: ProfileCatalog,
    pub generation: u64,
}

impl Settings {
    fn build(config: PushWakeConfig, generation: u64) -> Result<Self> {
        config.validate()?;
        let profiles = ProfileCatalog::from_configs(&config.profiles)?;
        Ok(Self {
            config,
            profiles,
            generation,
        })
    }
}

#[derive(Debug)]
pub struct PushWakeContext {
    current: RwLock<Arc<Settings>>,
}

impl PushWakeContext {
    /// Validate and load the initial configuration
    pub fn load(config: PushWakeConfig) -> Result<Arc<Self>> {
        let settings = Settings::build(config, 1)?;
        info!(
            "Push-wake context loaded: voip_app '{}', {} profile(s)",
            settings.config.voip_app,
            settings.profiles.len()
        );
        Ok(Arc::new(Self {
            current: RwLock::new(Arc::new(settings)),
        }))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        Self::load(PushWakeConfig::from_file(path)?)
    }

    /// Current settings snapshot
    pub fn settings(&self) -> Arc<Settings> {
        self.current.read().clone()
    }

    /// Replace the settings; on error the previous generation stays active
    pub fn reload(&self, config: PushWakeConfig) -> Result<u64> {
        let generation = self.current.read().generation + 1;
        let settings = Arc::new(Settings::build(config, generation)?);
        *self.current.write() = settings;
        info!("Push-wake configuration reloaded (generation {})", generation);
        Ok(generation)
    }
}
