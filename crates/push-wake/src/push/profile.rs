//! Push profiles
//!
//! A profile says where and how to deliver one kind of push for one app. The
//! catalog is built once from configuration and never mutated; a reload builds
//! a fresh catalog and swaps it in through [`crate::context::PushWakeContext`].

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::payload::PayloadTemplate;
use crate::config::ProfileConfig;
use crate::error::{PushWakeError, Result};
use crate::types::PushKind;

/// How requests to the provider authenticate
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum AuthMode {
    None,
    Bearer { token: String },
    Basic { username: String, password: String },
    Digest { username: String, password: String },
}

impl Default for AuthMode {
    fn default() -> Self {
        AuthMode::None
    }
}

impl AuthMode {
    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        match self {
            AuthMode::None => Ok(()),
            AuthMode::Bearer { token } if token.is_empty() => Err("bearer auth without token".to_string()),
            AuthMode::Basic { username, password } | AuthMode::Digest { username, password }
                if username.is_empty() || password.is_empty() =>
            {
                Err("auth mode needs both username and password".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// A loaded, immutable push profile
#[derive(Debug, Clone)]
pub struct PushProfile {
    pub name: String,
    pub app_id: String,
    pub kind: PushKind,
    pub target: String,
    pub auth: AuthMode,
    pub template: PayloadTemplate,
    pub connect_timeout: Duration,
    pub total_timeout: Duration,
}

impl PushProfile {
    pub fn from_config(config: &ProfileConfig) -> Result<Self> {
        config.validate()?;
        let name = config.name();
        let template = match &config.template {
            Some(raw) => PayloadTemplate::parse(raw)
                .map_err(|e| PushWakeError::config(format!("profile '{}': {}", name, e)))?,
            None => PayloadTemplate::default(),
        };

        Ok(Self {
            name,
            app_id: config.app_id.clone(),
            kind: config.kind,
            target: config.target.clone(),
            auth: config.auth.clone(),
            template,
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            total_timeout: Duration::from_millis(config.total_timeout_ms),
        })
    }

    /// Provider URL for one token
    pub fn target_for(&self, token: &str) -> String {
        self.target.replace("{token}", token)
    }
}

/// All profiles, keyed by `<app_id>-<kind>`
#[derive(Debug, Clone, Default)]
pub struct ProfileCatalog {
    profiles: HashMap<String, Arc<PushProfile>>,
}

impl ProfileCatalog {
    pub fn from_configs(configs: &[ProfileConfig]) -> Result<Self> {
        let mut profiles = HashMap::new();
        for config in configs {
            let profile = PushProfile::from_config(config)?;
            if profiles.contains_key(&profile.name) {
                return Err(PushWakeError::config(format!("duplicate profile '{}'", profile.name)));
            }
            info!("Loaded push profile '{}'", profile.name);
            profiles.insert(profile.name.clone(), Arc::new(profile));
        }
        if profiles.is_empty() {
            info!("No push profiles defined");
        }
        Ok(Self { profiles })
    }

    /// Find the profile for an app and kind
    pub fn locate(&self, app_id: &str, kind: PushKind) -> Option<Arc<PushProfile>> {
        if app_id.is_empty() {
            debug!("Can't find profile without app id for kind {}", kind);
            return None;
        }
        let name = format!("{}-{}", app_id, kind);
        let found = self.profiles.get(&name).cloned();
        if found.is_none() {
            debug!("No push profile '{}'", name);
        }
        found
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
