//! Token registry
//!
//! Front of the token store used by ingestion, dispatch and admin. Storage
//! failures never escape: registration logs and carries on, lookup degrades to
//! an empty list, and invalidation runs in the background.

pub mod memory;
pub mod sqlite;
pub mod store;

pub use memory::MemoryTokenStore;
pub use sqlite::SqliteTokenStore;
pub use store::{TokenStore, UpsertOutcome};

use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::types::{DeviceToken, Platform, PushKind, SubscriberKey, TokenRef};

/// Shared handle over a [`TokenStore`]
#[derive(Clone)]
pub struct TokenRegistry {
    store: Arc<dyn TokenStore>,
}

impl TokenRegistry {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Registry over a fresh [`MemoryTokenStore`]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTokenStore::new()))
    }

    /// Record a token, or refresh `last_seen` if it is already known
    ///
    /// Returns `None` when nothing was stored (incomplete input or storage fault).
    pub async fn register(
        &self,
        subscriber: &str,
        realm: &str,
        kind: PushKind,
        app_id: &str,
        token: &str,
        platform: Platform,
    ) -> Option<UpsertOutcome> {
        if [subscriber, realm, app_id, token].iter().any(|s| s.trim().is_empty()) {
            debug!(
                "Not registering incomplete token (subscriber '{}', realm '{}', app '{}')",
                subscriber, realm, app_id
            );
            return None;
        }

        let key = SubscriberKey::new(subscriber, realm);
        let device = DeviceToken {
            subscriber: key.user().to_string(),
            realm: key.realm().to_string(),
            kind,
            platform,
            token: token.trim().to_string(),
            app_id: app_id.trim().to_string(),
            last_seen: Utc::now(),
        };

        match self.store.upsert(&device).await {
            Ok(outcome) => {
                if outcome == UpsertOutcome::Inserted {
                    info!("Registered {} token for {} (app {})", kind, key, device.app_id);
                }
                Some(outcome)
            }
            Err(e) => {
                error!("Failed to store {} token for {}: {}", kind, key, e);
                None
            }
        }
    }

    /// Tokens of a subscriber for one kind; empty on storage failure
    pub async fn lookup(&self, subscriber: &str, realm: &str, kind: PushKind) -> Vec<TokenRef> {
        let key = SubscriberKey::new(subscriber, realm);
        match self.store.find(&key, kind).await {
            Ok(tokens) => {
                debug!("Found {} {} token(s) for {}", tokens.len(), kind, key);
                tokens
            }
            Err(e) => {
                error!("Token lookup for {} failed: {}", key, e);
                Vec::new()
            }
        }
    }

    /// All stored rows of a subscriber; empty on storage failure
    pub async fn tokens_of(&self, subscriber: &str, realm: &str) -> Vec<DeviceToken> {
        let key = SubscriberKey::new(subscriber, realm);
        self.store.list(&key).await.unwrap_or_else(|e| {
            error!("Token listing for {} failed: {}", key, e);
            Vec::new()
        })
    }

    /// Remove a token everywhere, in the background
    ///
    /// The caller does not wait for the delete; the handle is there for
    /// whoever wants to.
    pub fn invalidate(&self, token: &str) -> JoinHandle<()> {
        let store = self.store.clone();
        let token = token.to_string();
        tokio::spawn(async move {
            match store.delete_token(&token).await {
                Ok(0) => debug!("Invalidated token {} was not stored", token),
                Ok(removed) => info!("Invalidated token {} ({} row(s))", token, removed),
                Err(e) => error!("Failed to invalidate token {}: {}", token, e),
            }
        })
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}
