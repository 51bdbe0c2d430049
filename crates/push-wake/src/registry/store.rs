//! Token store trait

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{DeviceToken, PushKind, SubscriberKey, TokenRef};

/// What an upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new row was created
    Inserted,
    /// The row existed; only `last_seen` (and platform) moved
    Refreshed,
}

/// Persistent token storage
///
/// Rows are unique on `(token, subscriber, realm, app_id, kind)`. Subscriber
/// and realm arrive already normalized through [`SubscriberKey`].
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn upsert(&self, token: &DeviceToken) -> Result<UpsertOutcome>;

    /// Tokens for one subscriber and kind, most recently seen first
    async fn find(&self, subscriber: &SubscriberKey, kind: PushKind) -> Result<Vec<TokenRef>>;

    /// Every stored row of a subscriber, any kind
    async fn list(&self, subscriber: &SubscriberKey) -> Result<Vec<DeviceToken>>;

    /// Delete every row carrying this token value; returns the number removed
    async fn delete_token(&self, token: &str) -> Result<u64>;

    async fn close(&self) {}
}
