//! In-memory token store

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::store::{TokenStore, UpsertOutcome};
use crate::error::Result;
use crate::types::{DeviceToken, PushKind, SubscriberKey, TokenRef};

#[derive(Debug, Clone)]
struct StoredToken {
    seq: u64,
    token: DeviceToken,
}

/// DashMap-backed [`TokenStore`] for tests and single-node setups without a database
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    /// Map of subscriber to its rows, any kind
    tokens: Arc<DashMap<SubscriberKey, Vec<StoredToken>>>,
    next_seq: Arc<AtomicU64>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored rows
    pub fn len(&self) -> usize {
        self.tokens.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn same_row(a: &DeviceToken, b: &DeviceToken) -> bool {
    a.token == b.token && a.app_id == b.app_id && a.kind == b.kind
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn upsert(&self, token: &DeviceToken) -> Result<UpsertOutcome> {
        let key = SubscriberKey::new(&token.subscriber, &token.realm);
        let mut rows = self.tokens.entry(key).or_default();

        if let Some(existing) = rows.iter_mut().find(|row| same_row(&row.token, token)) {
            existing.token.last_seen = token.last_seen;
            existing.token.platform = token.platform.clone();
            return Ok(UpsertOutcome::Refreshed);
        }

        rows.push(StoredToken {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            token: token.clone(),
        });
        Ok(UpsertOutcome::Inserted)
    }

    async fn find(&self, subscriber: &SubscriberKey, kind: PushKind) -> Result<Vec<TokenRef>> {
        let Some(rows) = self.tokens.get(subscriber) else {
            return Ok(Vec::new());
        };
        let mut matching: Vec<&StoredToken> = rows.iter().filter(|row| row.token.kind == kind).collect();
        matching.sort_by(|a, b| b.token.last_seen.cmp(&a.token.last_seen).then(a.seq.cmp(&b.seq)));
        Ok(matching.into_iter().map(|row| TokenRef::from(&row.token)).collect())
    }

    async fn list(&self, subscriber: &SubscriberKey) -> Result<Vec<DeviceToken>> {
        Ok(self
            .tokens
            .get(subscriber)
            .map(|rows| rows.iter().map(|row| row.token.clone()).collect())
            .unwrap_or_default())
    }

    async fn delete_token(&self, token: &str) -> Result<u64> {
        let mut removed = 0u64;
        for mut entry in self.tokens.iter_mut() {
            let before = entry.value().len();
            entry.value_mut().retain(|row| row.token.token != token);
            removed += (before - entry.value().len()) as u64;
        }
        self.tokens.retain(|_, rows| !rows.is_empty());
        Ok(removed)
    }
}
