//! SQLite token store (sqlx)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::store::{TokenStore, UpsertOutcome};
use crate::error::Result;
use crate::types::{DeviceToken, Platform, PushKind, SubscriberKey, TokenRef};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS push_tokens (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        token TEXT NOT NULL,
        subscriber TEXT NOT NULL,
        realm TEXT NOT NULL,
        app_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        platform TEXT NOT NULL,
        last_seen TEXT NOT NULL,
        UNIQUE (token, subscriber, realm, app_id, kind)
    )",
    "CREATE INDEX IF NOT EXISTS push_tokens_subscriber ON push_tokens (subscriber, realm, kind)",
    "CREATE INDEX IF NOT EXISTS push_tokens_token ON push_tokens (token)",
];

#[derive(sqlx::FromRow, Debug, Clone)]
struct TokenRow {
    token: String,
    subscriber: String,
    realm: String,
    app_id: String,
    kind: String,
    platform: String,
    last_seen: DateTime<Utc>,
}

impl TokenRow {
    fn into_device_token(self) -> Option<DeviceToken> {
        let kind = match PushKind::from_str(&self.kind) {
            Ok(kind) => kind,
            Err(_) => {
                warn!("Skipping stored token with unknown kind '{}'", self.kind);
                return None;
            }
        };
        Some(DeviceToken {
            subscriber: self.subscriber,
            realm: self.realm,
            kind,
            platform: Platform::parse(&self.platform),
            token: self.token,
            app_id: self.app_id,
            last_seen: self.last_seen,
        })
    }
}

/// sqlx SQLite-backed [`TokenStore`]
#[derive(Clone, Debug)]
pub struct SqliteTokenStore {
    pool: SqlitePool,
}

impl SqliteTokenStore {
    /// Open (creating if needed) the database and make sure the schema exists
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // Every pooled connection to an in-memory database would see its own
        // empty database, so those get exactly one connection that never expires.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await?;
        let store = Self { pool };
        store.migrate().await?;
        info!("Token store ready at {}", database_url);
        Ok(store)
    }

    /// Use an existing pool
    pub async fn with_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl TokenStore for SqliteTokenStore {
    async fn upsert(&self, token: &DeviceToken) -> Result<UpsertOutcome> {
        let mut tx = self.pool.begin().await?;

        let refreshed = sqlx::query(
            "UPDATE push_tokens SET last_seen = ?, platform = ?
             WHERE token = ? AND subscriber = ? AND realm = ? AND app_id = ? AND kind = ?",
        )
        .bind(token.last_seen)
        .bind(token.platform.as_str())
        .bind(&token.token)
        .bind(&token.subscriber)
        .bind(&token.realm)
        .bind(&token.app_id)
        .bind(token.kind.as_str())
        .execute(&mut *tx)
        .await?;

        let outcome = if refreshed.rows_affected() > 0 {
            UpsertOutcome::Refreshed
        } else {
            // A concurrent insert of the same row between the two statements
            // lands on the conflict clause instead of failing.
            sqlx::query(
                "INSERT INTO push_tokens (token, subscriber, realm, app_id, kind, platform, last_seen)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (token, subscriber, realm, app_id, kind)
                 DO UPDATE SET last_seen = excluded.last_seen, platform = excluded.platform",
            )
            .bind(&token.token)
            .bind(&token.subscriber)
            .bind(&token.realm)
            .bind(&token.app_id)
            .bind(token.kind.as_str())
            .bind(token.platform.as_str())
            .bind(token.last_seen)
            .execute(&mut *tx)
            .await?;
            UpsertOutcome::Inserted
        };

        tx.commit().await?;
        debug!(
            "Token {} for {}@{} ({}) {:?}",
            token.token, token.subscriber, token.realm, token.kind, outcome
        );
        Ok(outcome)
    }

    async fn find(&self, subscriber: &SubscriberKey, kind: PushKind) -> Result<Vec<TokenRef>> {
        let rows = sqlx::query_as::<_, TokenRow>(
            "SELECT token, subscriber, realm, app_id, kind, platform, last_seen
             FROM push_tokens
             WHERE subscriber = ? AND realm = ? AND kind = ?
             ORDER BY last_seen DESC, id ASC",
        )
        .bind(subscriber.user())
        .bind(subscriber.realm())
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| TokenRef {
                platform: Platform::parse(&row.platform),
                app_id: row.app_id,
                token: row.token,
            })
            .collect())
    }

    async fn list(&self, subscriber: &SubscriberKey) -> Result<Vec<DeviceToken>> {
        let rows = sqlx::query_as::<_, TokenRow>(
            "SELECT token, subscriber, realm, app_id, kind, platform, last_seen
             FROM push_tokens
             WHERE subscriber = ? AND realm = ?
             ORDER BY id ASC",
        )
        .bind(subscriber.user())
        .bind(subscriber.realm())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(TokenRow::into_device_token).collect())
    }

    async fn delete_token(&self, token: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM push_tokens WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
