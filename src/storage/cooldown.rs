//! Per-user-per-channel cooldown storage.

use super::StorageResult;
use crate::errors::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// A suspension window for one user in one channel.
///
/// `expires_at = None` is an indefinite mute; a timestamp is a timed
/// cooldown that lapses on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cooldown {
    pub affected_user_fid: i64,
    pub channel_id: String,
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Cooldown {
    /// Whether this cooldown currently suppresses the user's content.
    pub fn is_in_effect(&self, now: DateTime<Utc>) -> bool {
        if !self.active {
            return false;
        }
        match self.expires_at {
            None => true,
            Some(expires_at) => expires_at > now,
        }
    }

    /// Whether this is an indefinite mute rather than a timed cooldown.
    pub fn is_indefinite(&self) -> bool {
        self.expires_at.is_none()
    }
}

#[async_trait]
pub trait CooldownStorage: Send + Sync {
    async fn find_cooldown(&self, fid: i64, channel_id: &str) -> StorageResult<Option<Cooldown>>;

    /// Upsert keyed on `(affected_user_fid, channel_id)`. Repeat calls
    /// refresh the expiry, which keeps cooldown actions idempotent.
    async fn upsert_cooldown(
        &self,
        fid: i64,
        channel_id: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> StorageResult<()>;
}

#[async_trait]
impl<T: CooldownStorage + ?Sized> CooldownStorage for Arc<T> {
    async fn find_cooldown(&self, fid: i64, channel_id: &str) -> StorageResult<Option<Cooldown>> {
        self.as_ref().find_cooldown(fid, channel_id).await
    }

    async fn upsert_cooldown(
        &self,
        fid: i64,
        channel_id: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> StorageResult<()> {
        self.as_ref()
            .upsert_cooldown(fid, channel_id, expires_at)
            .await
    }
}

pub struct PostgresCooldownStorage {
    pool: PgPool,
}

impl PostgresCooldownStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CooldownStorage for PostgresCooldownStorage {
    #[instrument(skip(self), fields(db.operation = "find_cooldown", user.fid = fid, channel.id = %channel_id))]
    async fn find_cooldown(&self, fid: i64, channel_id: &str) -> StorageResult<Option<Cooldown>> {
        debug!("Fetching cooldown");

        let row = sqlx::query(
            r#"
            SELECT affected_user_fid, channel_id, active, expires_at
            FROM cooldowns
            WHERE affected_user_fid = $1 AND channel_id = $2
            "#,
        )
        .bind(fid)
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!(error = ?e, fid, channel = %channel_id, "Failed to fetch cooldown");
            StorageError::QueryFailed { source: e }
        })?;

        Ok(row.map(|row| Cooldown {
            affected_user_fid: row.get("affected_user_fid"),
            channel_id: row.get("channel_id"),
            active: row.get("active"),
            expires_at: row.get("expires_at"),
        }))
    }

    #[instrument(skip(self), fields(db.operation = "upsert_cooldown", user.fid = fid, channel.id = %channel_id))]
    async fn upsert_cooldown(
        &self,
        fid: i64,
        channel_id: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> StorageResult<()> {
        debug!(?expires_at, "Upserting cooldown");

        let result = sqlx::query(
            r#"
            INSERT INTO cooldowns (affected_user_fid, channel_id, active, expires_at)
            VALUES ($1, $2, TRUE, $3)
            ON CONFLICT (affected_user_fid, channel_id) DO UPDATE SET
                active = TRUE,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(fid)
        .bind(channel_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(error = ?e, fid, channel = %channel_id, "Failed to upsert cooldown");
            StorageError::QueryFailed { source: e }
        })?;

        debug!(
            rows_affected = result.rows_affected(),
            "Cooldown upserted successfully"
        );
        Ok(())
    }
}

/// In-memory cooldown storage for development and tests.
#[derive(Default)]
pub struct InMemoryCooldownStorage {
    cooldowns: tokio::sync::RwLock<HashMap<(i64, String), Cooldown>>,
}

impl InMemoryCooldownStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CooldownStorage for InMemoryCooldownStorage {
    async fn find_cooldown(&self, fid: i64, channel_id: &str) -> StorageResult<Option<Cooldown>> {
        Ok(self
            .cooldowns
            .read()
            .await
            .get(&(fid, channel_id.to_string()))
            .cloned())
    }

    async fn upsert_cooldown(
        &self,
        fid: i64,
        channel_id: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> StorageResult<()> {
        self.cooldowns.write().await.insert(
            (fid, channel_id.to_string()),
            Cooldown {
                affected_user_fid: fid,
                channel_id: channel_id.to_string(),
                active: true,
                expires_at,
            },
        );
        Ok(())
    }
}
