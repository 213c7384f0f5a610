//! Append-only moderation audit log.

use super::StorageResult;
use crate::errors::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, instrument};
use ulid::Ulid;

/// Who initiated a logged action.
pub const ACTOR_SYSTEM: &str = "system";

/// One audit record per executed (or simulated) action.
///
/// Entries are append-only. The single permitted mutation is the manual
/// approval path, which flips `action` from `hideQuietly` to `like` via
/// [`ModerationLogStorage::set_action`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationLog {
    pub id: String,
    pub channel_id: String,
    pub action: String,
    pub actor: String,
    pub reason: String,
    pub affected_user_fid: i64,
    pub affected_username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cast_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ModerationLog {
    /// Build a log entry with a fresh id. Simulated entries get a
    /// `sim_`-prefixed id and are never persisted.
    pub fn new(
        channel_id: &str,
        action: &str,
        reason: &str,
        affected_user_fid: i64,
        affected_username: &str,
        cast_hash: Option<&str>,
        simulated: bool,
    ) -> Self {
        let id = if simulated {
            format!("sim_{}", Ulid::new())
        } else {
            Ulid::new().to_string()
        };
        Self {
            id,
            channel_id: channel_id.to_string(),
            action: action.to_string(),
            actor: ACTOR_SYSTEM.to_string(),
            reason: reason.to_string(),
            affected_user_fid,
            affected_username: affected_username.to_string(),
            cast_hash: cast_hash.map(|h| h.to_string()),
            created_at: Utc::now(),
        }
    }

    pub fn is_simulated(&self) -> bool {
        self.id.starts_with("sim_")
    }
}

#[async_trait]
pub trait ModerationLogStorage: Send + Sync {
    async fn create_log(&self, entry: &ModerationLog) -> StorageResult<()>;

    async fn get_log(&self, id: &str) -> StorageResult<Option<ModerationLog>>;

    async fn list_by_channel(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<ModerationLog>>;

    /// The manual-override path: update the `action` of an existing entry.
    async fn set_action(&self, id: &str, action: &str) -> StorageResult<()>;
}

#[async_trait]
impl<T: ModerationLogStorage + ?Sized> ModerationLogStorage for Arc<T> {
    async fn create_log(&self, entry: &ModerationLog) -> StorageResult<()> {
        self.as_ref().create_log(entry).await
    }

    async fn get_log(&self, id: &str) -> StorageResult<Option<ModerationLog>> {
        self.as_ref().get_log(id).await
    }

    async fn list_by_channel(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<ModerationLog>> {
        self.as_ref().list_by_channel(channel_id, limit).await
    }

    async fn set_action(&self, id: &str, action: &str) -> StorageResult<()> {
        self.as_ref().set_action(id, action).await
    }
}

pub struct PostgresModerationLogStorage {
    pool: PgPool,
}

impl PostgresModerationLogStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_log(row: &sqlx::postgres::PgRow) -> ModerationLog {
        ModerationLog {
            id: row.get("id"),
            channel_id: row.get("channel_id"),
            action: row.get("action"),
            actor: row.get("actor"),
            reason: row.get("reason"),
            affected_user_fid: row.get("affected_user_fid"),
            affected_username: row.get("affected_username"),
            cast_hash: row.get("cast_hash"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl ModerationLogStorage for PostgresModerationLogStorage {
    #[instrument(skip(self, entry), fields(
        db.operation = "create_log",
        log.id = %entry.id,
        log.action = %entry.action,
        log.channel = %entry.channel_id
    ))]
    async fn create_log(&self, entry: &ModerationLog) -> StorageResult<()> {
        debug!("Inserting moderation log");

        if entry.is_simulated() {
            return Err(StorageError::InvalidInput {
                details: "refusing to persist a simulated log entry".to_string(),
            });
        }

        sqlx::query(
            r#"
            INSERT INTO moderation_logs
                (id, channel_id, action, actor, reason, affected_user_fid,
                 affected_username, cast_hash, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.channel_id)
        .bind(&entry.action)
        .bind(&entry.actor)
        .bind(&entry.reason)
        .bind(entry.affected_user_fid)
        .bind(&entry.affected_username)
        .bind(&entry.cast_hash)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(error = ?e, id = %entry.id, "Failed to insert moderation log");
            StorageError::QueryFailed { source: e }
        })?;

        Ok(())
    }

    #[instrument(skip(self), fields(db.operation = "get_log", log.id = %id))]
    async fn get_log(&self, id: &str) -> StorageResult<Option<ModerationLog>> {
        let row = sqlx::query(
            r#"
            SELECT id, channel_id, action, actor, reason, affected_user_fid,
                   affected_username, cast_hash, created_at
            FROM moderation_logs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!(error = ?e, id = %id, "Failed to fetch moderation log");
            StorageError::QueryFailed { source: e }
        })?;

        Ok(row.as_ref().map(Self::row_to_log))
    }

    #[instrument(skip(self), fields(db.operation = "list_logs", log.channel = %channel_id))]
    async fn list_by_channel(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<ModerationLog>> {
        let rows = sqlx::query(
            r#"
            SELECT id, channel_id, action, actor, reason, affected_user_fid,
                   affected_username, cast_hash, created_at
            FROM moderation_logs
            WHERE channel_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(channel_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!(error = ?e, channel = %channel_id, "Failed to list moderation logs");
            StorageError::QueryFailed { source: e }
        })?;

        Ok(rows.iter().map(Self::row_to_log).collect())
    }

    #[instrument(skip(self), fields(db.operation = "set_action", log.id = %id, log.action = %action))]
    async fn set_action(&self, id: &str, action: &str) -> StorageResult<()> {
        let result = sqlx::query("UPDATE moderation_logs SET action = $2 WHERE id = $1")
            .bind(id)
            .bind(action)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!(error = ?e, id = %id, "Failed to update moderation log action");
                StorageError::QueryFailed { source: e }
            })?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                details: format!("moderation log {}", id),
            });
        }
        Ok(())
    }
}

/// In-memory log storage for development and tests.
#[derive(Default)]
pub struct InMemoryModerationLogStorage {
    logs: tokio::sync::RwLock<HashMap<String, ModerationLog>>,
}

impl InMemoryModerationLogStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted entries; used by tests asserting that
    /// simulation writes nothing.
    pub async fn len(&self) -> usize {
        self.logs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ModerationLogStorage for InMemoryModerationLogStorage {
    async fn create_log(&self, entry: &ModerationLog) -> StorageResult<()> {
        if entry.is_simulated() {
            return Err(StorageError::InvalidInput {
                details: "refusing to persist a simulated log entry".to_string(),
            });
        }
        self.logs
            .write()
            .await
            .insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    async fn get_log(&self, id: &str) -> StorageResult<Option<ModerationLog>> {
        Ok(self.logs.read().await.get(id).cloned())
    }

    async fn list_by_channel(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<ModerationLog>> {
        let logs = self.logs.read().await;
        let mut entries: Vec<ModerationLog> = logs
            .values()
            .filter(|log| log.channel_id == channel_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn set_action(&self, id: &str, action: &str) -> StorageResult<()> {
        let mut logs = self.logs.write().await;
        match logs.get_mut(id) {
            Some(entry) => {
                entry.action = action.to_string();
                Ok(())
            }
            None => Err(StorageError::NotFound {
                details: format!("moderation log {}", id),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_ids_are_prefixed() {
        let real = ModerationLog::new("base", "like", "ok", 1, "alice", None, false);
        let simulated = ModerationLog::new("base", "like", "ok", 1, "alice", None, true);

        assert!(!real.is_simulated());
        assert!(simulated.is_simulated());
        assert!(simulated.id.starts_with("sim_"));
    }

    #[tokio::test]
    async fn simulated_entries_are_rejected_by_storage() {
        let storage = InMemoryModerationLogStorage::new();
        let simulated = ModerationLog::new("base", "like", "ok", 1, "alice", None, true);

        assert!(storage.create_log(&simulated).await.is_err());
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn manual_override_flips_action() {
        let storage = InMemoryModerationLogStorage::new();
        let entry = ModerationLog::new(
            "base",
            "hideQuietly",
            "no rules configured",
            1,
            "alice",
            Some("0xcast"),
            false,
        );
        storage.create_log(&entry).await.unwrap();

        storage.set_action(&entry.id, "like").await.unwrap();
        let updated = storage.get_log(&entry.id).await.unwrap().unwrap();
        assert_eq!(updated.action, "like");

        // Everything else is untouched.
        assert_eq!(updated.reason, "no rules configured");
        assert_eq!(updated.cast_hash.as_deref(), Some("0xcast"));
    }

    #[tokio::test]
    async fn list_by_channel_filters_and_limits() {
        let storage = InMemoryModerationLogStorage::new();
        for i in 0..5 {
            let entry =
                ModerationLog::new("base", "like", "ok", i, &format!("user{}", i), None, false);
            storage.create_log(&entry).await.unwrap();
        }
        let other = ModerationLog::new("other", "ban", "spam", 9, "mallory", None, false);
        storage.create_log(&other).await.unwrap();

        let listed = storage.list_by_channel("base", 3).await.unwrap();
        assert_eq!(listed.len(), 3);
        assert!(listed.iter().all(|log| log.channel_id == "base"));
    }
}
