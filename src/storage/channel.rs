//! Moderated channel configuration storage.

use super::StorageResult;
use crate::engine::rule::RuleSet;
use crate::errors::StorageError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Per-channel moderation configuration.
///
/// Treated as an immutable snapshot for the duration of one evaluation
/// call. Editing happens through the configuration surface, which is not
/// part of this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeratedChannel {
    pub id: String,
    pub owner_fid: i64,
    #[serde(default)]
    pub owner_username: String,
    pub inclusion_rule_set: RuleSet,
    pub exclusion_rule_set: RuleSet,
    /// Usernames or fids (as strings) exempt from rule evaluation.
    #[serde(default)]
    pub exclude_usernames: Vec<String>,
    /// When set, channel cohosts bypass rule evaluation too.
    #[serde(default)]
    pub exclude_cohosts: bool,
    /// Hours of cooldown applied to an author after one of their casts is
    /// curated. Zero disables slow mode.
    #[serde(default)]
    pub slow_mode_hours: i64,
    /// Moderation enabled flag. Inactive channels are skipped at intake.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[async_trait]
pub trait ChannelStorage: Send + Sync {
    async fn find_channel(&self, id: &str) -> StorageResult<Option<ModeratedChannel>>;
}

#[async_trait]
impl<T: ChannelStorage + ?Sized> ChannelStorage for Arc<T> {
    async fn find_channel(&self, id: &str) -> StorageResult<Option<ModeratedChannel>> {
        self.as_ref().find_channel(id).await
    }
}

pub struct PostgresChannelStorage {
    pool: PgPool,
}

impl PostgresChannelStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChannelStorage for PostgresChannelStorage {
    #[instrument(skip(self), fields(db.operation = "find_channel", channel.id = %id))]
    async fn find_channel(&self, id: &str) -> StorageResult<Option<ModeratedChannel>> {
        debug!("Fetching moderated channel");

        let row = sqlx::query(
            r#"
            SELECT id, owner_fid, owner_username, inclusion_rule_set, exclusion_rule_set,
                   exclude_usernames, exclude_cohosts, slow_mode_hours, active
            FROM moderated_channels
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!(error = ?e, channel = %id, "Failed to fetch channel");
            StorageError::QueryFailed { source: e }
        })?;

        let Some(row) = row else {
            debug!("Channel not found");
            return Ok(None);
        };

        let inclusion: serde_json::Value = row.get("inclusion_rule_set");
        let exclusion: serde_json::Value = row.get("exclusion_rule_set");
        let exclude_usernames: serde_json::Value = row.get("exclude_usernames");

        let channel = ModeratedChannel {
            id: row.get("id"),
            owner_fid: row.get("owner_fid"),
            owner_username: row.get("owner_username"),
            inclusion_rule_set: serde_json::from_value(inclusion).map_err(|e| {
                StorageError::SerializationFailed {
                    details: format!("inclusion rule set for channel {}: {}", id, e),
                }
            })?,
            exclusion_rule_set: serde_json::from_value(exclusion).map_err(|e| {
                StorageError::SerializationFailed {
                    details: format!("exclusion rule set for channel {}: {}", id, e),
                }
            })?,
            exclude_usernames: serde_json::from_value(exclude_usernames).unwrap_or_default(),
            exclude_cohosts: row.get("exclude_cohosts"),
            slow_mode_hours: row.get("slow_mode_hours"),
            active: row.get("active"),
        };

        debug!("Channel found");
        Ok(Some(channel))
    }
}

#[async_trait]
impl super::Storage for PostgresChannelStorage {
    async fn health_check(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed { source: e })?;
        Ok(())
    }
}

/// In-memory channel storage for development and tests.
#[derive(Default)]
pub struct InMemoryChannelStorage {
    channels: tokio::sync::RwLock<HashMap<String, ModeratedChannel>>,
}

impl InMemoryChannelStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, channel: ModeratedChannel) {
        self.channels
            .write()
            .await
            .insert(channel.id.clone(), channel);
    }
}

#[async_trait]
impl ChannelStorage for InMemoryChannelStorage {
    async fn find_channel(&self, id: &str) -> StorageResult<Option<ModeratedChannel>> {
        Ok(self.channels.read().await.get(id).cloned())
    }
}

#[async_trait]
impl super::Storage for InMemoryChannelStorage {
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}
