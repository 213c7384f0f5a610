//! Event intake: deduplication and fan-in to the moderation engine.
//!
//! Upstream webhook sources redeliver events, sometimes aggressively. The
//! intake layer owns deduplication by content key, checked before the
//! orchestrator is invoked so the engine can assume
//! single-invocation-per-subject. A duplicate is not an error; it
//! short-circuits to a no-op success. Concurrent duplicate deliveries for
//! the same key race the cache window; that window is accepted rather than
//! locked away.

use anyhow::Result;
use async_trait::async_trait;
use metrohash::MetroHash64;
use moka::future::Cache;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::farcaster::Cast;
use crate::metrics::MetricsPublisher;
use crate::moderation::{ModerationEngine, ModerationOptions, ModerationOutcome};
use crate::providers::SocialGraphProvider;
use crate::storage::ChannelStorage;

/// Default number of dedup keys kept in memory.
pub const DEFAULT_DEDUP_CAPACITY: u64 = 100_000;

/// How long a processed key suppresses redeliveries.
pub const DEFAULT_DEDUP_TTL: Duration = Duration::from_secs(60 * 60);

/// An external event the moderation engine should react to.
///
/// Cast events carry the full cast (the upstream webhook includes the
/// hydrated author); join requests carry only the fid, and the intake
/// hydrates the user through the social graph provider.
#[derive(Debug, Clone)]
pub enum ModerationEvent {
    CastCreated { channel_id: String, cast: Cast },
    MemberRequest { channel_id: String, fid: i64 },
}

impl ModerationEvent {
    pub fn channel_id(&self) -> &str {
        match self {
            ModerationEvent::CastCreated { channel_id, .. } => channel_id,
            ModerationEvent::MemberRequest { channel_id, .. } => channel_id,
        }
    }

    /// Stable content key for deduplication.
    pub fn dedup_key(&self) -> String {
        match self {
            ModerationEvent::CastCreated { channel_id, cast } => {
                content_key(&["cast", channel_id, &cast.hash])
            }
            ModerationEvent::MemberRequest { channel_id, fid } => {
                content_key(&["member", channel_id, &fid.to_string()])
            }
        }
    }
}

/// Hash event-identifying parts into a fixed-width hex key.
pub fn content_key(parts: &[&str]) -> String {
    let mut hasher = MetroHash64::default();
    for part in parts {
        part.hash(&mut hasher);
    }
    format!("{:016x}", hasher.finish())
}

/// Seen-key tracking for event deduplication.
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Records the key and reports whether this was its first appearance.
    async fn first_seen(&self, key: &str) -> Result<bool>;
}

/// Moka-backed in-memory dedup store with TTL eviction.
pub struct MemoryDedupStore {
    seen: Cache<String, ()>,
}

impl MemoryDedupStore {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            seen: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }
}

impl Default for MemoryDedupStore {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_CAPACITY, DEFAULT_DEDUP_TTL)
    }
}

#[async_trait]
impl DedupStore for MemoryDedupStore {
    async fn first_seen(&self, key: &str) -> Result<bool> {
        if self.seen.contains_key(key) {
            return Ok(false);
        }
        self.seen.insert(key.to_string(), ()).await;
        Ok(true)
    }
}

/// Result of handling one inbound event.
#[derive(Debug)]
pub enum IntakeOutcome {
    /// The event reached the orchestrator.
    Processed(ModerationOutcome),
    /// Already handled; no-op success.
    Duplicate,
    /// No moderated channel with this id.
    ChannelNotFound(String),
    /// The channel exists but moderation is switched off.
    ChannelInactive,
}

/// Receives external events and invokes the orchestrator once per event.
pub struct EventIntake {
    channels: Arc<dyn ChannelStorage>,
    engine: Arc<ModerationEngine>,
    dedup: Arc<dyn DedupStore>,
    social: Arc<dyn SocialGraphProvider>,
    metrics: Arc<dyn MetricsPublisher>,
}

impl EventIntake {
    pub fn new(
        channels: Arc<dyn ChannelStorage>,
        engine: Arc<ModerationEngine>,
        dedup: Arc<dyn DedupStore>,
        social: Arc<dyn SocialGraphProvider>,
        metrics: Arc<dyn MetricsPublisher>,
    ) -> Self {
        Self {
            channels,
            engine,
            dedup,
            social,
            metrics,
        }
    }

    #[instrument(skip(self, event, options), fields(
        channel.id = %event.channel_id(),
        simulation = options.simulation
    ))]
    pub async fn handle_event(
        &self,
        event: ModerationEvent,
        options: ModerationOptions,
    ) -> Result<IntakeOutcome> {
        let channel_id = event.channel_id().to_string();
        let Some(channel) = self.channels.find_channel(&channel_id).await? else {
            debug!("No moderated channel configured");
            return Ok(IntakeOutcome::ChannelNotFound(channel_id));
        };

        if !channel.active {
            debug!("Channel moderation is inactive");
            return Ok(IntakeOutcome::ChannelInactive);
        }

        // Simulations are previews; they neither consume nor are blocked
        // by dedup slots.
        if !options.simulation {
            let key = event.dedup_key();
            if !self.dedup.first_seen(&key).await? {
                info!(key = %key, "Duplicate delivery suppressed");
                self.metrics.incr("modbot.dedup_hits").await;
                return Ok(IntakeOutcome::Duplicate);
            }
        }

        let outcome = match event {
            ModerationEvent::CastCreated { cast, .. } => {
                self.engine.moderate_cast(&channel, &cast, options).await?
            }
            ModerationEvent::MemberRequest { fid, .. } => {
                let user = self.social.get_user(fid).await?;
                self.engine
                    .moderate_member_request(&channel, &user, options)
                    .await?
            }
        };

        Ok(IntakeOutcome::Processed(outcome))
    }
}
