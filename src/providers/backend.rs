//! Protocol backend that applies moderation effects.

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

/// Side-effecting operations against the Farcaster protocol.
///
/// Handlers in the action dispatcher call these to make moderation
/// decisions visible on the network. Implementations are expected to be
/// idempotent where the protocol allows it: liking or inviting twice is
/// safe, hiding an already-hidden cast is a no-op.
#[async_trait]
pub trait ModerationBackend: Send + Sync {
    /// Curate a cast into the channel feed.
    async fn like_cast(&self, cast_hash: &str) -> Result<()>;

    /// Remove a cast from the curated feed without notifying the author.
    async fn hide_cast(&self, cast_hash: &str) -> Result<()>;

    /// Restore a previously hidden cast.
    async fn unhide_cast(&self, cast_hash: &str) -> Result<()>;

    /// Invite a user to become a channel member.
    async fn invite_user(&self, channel_id: &str, fid: i64) -> Result<()>;

    /// Grant a named role to a user in the channel.
    async fn grant_role(&self, channel_id: &str, fid: i64, role: &str) -> Result<()>;

    /// Record a downvote against a cast.
    async fn record_downvote(&self, channel_id: &str, fid: i64, cast_hash: &str) -> Result<()>;

    /// Send a warning message to a user.
    async fn warn_user(&self, channel_id: &str, fid: i64, message: &str) -> Result<()>;
}

/// A backend that logs every call and applies nothing.
///
/// Used in development and as the default when no protocol credentials are
/// configured.
#[derive(Debug, Clone, Default)]
pub struct NoopModerationBackend;

impl NoopModerationBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ModerationBackend for NoopModerationBackend {
    async fn like_cast(&self, cast_hash: &str) -> Result<()> {
        debug!(cast_hash = %cast_hash, "noop backend: like_cast");
        Ok(())
    }

    async fn hide_cast(&self, cast_hash: &str) -> Result<()> {
        debug!(cast_hash = %cast_hash, "noop backend: hide_cast");
        Ok(())
    }

    async fn unhide_cast(&self, cast_hash: &str) -> Result<()> {
        debug!(cast_hash = %cast_hash, "noop backend: unhide_cast");
        Ok(())
    }

    async fn invite_user(&self, channel_id: &str, fid: i64) -> Result<()> {
        debug!(channel_id = %channel_id, fid, "noop backend: invite_user");
        Ok(())
    }

    async fn grant_role(&self, channel_id: &str, fid: i64, role: &str) -> Result<()> {
        debug!(channel_id = %channel_id, fid, role = %role, "noop backend: grant_role");
        Ok(())
    }

    async fn record_downvote(&self, channel_id: &str, fid: i64, cast_hash: &str) -> Result<()> {
        debug!(channel_id = %channel_id, fid, cast_hash = %cast_hash, "noop backend: record_downvote");
        Ok(())
    }

    async fn warn_user(&self, channel_id: &str, fid: i64, message: &str) -> Result<()> {
        debug!(channel_id = %channel_id, fid, message = %message, "noop backend: warn_user");
        Ok(())
    }
}
