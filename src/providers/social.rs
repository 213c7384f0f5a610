//! Social graph provider interface.

use anyhow::Result;
use async_trait::async_trait;

use crate::farcaster::FarcasterUser;

/// Read access to the Farcaster social graph.
///
/// Implementations wrap a hub or indexer API. All methods are read-only;
/// failures are surfaced as errors and interpreted per-check.
#[async_trait]
pub trait SocialGraphProvider: Send + Sync {
    /// Fetch a user's profile by fid.
    async fn get_user(&self, fid: i64) -> Result<FarcasterUser>;

    /// Whether `follower_fid` follows `target_fid`.
    async fn is_following(&self, follower_fid: i64, target_fid: i64) -> Result<bool>;

    /// Whether the user is a member of the channel.
    async fn is_channel_member(&self, channel_id: &str, fid: i64) -> Result<bool>;

    /// Whether the user has co-moderation rights on the channel.
    async fn is_cohost(&self, channel_id: &str, fid: i64) -> Result<bool>;
}
