//! Third-party reputation service interfaces.
//!
//! Each service is exposed as its own narrow trait so checks depend only on
//! the single lookup they need. Network failures inside an implementation
//! surface as errors and are interpreted by the calling check.

use anyhow::Result;
use async_trait::async_trait;

/// Airstack social capital scores.
#[async_trait]
pub trait AirstackProvider: Send + Sync {
    /// The user's social capital rank; lower is better.
    async fn social_capital_rank(&self, fid: i64) -> Result<u64>;
}

/// OpenRank graph reputation scores.
#[async_trait]
pub trait OpenRankProvider: Send + Sync {
    /// The user's global engagement rank; lower is better.
    async fn global_engagement_rank(&self, fid: i64) -> Result<u64>;
}

/// Outcome of a bot-detection classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotClassification {
    Human,
    Bot,
    /// The service has not finished analyzing this account. Callers must
    /// treat this as a transient state, not a verdict.
    Analyzing,
}

#[async_trait]
pub trait BotDetectionProvider: Send + Sync {
    async fn classify(&self, fid: i64) -> Result<BotClassification>;
}

/// Icebreaker verifiable credentials.
#[async_trait]
pub trait IcebreakerProvider: Send + Sync {
    async fn has_credential(&self, fid: i64, credential: &str) -> Result<bool>;
}

/// Paragraph newsletter subscriptions.
#[async_trait]
pub trait ParagraphProvider: Send + Sync {
    async fn is_subscriber(&self, fid: i64, publication_url: &str) -> Result<bool>;
}

/// Moxie fan token balances.
#[async_trait]
pub trait MoxieProvider: Send + Sync {
    /// Balance of the given fan token held by the user, in whole tokens.
    async fn fan_token_balance(&self, fid: i64, fan_token: &str) -> Result<f64>;
}
