//! Test fixtures and mock implementations shared across unit and
//! integration tests.

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::engine::check::{Check, CheckContext, CheckOutcome};
use crate::engine::registry::CheckDependencies;
use crate::engine::rule::RuleSet;
use crate::farcaster::{Cast, FarcasterUser};
use crate::providers::{
    AirstackProvider, BotClassification, BotDetectionProvider, ChainProvider, IcebreakerProvider,
    ModerationBackend, MoxieProvider, OpenRankProvider, ParagraphProvider, SocialGraphProvider,
    TokenStandard,
};
use crate::storage::ModeratedChannel;

/// Serializes tests that mutate process environment variables.
pub static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub fn test_user(fid: i64, username: &str) -> FarcasterUser {
    FarcasterUser {
        fid,
        username: username.to_string(),
        display_name: username.to_string(),
        bio: String::new(),
        follower_count: 0,
        power_badge: false,
        verifications: vec![],
        custody_address: String::new(),
    }
}

pub fn test_cast(hash: &str, author: &FarcasterUser) -> Cast {
    Cast {
        hash: hash.to_string(),
        author: author.clone(),
        text: "hello world".to_string(),
        parent_hash: None,
        mentions: vec![],
        embeds: vec![],
        timestamp: Utc::now(),
    }
}

pub fn test_channel(id: &str) -> ModeratedChannel {
    ModeratedChannel {
        id: id.to_string(),
        owner_fid: 1,
        owner_username: "owner".to_string(),
        inclusion_rule_set: RuleSet::empty("inclusion"),
        exclusion_rule_set: RuleSet::empty("exclusion"),
        exclude_usernames: vec![],
        exclude_cohosts: false,
        slow_mode_hours: 0,
        active: true,
    }
}

pub fn test_context<'a>(
    channel: &'a ModeratedChannel,
    user: &'a FarcasterUser,
    cast: Option<&'a Cast>,
    args: &'a Map<String, Value>,
) -> CheckContext<'a> {
    CheckContext {
        channel,
        user,
        cast,
        args,
    }
}

/// A scriptable check with a call counter and optional delay, for
/// asserting evaluation order, short-circuiting, and timeouts.
pub struct StubCheck {
    result: bool,
    message: String,
    delay_ms: u64,
    calls: AtomicUsize,
}

impl StubCheck {
    pub fn passing(message: &str) -> Self {
        Self {
            result: true,
            message: message.to_string(),
            delay_ms: 0,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: false,
            message: message.to_string(),
            delay_ms: 0,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Check for StubCheck {
    async fn execute(&self, _ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        Ok(CheckOutcome {
            result: self.result,
            message: self.message.clone(),
        })
    }
}

/// In-memory social graph with call counting on follow lookups.
#[derive(Default)]
pub struct MockSocialGraph {
    users: RwLock<HashMap<i64, FarcasterUser>>,
    follows: RwLock<HashSet<(i64, i64)>>,
    members: RwLock<HashSet<(String, i64)>>,
    cohosts: RwLock<HashSet<(String, i64)>>,
    follow_queries: AtomicUsize,
}

impl MockSocialGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user: FarcasterUser) {
        self.users.write().await.insert(user.fid, user);
    }

    pub async fn add_follow(&self, follower: i64, target: i64) {
        self.follows.write().await.insert((follower, target));
    }

    pub async fn add_member(&self, channel_id: &str, fid: i64) {
        self.members
            .write()
            .await
            .insert((channel_id.to_string(), fid));
    }

    pub async fn add_cohost(&self, channel_id: &str, fid: i64) {
        self.cohosts
            .write()
            .await
            .insert((channel_id.to_string(), fid));
    }

    pub fn follow_queries(&self) -> usize {
        self.follow_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SocialGraphProvider for MockSocialGraph {
    async fn get_user(&self, fid: i64) -> Result<FarcasterUser> {
        Ok(self
            .users
            .read()
            .await
            .get(&fid)
            .cloned()
            .unwrap_or_else(|| test_user(fid, &format!("user{}", fid))))
    }

    async fn is_following(&self, follower_fid: i64, target_fid: i64) -> Result<bool> {
        self.follow_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .follows
            .read()
            .await
            .contains(&(follower_fid, target_fid)))
    }

    async fn is_channel_member(&self, channel_id: &str, fid: i64) -> Result<bool> {
        Ok(self
            .members
            .read()
            .await
            .contains(&(channel_id.to_string(), fid)))
    }

    async fn is_cohost(&self, channel_id: &str, fid: i64) -> Result<bool> {
        Ok(self
            .cohosts
            .read()
            .await
            .contains(&(channel_id.to_string(), fid)))
    }
}

/// In-memory balance table keyed by `(chain, contract, wallet)`.
#[derive(Default)]
pub struct MockChainProvider {
    balances: RwLock<HashMap<(u64, String, String), u128>>,
}

impl MockChainProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_balance(&self, chain_id: u64, contract: &str, wallet: &str, balance: u128) {
        self.balances.write().await.insert(
            (chain_id, contract.to_string(), wallet.to_string()),
            balance,
        );
    }
}

#[async_trait]
impl ChainProvider for MockChainProvider {
    async fn balance_of(
        &self,
        chain_id: u64,
        contract_address: &str,
        wallet_address: &str,
        _standard: TokenStandard,
        _token_id: Option<&str>,
    ) -> Result<u128> {
        Ok(*self
            .balances
            .read()
            .await
            .get(&(
                chain_id,
                contract_address.to_string(),
                wallet_address.to_string(),
            ))
            .unwrap_or(&0))
    }
}

/// A fixed-rank provider serving both Airstack and OpenRank lookups.
pub struct MockRankProvider {
    rank: u64,
}

impl MockRankProvider {
    pub fn with_rank(rank: u64) -> Self {
        Self { rank }
    }
}

#[async_trait]
impl AirstackProvider for MockRankProvider {
    async fn social_capital_rank(&self, _fid: i64) -> Result<u64> {
        Ok(self.rank)
    }
}

#[async_trait]
impl OpenRankProvider for MockRankProvider {
    async fn global_engagement_rank(&self, _fid: i64) -> Result<u64> {
        Ok(self.rank)
    }
}

pub struct MockBotDetector {
    classification: BotClassification,
}

impl MockBotDetector {
    pub fn new(classification: BotClassification) -> Self {
        Self { classification }
    }
}

#[async_trait]
impl BotDetectionProvider for MockBotDetector {
    async fn classify(&self, _fid: i64) -> Result<BotClassification> {
        Ok(self.classification)
    }
}

#[derive(Default)]
pub struct MockIcebreaker {
    credentials: RwLock<HashSet<(i64, String)>>,
}

impl MockIcebreaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn grant(&self, fid: i64, credential: &str) {
        self.credentials
            .write()
            .await
            .insert((fid, credential.to_string()));
    }
}

#[async_trait]
impl IcebreakerProvider for MockIcebreaker {
    async fn has_credential(&self, fid: i64, credential: &str) -> Result<bool> {
        Ok(self
            .credentials
            .read()
            .await
            .contains(&(fid, credential.to_string())))
    }
}

#[derive(Default)]
pub struct MockParagraph {
    subscribers: RwLock<HashSet<(i64, String)>>,
}

impl MockParagraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, fid: i64, publication_url: &str) {
        self.subscribers
            .write()
            .await
            .insert((fid, publication_url.to_string()));
    }
}

#[async_trait]
impl ParagraphProvider for MockParagraph {
    async fn is_subscriber(&self, fid: i64, publication_url: &str) -> Result<bool> {
        Ok(self
            .subscribers
            .read()
            .await
            .contains(&(fid, publication_url.to_string())))
    }
}

#[derive(Default)]
pub struct MockMoxie {
    balances: RwLock<HashMap<(i64, String), f64>>,
}

impl MockMoxie {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_balance(&self, fid: i64, fan_token: &str, balance: f64) {
        self.balances
            .write()
            .await
            .insert((fid, fan_token.to_string()), balance);
    }
}

#[async_trait]
impl MoxieProvider for MockMoxie {
    async fn fan_token_balance(&self, fid: i64, fan_token: &str) -> Result<f64> {
        Ok(*self
            .balances
            .read()
            .await
            .get(&(fid, fan_token.to_string()))
            .unwrap_or(&0.0))
    }
}

/// Backend that records every call and can be scripted to fail on one
/// operation, for failure-isolation tests.
#[derive(Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<String>>,
    fail_on: Mutex<Option<String>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the named operation (e.g. `"hide_cast"`) fail.
    pub fn fail_on(&self, operation: &str) {
        *self.fail_on.lock() = Some(operation.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, operation: &str, detail: &str) -> Result<()> {
        if self.fail_on.lock().as_deref() == Some(operation) {
            bail!("scripted failure for {}", operation);
        }
        self.calls.lock().push(format!("{}:{}", operation, detail));
        Ok(())
    }
}

#[async_trait]
impl ModerationBackend for RecordingBackend {
    async fn like_cast(&self, cast_hash: &str) -> Result<()> {
        self.record("like_cast", cast_hash)
    }

    async fn hide_cast(&self, cast_hash: &str) -> Result<()> {
        self.record("hide_cast", cast_hash)
    }

    async fn unhide_cast(&self, cast_hash: &str) -> Result<()> {
        self.record("unhide_cast", cast_hash)
    }

    async fn invite_user(&self, channel_id: &str, fid: i64) -> Result<()> {
        self.record("invite_user", &format!("{}:{}", channel_id, fid))
    }

    async fn grant_role(&self, channel_id: &str, fid: i64, role: &str) -> Result<()> {
        self.record("grant_role", &format!("{}:{}:{}", channel_id, fid, role))
    }

    async fn record_downvote(&self, channel_id: &str, fid: i64, cast_hash: &str) -> Result<()> {
        self.record(
            "record_downvote",
            &format!("{}:{}:{}", channel_id, fid, cast_hash),
        )
    }

    async fn warn_user(&self, channel_id: &str, fid: i64, message: &str) -> Result<()> {
        self.record("warn_user", &format!("{}:{}:{}", channel_id, fid, message))
    }
}

/// A full set of check dependencies backed by the mocks above.
pub fn test_check_dependencies() -> CheckDependencies {
    CheckDependencies {
        social: Arc::new(MockSocialGraph::new()),
        chain: Arc::new(MockChainProvider::new()),
        airstack: Arc::new(MockRankProvider::with_rank(1)),
        openrank: Arc::new(MockRankProvider::with_rank(1)),
        bot_detection: Arc::new(MockBotDetector::new(BotClassification::Human)),
        icebreaker: Arc::new(MockIcebreaker::new()),
        paragraph: Arc::new(MockParagraph::new()),
        moxie: Arc::new(MockMoxie::new()),
        http_client: reqwest::Client::new(),
    }
}
