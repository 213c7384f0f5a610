//! Reputation checks backed by third-party scoring services.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::engine::check::{Check, CheckContext, CheckOutcome, parse_args};
use crate::engine::rule::CheckKind;
use crate::errors::CheckError;
use crate::providers::{
    AirstackProvider, BotClassification, BotDetectionProvider, ChainProvider, IcebreakerProvider,
    MoxieProvider, OpenRankProvider, ParagraphProvider, TokenStandard,
};

fn provider_err(kind: CheckKind, e: anyhow::Error) -> CheckError {
    CheckError::ProviderFailed {
        check: kind.as_str().to_string(),
        details: e.to_string(),
    }
}

/// `airstackSocialCapitalRank { maxRank }` — lower rank is better.
pub struct AirstackSocialCapitalRankCheck {
    airstack: Arc<dyn AirstackProvider>,
}

impl AirstackSocialCapitalRankCheck {
    pub fn new(airstack: Arc<dyn AirstackProvider>) -> Self {
        Self { airstack }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MaxRankArgs {
    max_rank: u64,
}

#[async_trait]
impl Check for AirstackSocialCapitalRankCheck {
    async fn execute(&self, ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        let args: MaxRankArgs = parse_args(CheckKind::AirstackSocialCapitalRank, ctx.args)?;
        let rank = self
            .airstack
            .social_capital_rank(ctx.user.fid)
            .await
            .map_err(|e| provider_err(CheckKind::AirstackSocialCapitalRank, e))?;

        if rank <= args.max_rank {
            Ok(CheckOutcome::triggered(format!(
                "Social capital rank {} is within the top {}",
                rank, args.max_rank
            )))
        } else {
            Ok(CheckOutcome::not_triggered(format!(
                "Social capital rank {} is outside the top {}",
                rank, args.max_rank
            )))
        }
    }
}

/// `openRankGlobalEngagement { maxRank }`
pub struct OpenRankGlobalEngagementCheck {
    openrank: Arc<dyn OpenRankProvider>,
}

impl OpenRankGlobalEngagementCheck {
    pub fn new(openrank: Arc<dyn OpenRankProvider>) -> Self {
        Self { openrank }
    }
}

#[async_trait]
impl Check for OpenRankGlobalEngagementCheck {
    async fn execute(&self, ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        let args: MaxRankArgs = parse_args(CheckKind::OpenRankGlobalEngagement, ctx.args)?;
        let rank = self
            .openrank
            .global_engagement_rank(ctx.user.fid)
            .await
            .map_err(|e| provider_err(CheckKind::OpenRankGlobalEngagement, e))?;

        if rank <= args.max_rank {
            Ok(CheckOutcome::triggered(format!(
                "Engagement rank {} is within the top {}",
                rank, args.max_rank
            )))
        } else {
            Ok(CheckOutcome::not_triggered(format!(
                "Engagement rank {} is outside the top {}",
                rank, args.max_rank
            )))
        }
    }
}

/// `userIsNotBot`
///
/// A pending classification is a transient error, not a verdict; the
/// caller surfaces it for upstream redelivery.
pub struct UserIsNotBotCheck {
    detector: Arc<dyn BotDetectionProvider>,
}

impl UserIsNotBotCheck {
    pub fn new(detector: Arc<dyn BotDetectionProvider>) -> Self {
        Self { detector }
    }
}

#[async_trait]
impl Check for UserIsNotBotCheck {
    async fn execute(&self, ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        let classification = self
            .detector
            .classify(ctx.user.fid)
            .await
            .map_err(|e| provider_err(CheckKind::UserIsNotBot, e))?;

        match classification {
            BotClassification::Human => {
                Ok(CheckOutcome::triggered("Account does not look automated"))
            }
            BotClassification::Bot => {
                Ok(CheckOutcome::not_triggered("Account looks automated"))
            }
            BotClassification::Analyzing => Err(CheckError::Transient {
                check: CheckKind::UserIsNotBot.as_str().to_string(),
                details: "bot analysis still in progress".to_string(),
            }
            .into()),
        }
    }
}

/// `holdsIcebreakerCredential { credential }`
pub struct HoldsIcebreakerCredentialCheck {
    icebreaker: Arc<dyn IcebreakerProvider>,
}

impl HoldsIcebreakerCredentialCheck {
    pub fn new(icebreaker: Arc<dyn IcebreakerProvider>) -> Self {
        Self { icebreaker }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialArgs {
    credential: String,
}

#[async_trait]
impl Check for HoldsIcebreakerCredentialCheck {
    async fn execute(&self, ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        let args: CredentialArgs = parse_args(CheckKind::HoldsIcebreakerCredential, ctx.args)?;
        let held = self
            .icebreaker
            .has_credential(ctx.user.fid, &args.credential)
            .await
            .map_err(|e| provider_err(CheckKind::HoldsIcebreakerCredential, e))?;

        if held {
            Ok(CheckOutcome::triggered(format!(
                "User holds the \"{}\" credential",
                args.credential
            )))
        } else {
            Ok(CheckOutcome::not_triggered(format!(
                "User does not hold the \"{}\" credential",
                args.credential
            )))
        }
    }
}

/// `hypersubSubscriber { chainId, contractAddress }`
///
/// Hypersub subscriptions are ERC-721 balances on the subscription
/// contract, so this rides the chain provider.
pub struct HypersubSubscriberCheck {
    chain: Arc<dyn ChainProvider>,
}

impl HypersubSubscriberCheck {
    pub fn new(chain: Arc<dyn ChainProvider>) -> Self {
        Self { chain }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HypersubArgs {
    chain_id: u64,
    contract_address: String,
}

#[async_trait]
impl Check for HypersubSubscriberCheck {
    async fn execute(&self, ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        let args: HypersubArgs = parse_args(CheckKind::HypersubSubscriber, ctx.args)?;

        for wallet in ctx.user.wallet_addresses() {
            let balance = self
                .chain
                .balance_of(
                    args.chain_id,
                    &args.contract_address,
                    &wallet,
                    TokenStandard::Erc721,
                    None,
                )
                .await
                .map_err(|e| provider_err(CheckKind::HypersubSubscriber, e))?;
            if balance > 0 {
                return Ok(CheckOutcome::triggered("User has an active subscription"));
            }
        }

        Ok(CheckOutcome::not_triggered(
            "User does not have an active subscription",
        ))
    }
}

/// `paragraphSubscriber { publicationUrl }`
pub struct ParagraphSubscriberCheck {
    paragraph: Arc<dyn ParagraphProvider>,
}

impl ParagraphSubscriberCheck {
    pub fn new(paragraph: Arc<dyn ParagraphProvider>) -> Self {
        Self { paragraph }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParagraphArgs {
    publication_url: String,
}

#[async_trait]
impl Check for ParagraphSubscriberCheck {
    async fn execute(&self, ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        let args: ParagraphArgs = parse_args(CheckKind::ParagraphSubscriber, ctx.args)?;
        let subscribed = self
            .paragraph
            .is_subscriber(ctx.user.fid, &args.publication_url)
            .await
            .map_err(|e| provider_err(CheckKind::ParagraphSubscriber, e))?;

        if subscribed {
            Ok(CheckOutcome::triggered(format!(
                "User subscribes to {}",
                args.publication_url
            )))
        } else {
            Ok(CheckOutcome::not_triggered(format!(
                "User does not subscribe to {}",
                args.publication_url
            )))
        }
    }
}

/// `moxieFanTokenBalance { fanToken, minBalance }`
pub struct MoxieFanTokenBalanceCheck {
    moxie: Arc<dyn MoxieProvider>,
}

impl MoxieFanTokenBalanceCheck {
    pub fn new(moxie: Arc<dyn MoxieProvider>) -> Self {
        Self { moxie }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoxieArgs {
    fan_token: String,
    #[serde(default = "default_min_balance")]
    min_balance: f64,
}

fn default_min_balance() -> f64 {
    1.0
}

#[async_trait]
impl Check for MoxieFanTokenBalanceCheck {
    async fn execute(&self, ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        let args: MoxieArgs = parse_args(CheckKind::MoxieFanTokenBalance, ctx.args)?;
        let balance = self
            .moxie
            .fan_token_balance(ctx.user.fid, &args.fan_token)
            .await
            .map_err(|e| provider_err(CheckKind::MoxieFanTokenBalance, e))?;

        if balance >= args.min_balance {
            Ok(CheckOutcome::triggered(format!(
                "User holds {} of fan token {}",
                balance, args.fan_token
            )))
        } else {
            Ok(CheckOutcome::not_triggered(format!(
                "User holds {} of fan token {}, below the required {}",
                balance, args.fan_token, args.min_balance
            )))
        }
    }
}
