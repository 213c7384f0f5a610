//! Social graph checks over the user under evaluation.
//!
//! Profile-shaped checks read the user snapshot directly; relationship
//! checks go through the [`SocialGraphProvider`].

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::engine::check::{Check, CheckContext, CheckOutcome, parse_args};
use crate::engine::rule::CheckKind;
use crate::errors::CheckError;
use crate::providers::SocialGraphProvider;

/// `userProfileContainsText { searchText }` — case-insensitive bio search.
pub struct UserProfileContainsTextCheck;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileTextArgs {
    search_text: String,
}

#[async_trait]
impl Check for UserProfileContainsTextCheck {
    async fn execute(&self, ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        let args: ProfileTextArgs = parse_args(CheckKind::UserProfileContainsText, ctx.args)?;
        let found = ctx
            .user
            .bio
            .to_lowercase()
            .contains(&args.search_text.to_lowercase());
        if found {
            Ok(CheckOutcome::triggered(format!(
                "User bio contains \"{}\"",
                args.search_text
            )))
        } else {
            Ok(CheckOutcome::not_triggered(format!(
                "User bio does not contain \"{}\"",
                args.search_text
            )))
        }
    }
}

/// `userDisplayNameContainsText { searchText }`
pub struct UserDisplayNameContainsTextCheck;

#[async_trait]
impl Check for UserDisplayNameContainsTextCheck {
    async fn execute(&self, ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        let args: ProfileTextArgs = parse_args(CheckKind::UserDisplayNameContainsText, ctx.args)?;
        let found = ctx
            .user
            .display_name
            .to_lowercase()
            .contains(&args.search_text.to_lowercase());
        if found {
            Ok(CheckOutcome::triggered(format!(
                "Display name contains \"{}\"",
                args.search_text
            )))
        } else {
            Ok(CheckOutcome::not_triggered(format!(
                "Display name does not contain \"{}\"",
                args.search_text
            )))
        }
    }
}

/// `userFollowerCount { min, max }`
pub struct UserFollowerCountCheck;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FollowerCountArgs {
    #[serde(default)]
    min: Option<u64>,
    #[serde(default)]
    max: Option<u64>,
}

#[async_trait]
impl Check for UserFollowerCountCheck {
    async fn execute(&self, ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        let args: FollowerCountArgs = parse_args(CheckKind::UserFollowerCount, ctx.args)?;
        let count = ctx.user.follower_count;

        if let Some(min) = args.min {
            if count < min {
                return Ok(CheckOutcome::not_triggered(format!(
                    "User has {} followers, fewer than the minimum of {}",
                    count, min
                )));
            }
        }
        if let Some(max) = args.max {
            if count > max {
                return Ok(CheckOutcome::not_triggered(format!(
                    "User has {} followers, more than the maximum of {}",
                    count, max
                )));
            }
        }
        Ok(CheckOutcome::triggered(format!(
            "User follower count of {} is within bounds",
            count
        )))
    }
}

/// `userFidInRange { minFid, maxFid }` — fid as an account-age proxy.
pub struct UserFidInRangeCheck;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FidRangeArgs {
    #[serde(default)]
    min_fid: Option<i64>,
    #[serde(default)]
    max_fid: Option<i64>,
}

#[async_trait]
impl Check for UserFidInRangeCheck {
    async fn execute(&self, ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        let args: FidRangeArgs = parse_args(CheckKind::UserFidInRange, ctx.args)?;
        let fid = ctx.user.fid;

        if let Some(min) = args.min_fid {
            if fid < min {
                return Ok(CheckOutcome::not_triggered(format!(
                    "Fid {} is below the minimum of {}",
                    fid, min
                )));
            }
        }
        if let Some(max) = args.max_fid {
            if fid > max {
                return Ok(CheckOutcome::not_triggered(format!(
                    "Fid {} is above the maximum of {}",
                    fid, max
                )));
            }
        }
        Ok(CheckOutcome::triggered(format!("Fid {} is in range", fid)))
    }
}

/// `userHoldsPowerBadge`
pub struct UserHoldsPowerBadgeCheck;

#[async_trait]
impl Check for UserHoldsPowerBadgeCheck {
    async fn execute(&self, ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        if ctx.user.power_badge {
            Ok(CheckOutcome::triggered("User holds a power badge"))
        } else {
            Ok(CheckOutcome::not_triggered(
                "User does not hold a power badge",
            ))
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FidListArgs {
    fids: Vec<i64>,
}

/// `userFollows { fids }` — triggers when the user follows any listed fid.
pub struct UserFollowsCheck {
    social: Arc<dyn SocialGraphProvider>,
}

impl UserFollowsCheck {
    pub fn new(social: Arc<dyn SocialGraphProvider>) -> Self {
        Self { social }
    }
}

#[async_trait]
impl Check for UserFollowsCheck {
    async fn execute(&self, ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        let args: FidListArgs = parse_args(CheckKind::UserFollows, ctx.args)?;
        for target in &args.fids {
            let follows = self
                .social
                .is_following(ctx.user.fid, *target)
                .await
                .map_err(|e| CheckError::ProviderFailed {
                    check: CheckKind::UserFollows.as_str().to_string(),
                    details: e.to_string(),
                })?;
            if follows {
                return Ok(CheckOutcome::triggered(format!(
                    "User follows fid {}",
                    target
                )));
            }
        }
        Ok(CheckOutcome::not_triggered(
            "User follows none of the required accounts",
        ))
    }
}

/// `userIsFollowedBy { fids }` — triggers when any listed fid follows the user.
pub struct UserIsFollowedByCheck {
    social: Arc<dyn SocialGraphProvider>,
}

impl UserIsFollowedByCheck {
    pub fn new(social: Arc<dyn SocialGraphProvider>) -> Self {
        Self { social }
    }
}

#[async_trait]
impl Check for UserIsFollowedByCheck {
    async fn execute(&self, ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        let args: FidListArgs = parse_args(CheckKind::UserIsFollowedBy, ctx.args)?;
        for follower in &args.fids {
            let follows = self
                .social
                .is_following(*follower, ctx.user.fid)
                .await
                .map_err(|e| CheckError::ProviderFailed {
                    check: CheckKind::UserIsFollowedBy.as_str().to_string(),
                    details: e.to_string(),
                })?;
            if follows {
                return Ok(CheckOutcome::triggered(format!(
                    "User is followed by fid {}",
                    follower
                )));
            }
        }
        Ok(CheckOutcome::not_triggered(
            "User is followed by none of the required accounts",
        ))
    }
}

/// `userIsChannelMember { channel }` — defaults to the channel being
/// moderated when no channel argument is given.
pub struct UserIsChannelMemberCheck {
    social: Arc<dyn SocialGraphProvider>,
}

impl UserIsChannelMemberCheck {
    pub fn new(social: Arc<dyn SocialGraphProvider>) -> Self {
        Self { social }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelMemberArgs {
    #[serde(default)]
    channel: Option<String>,
}

#[async_trait]
impl Check for UserIsChannelMemberCheck {
    async fn execute(&self, ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        let args: ChannelMemberArgs = parse_args(CheckKind::UserIsChannelMember, ctx.args)?;
        let channel_id = args.channel.as_deref().unwrap_or(&ctx.channel.id);

        let member = self
            .social
            .is_channel_member(channel_id, ctx.user.fid)
            .await
            .map_err(|e| CheckError::ProviderFailed {
                check: CheckKind::UserIsChannelMember.as_str().to_string(),
                details: e.to_string(),
            })?;

        if member {
            Ok(CheckOutcome::triggered(format!(
                "User is a member of /{}",
                channel_id
            )))
        } else {
            Ok(CheckOutcome::not_triggered(format!(
                "User is not a member of /{}",
                channel_id
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{MockSocialGraph, test_channel, test_context, test_user};
    use serde_json::{Map, json};

    fn args_of(value: serde_json::Value) -> Map<String, serde_json::Value> {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("args must be an object"),
        }
    }

    #[tokio::test]
    async fn follower_count_bounds() {
        let channel = test_channel("base");
        let mut user = test_user(10, "alice");
        user.follower_count = 250;

        let args = args_of(json!({"min": 100}));
        let ctx = test_context(&channel, &user, None, &args);
        assert!(UserFollowerCountCheck.execute(&ctx).await.unwrap().result);

        let args = args_of(json!({"min": 100, "max": 200}));
        let ctx = test_context(&channel, &user, None, &args);
        assert!(!UserFollowerCountCheck.execute(&ctx).await.unwrap().result);
    }

    #[tokio::test]
    async fn power_badge_reads_snapshot() {
        let channel = test_channel("base");
        let mut user = test_user(10, "alice");
        let args = Map::new();

        let ctx = test_context(&channel, &user, None, &args);
        assert!(!UserHoldsPowerBadgeCheck.execute(&ctx).await.unwrap().result);

        user.power_badge = true;
        let ctx = test_context(&channel, &user, None, &args);
        assert!(UserHoldsPowerBadgeCheck.execute(&ctx).await.unwrap().result);
    }

    #[tokio::test]
    async fn followed_by_queries_in_listed_order_and_short_circuits() {
        let channel = test_channel("base");
        let user = test_user(10, "alice");
        let social = Arc::new(MockSocialGraph::new());
        social.add_follow(5, 10).await;

        let check = UserIsFollowedByCheck::new(social.clone());
        let args = args_of(json!({"fids": [5, 6]}));
        let ctx = test_context(&channel, &user, None, &args);

        let outcome = check.execute(&ctx).await.unwrap();
        assert!(outcome.result);
        assert!(outcome.message.contains("5"));
        // Short-circuited before the second lookup.
        assert_eq!(social.follow_queries(), 1);
    }

    #[tokio::test]
    async fn channel_member_defaults_to_moderated_channel() {
        let channel = test_channel("base");
        let user = test_user(10, "alice");
        let social = Arc::new(MockSocialGraph::new());
        social.add_member("base", 10).await;

        let check = UserIsChannelMemberCheck::new(social);
        let args = Map::new();
        let ctx = test_context(&channel, &user, None, &args);

        let outcome = check.execute(&ctx).await.unwrap();
        assert!(outcome.result);
        assert!(outcome.message.contains("/base"));
    }

    #[tokio::test]
    async fn fid_range_bounds() {
        let channel = test_channel("base");
        let user = test_user(5000, "alice");

        let args = args_of(json!({"maxFid": 10000}));
        let ctx = test_context(&channel, &user, None, &args);
        assert!(UserFidInRangeCheck.execute(&ctx).await.unwrap().result);

        let args = args_of(json!({"maxFid": 100}));
        let ctx = test_context(&channel, &user, None, &args);
        assert!(!UserFidInRangeCheck.execute(&ctx).await.unwrap().result);
    }
}
