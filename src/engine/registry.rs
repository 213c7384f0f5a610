//! Registry mapping check names to evaluators and their metadata.
//!
//! The registry is a closed, compile-time-known table: adding a check is a
//! code change, not configuration. Metadata (category, multiplicity,
//! inversion, gating) is an exhaustive match over [`CheckKind`], so a new
//! check cannot be added without declaring it. The only runtime failure
//! left is a persisted rule tree naming a check that no longer exists,
//! which is rejected when the tree is deserialized.

use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::check::Check;
use crate::engine::checks::content::{
    CastLengthCheck, ContainsEmbedsCheck, ContainsLinksCheck, ContainsTextCheck,
    ContainsTooManyMentionsCheck, TextMatchesPatternCheck,
};
use crate::engine::checks::onchain::{RequiresErc20Check, RequiresErc721Check, RequiresErc1155Check};
use crate::engine::checks::reputation::{
    AirstackSocialCapitalRankCheck, HoldsIcebreakerCredentialCheck, HypersubSubscriberCheck,
    MoxieFanTokenBalanceCheck, OpenRankGlobalEngagementCheck, ParagraphSubscriberCheck,
    UserIsNotBotCheck,
};
use crate::engine::checks::social::{
    UserDisplayNameContainsTextCheck, UserFidInRangeCheck, UserFollowerCountCheck,
    UserFollowsCheck, UserHoldsPowerBadgeCheck, UserIsChannelMemberCheck, UserIsFollowedByCheck,
    UserProfileContainsTextCheck,
};
use crate::engine::checks::static_rules::{AlwaysExcludeCheck, AlwaysIncludeCheck};
use crate::engine::checks::webhook::WebhookCheck;
use crate::engine::rule::CheckKind;
use crate::errors::RuleError;
use crate::providers::{
    AirstackProvider, BotDetectionProvider, ChainProvider, IcebreakerProvider, MoxieProvider,
    OpenRankProvider, ParagraphProvider, SocialGraphProvider,
};

/// Which rule sets may reference a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckCategory {
    /// Usable in both inclusion and exclusion rule sets.
    All,
    /// Inclusion rule sets only.
    Inclusion,
    /// Exclusion rule sets only.
    Exclusion,
    /// Either rule set, but only meaningful when a cast is present.
    Cast,
}

/// Static metadata for one check.
#[derive(Debug, Clone)]
pub struct CheckDefinition {
    pub kind: CheckKind,
    pub category: CheckCategory,
    /// Whether one rule tree may use this check more than once.
    pub allow_multiple: bool,
    /// Whether rules may flip the result with an `invert` argument.
    pub invertable: bool,
    /// When set, only channels owned by these fids may use the check.
    pub fid_gated: Option<&'static [i64]>,
    /// When set, only these channels may use the check.
    pub channel_gated: Option<&'static [&'static str]>,
}

/// Metadata for a check. Exhaustive by construction.
pub fn definition(kind: CheckKind) -> CheckDefinition {
    let (category, allow_multiple, invertable) = match kind {
        CheckKind::AlwaysInclude => (CheckCategory::Inclusion, false, false),
        CheckKind::AlwaysExclude => (CheckCategory::Exclusion, false, false),
        CheckKind::ContainsText => (CheckCategory::Cast, true, true),
        CheckKind::TextMatchesPattern => (CheckCategory::Cast, true, true),
        CheckKind::ContainsTooManyMentions => (CheckCategory::Cast, false, false),
        CheckKind::ContainsLinks => (CheckCategory::Cast, false, true),
        CheckKind::ContainsEmbeds => (CheckCategory::Cast, true, true),
        CheckKind::CastLength => (CheckCategory::Cast, false, false),
        CheckKind::UserProfileContainsText => (CheckCategory::All, true, true),
        CheckKind::UserDisplayNameContainsText => (CheckCategory::All, true, true),
        CheckKind::UserFollowerCount => (CheckCategory::All, false, false),
        CheckKind::UserFidInRange => (CheckCategory::All, false, false),
        CheckKind::UserHoldsPowerBadge => (CheckCategory::All, false, true),
        CheckKind::UserFollows => (CheckCategory::All, true, true),
        CheckKind::UserIsFollowedBy => (CheckCategory::All, true, true),
        CheckKind::UserIsChannelMember => (CheckCategory::All, true, true),
        CheckKind::RequiresErc20 => (CheckCategory::All, true, false),
        CheckKind::RequiresErc721 => (CheckCategory::All, true, false),
        CheckKind::RequiresErc1155 => (CheckCategory::All, true, false),
        CheckKind::AirstackSocialCapitalRank => (CheckCategory::All, false, false),
        CheckKind::OpenRankGlobalEngagement => (CheckCategory::All, false, false),
        CheckKind::UserIsNotBot => (CheckCategory::All, false, false),
        CheckKind::HoldsIcebreakerCredential => (CheckCategory::All, true, false),
        CheckKind::HypersubSubscriber => (CheckCategory::All, true, false),
        CheckKind::ParagraphSubscriber => (CheckCategory::All, true, false),
        CheckKind::MoxieFanTokenBalance => (CheckCategory::All, true, false),
        CheckKind::Webhook => (CheckCategory::All, true, false),
    };

    CheckDefinition {
        kind,
        category,
        allow_multiple,
        invertable,
        fid_gated: None,
        channel_gated: None,
    }
}

/// Everything the built-in checks need from the outside world.
#[derive(Clone)]
pub struct CheckDependencies {
    pub social: Arc<dyn SocialGraphProvider>,
    pub chain: Arc<dyn ChainProvider>,
    pub airstack: Arc<dyn AirstackProvider>,
    pub openrank: Arc<dyn OpenRankProvider>,
    pub bot_detection: Arc<dyn BotDetectionProvider>,
    pub icebreaker: Arc<dyn IcebreakerProvider>,
    pub paragraph: Arc<dyn ParagraphProvider>,
    pub moxie: Arc<dyn MoxieProvider>,
    pub http_client: reqwest::Client,
}

/// Lookup table from check kind to evaluator.
///
/// Shared across concurrent evaluations behind an `Arc`; all registered
/// checks are `Send + Sync`.
pub struct CheckRegistry {
    checks: HashMap<CheckKind, Arc<dyn Check>>,
}

impl CheckRegistry {
    /// Creates an empty registry. Tests use this with hand-built checks;
    /// production wiring goes through [`CheckRegistry::builtin`].
    pub fn new() -> Self {
        Self {
            checks: HashMap::new(),
        }
    }

    /// Registers an evaluator for a check, builder-style.
    pub fn register(mut self, kind: CheckKind, check: Arc<dyn Check>) -> Self {
        self.checks.insert(kind, check);
        self
    }

    /// The full production table: all 27 checks wired to their providers.
    pub fn builtin(deps: CheckDependencies) -> Self {
        Self::new()
            .register(CheckKind::AlwaysInclude, Arc::new(AlwaysIncludeCheck))
            .register(CheckKind::AlwaysExclude, Arc::new(AlwaysExcludeCheck))
            .register(CheckKind::ContainsText, Arc::new(ContainsTextCheck))
            .register(CheckKind::TextMatchesPattern, Arc::new(TextMatchesPatternCheck))
            .register(
                CheckKind::ContainsTooManyMentions,
                Arc::new(ContainsTooManyMentionsCheck),
            )
            .register(CheckKind::ContainsLinks, Arc::new(ContainsLinksCheck))
            .register(CheckKind::ContainsEmbeds, Arc::new(ContainsEmbedsCheck))
            .register(CheckKind::CastLength, Arc::new(CastLengthCheck))
            .register(
                CheckKind::UserProfileContainsText,
                Arc::new(UserProfileContainsTextCheck),
            )
            .register(
                CheckKind::UserDisplayNameContainsText,
                Arc::new(UserDisplayNameContainsTextCheck),
            )
            .register(CheckKind::UserFollowerCount, Arc::new(UserFollowerCountCheck))
            .register(CheckKind::UserFidInRange, Arc::new(UserFidInRangeCheck))
            .register(
                CheckKind::UserHoldsPowerBadge,
                Arc::new(UserHoldsPowerBadgeCheck),
            )
            .register(
                CheckKind::UserFollows,
                Arc::new(UserFollowsCheck::new(deps.social.clone())),
            )
            .register(
                CheckKind::UserIsFollowedBy,
                Arc::new(UserIsFollowedByCheck::new(deps.social.clone())),
            )
            .register(
                CheckKind::UserIsChannelMember,
                Arc::new(UserIsChannelMemberCheck::new(deps.social.clone())),
            )
            .register(
                CheckKind::RequiresErc20,
                Arc::new(RequiresErc20Check::new(deps.chain.clone())),
            )
            .register(
                CheckKind::RequiresErc721,
                Arc::new(RequiresErc721Check::new(deps.chain.clone())),
            )
            .register(
                CheckKind::RequiresErc1155,
                Arc::new(RequiresErc1155Check::new(deps.chain.clone())),
            )
            .register(
                CheckKind::AirstackSocialCapitalRank,
                Arc::new(AirstackSocialCapitalRankCheck::new(deps.airstack)),
            )
            .register(
                CheckKind::OpenRankGlobalEngagement,
                Arc::new(OpenRankGlobalEngagementCheck::new(deps.openrank)),
            )
            .register(
                CheckKind::UserIsNotBot,
                Arc::new(UserIsNotBotCheck::new(deps.bot_detection)),
            )
            .register(
                CheckKind::HoldsIcebreakerCredential,
                Arc::new(HoldsIcebreakerCredentialCheck::new(deps.icebreaker)),
            )
            .register(
                CheckKind::HypersubSubscriber,
                Arc::new(HypersubSubscriberCheck::new(deps.chain.clone())),
            )
            .register(
                CheckKind::ParagraphSubscriber,
                Arc::new(ParagraphSubscriberCheck::new(deps.paragraph)),
            )
            .register(
                CheckKind::MoxieFanTokenBalance,
                Arc::new(MoxieFanTokenBalanceCheck::new(deps.moxie)),
            )
            .register(
                CheckKind::Webhook,
                Arc::new(WebhookCheck::new(deps.http_client)),
            )
    }

    /// Resolves the evaluator for a check. A miss means the registry was
    /// built without this check, which is a fatal configuration error
    /// equivalent to a rule referencing a removed check.
    pub fn lookup(&self, kind: CheckKind) -> Result<Arc<dyn Check>, RuleError> {
        self.checks
            .get(&kind)
            .cloned()
            .ok_or_else(|| RuleError::UnknownCheck {
                name: kind.as_str().to_string(),
            })
    }

    pub fn supports(&self, kind: CheckKind) -> bool {
        self.checks.contains_key(&kind)
    }
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::new()
    }
}
