//! The top-level moderation decision procedure.
//!
//! One evaluation call walks a fixed state machine:
//!
//! ```text
//! START -> BYPASS_CHECK -> COOLDOWN_CHECK -> EXCLUSION_CHECK -> INCLUSION_CHECK -> TERMINAL
//! ```
//!
//! Bypassed users (channel owner, explicit allow-list, optionally cohosts)
//! are approved before any rule evaluation. Exclusion is a hard veto: when
//! it matches, its actions run and inclusion is never evaluated. A channel
//! with no inclusion conditions fails closed, hiding casts by default.
//!
//! The engine is the only component that writes moderation state
//! (cooldowns via the dispatcher, audit logs directly). All collaborators
//! are injected; there is no module-level state.

use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::actions::{Action, ActionDispatcher, DispatchContext, DispatchOptions};
use crate::engine::evaluator::{OrDiscipline, RuleEvaluator};
use crate::farcaster::{Cast, FarcasterUser};
use crate::metrics::MetricsPublisher;
use crate::providers::{ModerationBackend, SocialGraphProvider};
use crate::storage::{CooldownStorage, ModeratedChannel, ModerationLog, ModerationLogStorage};
use crate::validation::Validator;

/// Per-call options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModerationOptions {
    /// Dry-run mode: evaluate rules and synthesize log-shaped results, but
    /// execute no actions and persist nothing.
    pub simulation: bool,
}

/// What one moderation call decided.
#[derive(Debug, Clone)]
pub struct ModerationOutcome {
    /// Whether the subject was approved (curated, invited, or bypassed).
    pub approved: bool,
    /// The evaluator's explanation, or the bypass/cooldown reason.
    pub explanation: String,
    /// One entry per executed (or simulated) action.
    pub logs: Vec<ModerationLog>,
}

impl ModerationOutcome {
    fn new(approved: bool, explanation: impl Into<String>, logs: Vec<ModerationLog>) -> Self {
        Self {
            approved,
            explanation: explanation.into(),
            logs,
        }
    }
}

/// Orchestrates rule evaluation and action execution for one channel.
pub struct ModerationEngine {
    evaluator: RuleEvaluator,
    dispatcher: ActionDispatcher,
    logs: Arc<dyn ModerationLogStorage>,
    cooldowns: Arc<dyn CooldownStorage>,
    social: Arc<dyn SocialGraphProvider>,
    backend: Arc<dyn ModerationBackend>,
    metrics: Arc<dyn MetricsPublisher>,
}

impl ModerationEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        evaluator: RuleEvaluator,
        dispatcher: ActionDispatcher,
        logs: Arc<dyn ModerationLogStorage>,
        cooldowns: Arc<dyn CooldownStorage>,
        social: Arc<dyn SocialGraphProvider>,
        backend: Arc<dyn ModerationBackend>,
        metrics: Arc<dyn MetricsPublisher>,
    ) -> Self {
        Self {
            evaluator,
            dispatcher,
            logs,
            cooldowns,
            social,
            backend,
            metrics,
        }
    }

    /// Moderate a new cast in the channel.
    #[instrument(skip(self, channel, cast, options), fields(
        channel.id = %channel.id,
        cast.hash = %cast.hash,
        user.fid = cast.author.fid,
        simulation = options.simulation
    ))]
    pub async fn moderate_cast(
        &self,
        channel: &ModeratedChannel,
        cast: &Cast,
        options: ModerationOptions,
    ) -> Result<ModerationOutcome> {
        let started = Instant::now();
        Validator::validate_channel(channel)?;
        self.metrics
            .incr_with_tags("modbot.evaluations", &[("path", "cast")])
            .await;

        let user = &cast.author;

        // BYPASS_CHECK
        if let Some(reason) = self.bypass_reason(channel, user).await? {
            info!(reason = %reason, "User bypasses moderation");
            let logs = self
                .execute_actions(channel, user, Some(cast), &[Action::Like], &reason, options)
                .await?;
            self.record_duration(started).await;
            return Ok(ModerationOutcome::new(true, reason, logs));
        }

        // COOLDOWN_CHECK (cast path only)
        if let Some(cooldown) = self.cooldowns.find_cooldown(user.fid, &channel.id).await? {
            if cooldown.is_in_effect(chrono::Utc::now()) {
                let reason = match cooldown.expires_at {
                    None => "User is currently muted in this channel".to_string(),
                    Some(expires_at) => {
                        format!("User is in cooldown until {}", expires_at.to_rfc3339())
                    }
                };
                debug!(reason = %reason, "Cooldown in effect, hiding cast");
                let logs = self
                    .execute_actions(
                        channel,
                        user,
                        Some(cast),
                        &[Action::HideQuietly],
                        &reason,
                        options,
                    )
                    .await?;
                self.record_duration(started).await;
                return Ok(ModerationOutcome::new(false, reason, logs));
            }
        }

        // EXCLUSION_CHECK: a matching exclusion is a hard veto.
        let exclusion = &channel.exclusion_rule_set;
        if exclusion.has_conditions() && exclusion.applies_to(cast.is_root()) {
            let result = self
                .evaluator
                .evaluate(
                    channel,
                    user,
                    Some(cast),
                    &exclusion.rule,
                    OrDiscipline::Concurrent,
                )
                .await?;
            if result.passed_rule {
                info!(explanation = %result.explanation, "Exclusion rule matched");
                let logs = self
                    .execute_actions(
                        channel,
                        user,
                        Some(cast),
                        &exclusion.actions,
                        &result.explanation,
                        options,
                    )
                    .await?;
                self.record_duration(started).await;
                return Ok(ModerationOutcome::new(false, result.explanation, logs));
            }
        }

        // INCLUSION_CHECK
        let inclusion = &channel.inclusion_rule_set;
        if !inclusion.applies_to(cast.is_root()) {
            // The configured rules do not target this cast position; leave
            // the cast alone rather than failing closed.
            let explanation = "Inclusion rules do not target this cast".to_string();
            debug!("Inclusion rule set does not apply to this cast position");
            self.record_duration(started).await;
            return Ok(ModerationOutcome::new(true, explanation, vec![]));
        }

        if !inclusion.has_conditions() {
            let reason = "No inclusion rules configured, hiding by default".to_string();
            let logs = self
                .execute_actions(
                    channel,
                    user,
                    Some(cast),
                    &[Action::HideQuietly],
                    &reason,
                    options,
                )
                .await?;
            self.record_duration(started).await;
            return Ok(ModerationOutcome::new(false, reason, logs));
        }

        let result = self
            .evaluator
            .evaluate(
                channel,
                user,
                Some(cast),
                &inclusion.rule,
                OrDiscipline::Concurrent,
            )
            .await?;

        let outcome = if result.passed_rule {
            let mut logs = self
                .execute_actions(
                    channel,
                    user,
                    Some(cast),
                    &inclusion.actions,
                    &result.explanation,
                    options,
                )
                .await?;

            // Slow mode: curating a cast starts the author's cooldown so
            // their next cast waits out the window.
            if channel.slow_mode_hours > 0 {
                let slow_mode = Action::Cooldown {
                    duration: channel.slow_mode_hours as u64,
                };
                let reason = format!("Slow mode: {} hour window", channel.slow_mode_hours);
                let slow_logs = self
                    .execute_actions(channel, user, Some(cast), &[slow_mode], &reason, options)
                    .await?;
                logs.extend(slow_logs);
            }

            ModerationOutcome::new(true, result.explanation, logs)
        } else {
            let logs = self
                .execute_actions(
                    channel,
                    user,
                    Some(cast),
                    &[Action::HideQuietly],
                    &result.explanation,
                    options,
                )
                .await?;
            ModerationOutcome::new(false, result.explanation, logs)
        };

        self.record_duration(started).await;
        Ok(outcome)
    }

    /// Moderate a request to join the channel.
    ///
    /// Same machine as the cast path minus the cooldown and target steps,
    /// with the sequential OR discipline: membership checks lean on
    /// expensive providers, so an early cheap pass spares the rest.
    #[instrument(skip(self, channel, user, options), fields(
        channel.id = %channel.id,
        user.fid = user.fid,
        simulation = options.simulation
    ))]
    pub async fn moderate_member_request(
        &self,
        channel: &ModeratedChannel,
        user: &FarcasterUser,
        options: ModerationOptions,
    ) -> Result<ModerationOutcome> {
        let started = Instant::now();
        Validator::validate_channel(channel)?;
        self.metrics
            .incr_with_tags("modbot.evaluations", &[("path", "member")])
            .await;

        // BYPASS_CHECK
        if let Some(reason) = self.bypass_reason(channel, user).await? {
            info!(reason = %reason, "User bypasses member rules");
            let logs = self
                .execute_actions(channel, user, None, &[Action::Invite], &reason, options)
                .await?;
            self.record_duration(started).await;
            return Ok(ModerationOutcome::new(true, reason, logs));
        }

        // EXCLUSION_CHECK
        let exclusion = &channel.exclusion_rule_set;
        if exclusion.has_conditions() {
            let result = self
                .evaluator
                .evaluate(channel, user, None, &exclusion.rule, OrDiscipline::ShortCircuit)
                .await?;
            if result.passed_rule {
                info!(explanation = %result.explanation, "Exclusion rule matched member request");
                let logs = self
                    .execute_actions(
                        channel,
                        user,
                        None,
                        &exclusion.actions,
                        &result.explanation,
                        options,
                    )
                    .await?;
                self.record_duration(started).await;
                return Ok(ModerationOutcome::new(false, result.explanation, logs));
            }
        }

        // INCLUSION_CHECK: nothing configured means nobody is auto-invited.
        let inclusion = &channel.inclusion_rule_set;
        if !inclusion.has_conditions() {
            let reason = "No inclusion rules configured, membership is not automatic".to_string();
            debug!("Member request denied: no inclusion rules");
            self.record_duration(started).await;
            return Ok(ModerationOutcome::new(false, reason, vec![]));
        }

        let result = self
            .evaluator
            .evaluate(channel, user, None, &inclusion.rule, OrDiscipline::ShortCircuit)
            .await?;

        let outcome = if result.passed_rule {
            let actions: Vec<Action> = if inclusion.actions.is_empty() {
                vec![Action::Invite]
            } else {
                inclusion.actions.clone()
            };
            let logs = self
                .execute_actions(channel, user, None, &actions, &result.explanation, options)
                .await?;
            ModerationOutcome::new(true, result.explanation, logs)
        } else {
            ModerationOutcome::new(false, result.explanation, vec![])
        };

        self.record_duration(started).await;
        Ok(outcome)
    }

    /// Manual override: a moderator approves a quietly hidden cast. The
    /// cast is restored on the protocol and the original log entry's
    /// action flips from `hideQuietly` to `like` (the one permitted log
    /// mutation).
    #[instrument(skip(self), fields(log.id = %log_id))]
    pub async fn approve_hidden_cast(&self, log_id: &str) -> Result<ModerationLog> {
        let entry = self
            .logs
            .get_log(log_id)
            .await?
            .ok_or_else(|| crate::errors::StorageError::NotFound {
                details: format!("moderation log {}", log_id),
            })?;

        if entry.action != "hideQuietly" {
            anyhow::bail!(
                "only hideQuietly entries can be manually approved, found {}",
                entry.action
            );
        }

        let cast_hash = entry.cast_hash.clone().ok_or_else(|| {
            anyhow::anyhow!("moderation log {} has no cast to restore", log_id)
        })?;

        self.backend.unhide_cast(&cast_hash).await?;
        self.logs.set_action(log_id, "like").await?;
        self.metrics.incr("modbot.manual_approvals").await;

        let mut updated = entry;
        updated.action = "like".to_string();
        info!(cast.hash = %cast_hash, "Hidden cast manually approved");
        Ok(updated)
    }

    /// Bypass reasons, cheapest first. None of these invoke rule checks.
    async fn bypass_reason(
        &self,
        channel: &ModeratedChannel,
        user: &FarcasterUser,
    ) -> Result<Option<String>> {
        if user.fid == channel.owner_fid
            || (!channel.owner_username.is_empty() && user.username == channel.owner_username)
        {
            return Ok(Some("User owns this channel".to_string()));
        }

        let username_lower = user.username.to_lowercase();
        let fid_string = user.fid.to_string();
        if channel
            .exclude_usernames
            .iter()
            .any(|entry| entry.to_lowercase() == username_lower || *entry == fid_string)
        {
            return Ok(Some(format!(
                "User @{} is on the bypass list",
                user.username
            )));
        }

        if channel.exclude_cohosts {
            let is_cohost = self.social.is_cohost(&channel.id, user.fid).await?;
            if is_cohost {
                return Ok(Some("User is a cohost of this channel".to_string()));
            }
        }

        Ok(None)
    }

    /// Run actions serially, in list order, producing one log entry per
    /// action. An action failure is reported and re-thrown, aborting the
    /// remaining actions; already-applied actions and already-written log
    /// entries stand.
    async fn execute_actions(
        &self,
        channel: &ModeratedChannel,
        user: &FarcasterUser,
        cast: Option<&Cast>,
        actions: &[Action],
        reason: &str,
        options: ModerationOptions,
    ) -> Result<Vec<ModerationLog>> {
        let ctx = DispatchContext {
            channel,
            user,
            cast,
        };
        let dispatch_options = DispatchOptions {
            execute_on_protocol: !options.simulation,
        };

        let mut logs = Vec::with_capacity(actions.len());
        for action in actions {
            if let Err(e) = self.dispatcher.dispatch(action, &ctx, &dispatch_options).await {
                error!(
                    error = %e,
                    action = action.name(),
                    channel.id = %channel.id,
                    "Action execution failed, aborting remaining actions"
                );
                self.metrics
                    .incr_with_tags("modbot.action_failures", &[("action", action.name())])
                    .await;
                return Err(e.into());
            }

            let entry = ModerationLog::new(
                &channel.id,
                action.name(),
                reason,
                user.fid,
                &user.username,
                cast.map(|c| c.hash.as_str()),
                options.simulation,
            );
            if !options.simulation {
                self.logs.create_log(&entry).await?;
            }
            self.metrics
                .incr_with_tags("modbot.actions", &[("action", action.name())])
                .await;
            logs.push(entry);
        }

        if options.simulation {
            warn!(
                count = logs.len(),
                "Simulation produced synthetic log entries only"
            );
        }
        Ok(logs)
    }

    async fn record_duration(&self, started: Instant) {
        self.metrics
            .time("modbot.evaluation_ms", started.elapsed().as_millis() as u64)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::registry::CheckRegistry;
    use crate::engine::rule::{CheckKind, Rule, RuleSet, RuleSetTarget};
    use crate::metrics::NoOpMetricsPublisher;
    use crate::storage::{InMemoryCooldownStorage, InMemoryModerationLogStorage};
    use crate::test_helpers::{
        MockSocialGraph, RecordingBackend, StubCheck, test_cast, test_channel, test_user,
    };
    use chrono::{Duration as ChronoDuration, Utc};

    struct Harness {
        engine: ModerationEngine,
        backend: Arc<RecordingBackend>,
        logs: Arc<InMemoryModerationLogStorage>,
        cooldowns: Arc<InMemoryCooldownStorage>,
        social: Arc<MockSocialGraph>,
    }

    fn harness(checks: Vec<(CheckKind, Arc<StubCheck>)>) -> Harness {
        let mut registry = CheckRegistry::new();
        for (kind, check) in checks {
            registry = registry.register(kind, check);
        }
        let backend = Arc::new(RecordingBackend::new());
        let logs = Arc::new(InMemoryModerationLogStorage::new());
        let cooldowns = Arc::new(InMemoryCooldownStorage::new());
        let social = Arc::new(MockSocialGraph::new());

        let engine = ModerationEngine::new(
            RuleEvaluator::new(Arc::new(registry)),
            ActionDispatcher::new(backend.clone(), cooldowns.clone()),
            logs.clone(),
            cooldowns.clone(),
            social.clone(),
            backend.clone(),
            Arc::new(NoOpMetricsPublisher::new()),
        );

        Harness {
            engine,
            backend,
            logs,
            cooldowns,
            social,
        }
    }

    fn inclusion_rule_set(rule: Rule, actions: Vec<Action>) -> RuleSet {
        RuleSet {
            rule,
            actions,
            ..RuleSet::empty("inclusion")
        }
    }

    fn exclusion_rule_set(rule: Rule, actions: Vec<Action>) -> RuleSet {
        RuleSet {
            rule,
            actions,
            ..RuleSet::empty("exclusion")
        }
    }

    #[tokio::test]
    async fn bypass_list_short_circuits_without_check_calls() {
        let badge = Arc::new(StubCheck::passing("badge"));
        let h = harness(vec![(CheckKind::UserHoldsPowerBadge, badge.clone())]);

        let mut channel = test_channel("base");
        channel.exclude_usernames = vec!["jtgi".to_string()];
        channel.inclusion_rule_set = inclusion_rule_set(
            Rule::or(vec![Rule::condition(CheckKind::UserHoldsPowerBadge)]),
            vec![Action::Like],
        );

        let user = test_user(1000, "jtgi");
        let cast = test_cast("0xcast", &user);
        let outcome = h
            .engine
            .moderate_cast(&channel, &cast, ModerationOptions::default())
            .await
            .unwrap();

        assert!(outcome.approved);
        assert!(outcome.explanation.contains("bypass list"));
        assert_eq!(outcome.logs.len(), 1);
        assert_eq!(outcome.logs[0].action, "like");
        // No rule evaluation happened at all.
        assert_eq!(badge.calls(), 0);
        assert_eq!(h.backend.calls(), vec!["like_cast:0xcast"]);
    }

    #[tokio::test]
    async fn channel_owner_bypasses_by_fid() {
        let h = harness(vec![]);
        let channel = test_channel("base");
        let user = test_user(channel.owner_fid, "someone");
        let cast = test_cast("0xcast", &user);

        let outcome = h
            .engine
            .moderate_cast(&channel, &cast, ModerationOptions::default())
            .await
            .unwrap();
        assert!(outcome.approved);
        assert!(outcome.explanation.contains("owns this channel"));
    }

    #[tokio::test]
    async fn cohost_bypass_requires_flag() {
        let h = harness(vec![]);
        let mut channel = test_channel("base");
        channel.exclude_cohosts = true;
        h.social.add_cohost("base", 77).await;

        let user = test_user(77, "cohost");
        let cast = test_cast("0xcast", &user);
        let outcome = h
            .engine
            .moderate_cast(&channel, &cast, ModerationOptions::default())
            .await
            .unwrap();
        assert!(outcome.approved);
        assert!(outcome.explanation.contains("cohost"));
    }

    #[tokio::test]
    async fn timed_cooldown_hides_with_until_message() {
        let h = harness(vec![]);
        let channel = test_channel("base");
        let user = test_user(10, "alice");
        let cast = test_cast("0xcast", &user);
        h.cooldowns
            .upsert_cooldown(10, "base", Some(Utc::now() + ChronoDuration::hours(1)))
            .await
            .unwrap();

        let outcome = h
            .engine
            .moderate_cast(&channel, &cast, ModerationOptions::default())
            .await
            .unwrap();

        assert!(!outcome.approved);
        assert!(outcome.explanation.contains("in cooldown until"));
        assert_eq!(outcome.logs[0].action, "hideQuietly");
        assert_eq!(h.backend.calls(), vec!["hide_cast:0xcast"]);
    }

    #[tokio::test]
    async fn indefinite_cooldown_reports_muted() {
        let h = harness(vec![]);
        let channel = test_channel("base");
        let user = test_user(10, "alice");
        let cast = test_cast("0xcast", &user);
        h.cooldowns.upsert_cooldown(10, "base", None).await.unwrap();

        let outcome = h
            .engine
            .moderate_cast(&channel, &cast, ModerationOptions::default())
            .await
            .unwrap();
        assert!(outcome.explanation.contains("currently muted"));
    }

    #[tokio::test]
    async fn lapsed_cooldown_is_ignored() {
        let text = Arc::new(StubCheck::passing("ok"));
        let h = harness(vec![(CheckKind::AlwaysInclude, text)]);
        let mut channel = test_channel("base");
        channel.inclusion_rule_set = inclusion_rule_set(
            Rule::or(vec![Rule::condition(CheckKind::AlwaysInclude)]),
            vec![Action::Like],
        );
        let user = test_user(10, "alice");
        let cast = test_cast("0xcast", &user);
        h.cooldowns
            .upsert_cooldown(10, "base", Some(Utc::now() - ChronoDuration::hours(1)))
            .await
            .unwrap();

        let outcome = h
            .engine
            .moderate_cast(&channel, &cast, ModerationOptions::default())
            .await
            .unwrap();
        assert!(outcome.approved);
    }

    #[tokio::test]
    async fn exclusion_match_vetoes_and_skips_inclusion() {
        let spam = Arc::new(StubCheck::passing("Cast contains the text \"spam\""));
        let badge = Arc::new(StubCheck::passing("badge"));
        let h = harness(vec![
            (CheckKind::ContainsText, spam.clone()),
            (CheckKind::UserHoldsPowerBadge, badge.clone()),
        ]);

        let mut channel = test_channel("base");
        channel.exclusion_rule_set = exclusion_rule_set(
            Rule::or(vec![Rule::condition_with_args(
                CheckKind::ContainsText,
                serde_json::json!({"searchText": "spam"}),
            )]),
            vec![Action::HideQuietly],
        );
        channel.inclusion_rule_set = inclusion_rule_set(
            Rule::or(vec![Rule::condition(CheckKind::UserHoldsPowerBadge)]),
            vec![Action::Like],
        );

        let user = test_user(10, "alice");
        let cast = test_cast("0xcast", &user);
        let outcome = h
            .engine
            .moderate_cast(&channel, &cast, ModerationOptions::default())
            .await
            .unwrap();

        assert!(!outcome.approved);
        assert_eq!(outcome.logs[0].action, "hideQuietly");
        assert_eq!(spam.calls(), 1);
        // Inclusion checks were never invoked.
        assert_eq!(badge.calls(), 0);
    }

    #[tokio::test]
    async fn empty_inclusion_rules_fail_closed() {
        let spam = Arc::new(StubCheck::failing("no spam here"));
        let h = harness(vec![(CheckKind::ContainsText, spam)]);

        let mut channel = test_channel("base");
        // Exclusion configured but not matching; inclusion empty.
        channel.exclusion_rule_set = exclusion_rule_set(
            Rule::or(vec![Rule::condition_with_args(
                CheckKind::ContainsText,
                serde_json::json!({"searchText": "spam"}),
            )]),
            vec![Action::Ban],
        );

        let user = test_user(10, "alice");
        let cast = test_cast("0xcast", &user);
        let outcome = h
            .engine
            .moderate_cast(&channel, &cast, ModerationOptions::default())
            .await
            .unwrap();

        assert!(!outcome.approved);
        assert!(outcome.explanation.contains("No inclusion rules configured"));
        assert_eq!(outcome.logs[0].action, "hideQuietly");
    }

    #[tokio::test]
    async fn inclusion_failure_hides_with_evaluator_explanation() {
        let badge = Arc::new(StubCheck::failing("User does not hold a power badge"));
        let followed = Arc::new(StubCheck::failing("User is not followed by fid 5"));
        let h = harness(vec![
            (CheckKind::UserHoldsPowerBadge, badge),
            (CheckKind::UserIsFollowedBy, followed),
        ]);

        let mut channel = test_channel("base");
        channel.inclusion_rule_set = inclusion_rule_set(
            Rule::or(vec![
                Rule::condition(CheckKind::UserHoldsPowerBadge),
                Rule::condition(CheckKind::UserIsFollowedBy),
            ]),
            vec![Action::Like],
        );

        let user = test_user(10, "alice");
        let cast = test_cast("0xcast", &user);
        let outcome = h
            .engine
            .moderate_cast(&channel, &cast, ModerationOptions::default())
            .await
            .unwrap();

        assert!(!outcome.approved);
        assert_eq!(
            outcome.explanation,
            "Failed all checks: User does not hold a power badge, User is not followed by fid 5"
        );
        assert_eq!(outcome.logs[0].action, "hideQuietly");
        assert_eq!(outcome.logs[0].reason, outcome.explanation);
    }

    #[tokio::test]
    async fn inclusion_pass_runs_actions_in_order() {
        let badge = Arc::new(StubCheck::passing("has badge"));
        let h = harness(vec![(CheckKind::UserHoldsPowerBadge, badge)]);

        let mut channel = test_channel("base");
        channel.inclusion_rule_set = inclusion_rule_set(
            Rule::or(vec![Rule::condition(CheckKind::UserHoldsPowerBadge)]),
            vec![
                Action::Like,
                Action::GrantRole {
                    role: "regular".to_string(),
                },
            ],
        );

        let user = test_user(10, "alice");
        let cast = test_cast("0xcast", &user);
        let outcome = h
            .engine
            .moderate_cast(&channel, &cast, ModerationOptions::default())
            .await
            .unwrap();

        assert!(outcome.approved);
        assert_eq!(
            h.backend.calls(),
            vec!["like_cast:0xcast", "grant_role:base:10:regular"]
        );
        assert_eq!(outcome.logs.len(), 2);
        assert_eq!(h.logs.len().await, 2);
    }

    #[tokio::test]
    async fn slow_mode_cooldown_follows_curation() {
        let badge = Arc::new(StubCheck::passing("has badge"));
        let h = harness(vec![(CheckKind::UserHoldsPowerBadge, badge)]);

        let mut channel = test_channel("base");
        channel.slow_mode_hours = 4;
        channel.inclusion_rule_set = inclusion_rule_set(
            Rule::or(vec![Rule::condition(CheckKind::UserHoldsPowerBadge)]),
            vec![Action::Like],
        );

        let user = test_user(10, "alice");
        let cast = test_cast("0xcast", &user);
        let outcome = h
            .engine
            .moderate_cast(&channel, &cast, ModerationOptions::default())
            .await
            .unwrap();

        assert!(outcome.approved);
        assert_eq!(outcome.logs.len(), 2);
        assert_eq!(outcome.logs[1].action, "cooldown");
        let cooldown = h.cooldowns.find_cooldown(10, "base").await.unwrap().unwrap();
        assert!(!cooldown.is_indefinite());
    }

    #[tokio::test]
    async fn action_failure_aborts_remaining_but_keeps_prior_logs() {
        let badge = Arc::new(StubCheck::passing("has badge"));
        let h = harness(vec![(CheckKind::UserHoldsPowerBadge, badge)]);
        h.backend.fail_on("grant_role");

        let mut channel = test_channel("base");
        channel.inclusion_rule_set = inclusion_rule_set(
            Rule::or(vec![Rule::condition(CheckKind::UserHoldsPowerBadge)]),
            vec![
                Action::Like,
                Action::GrantRole {
                    role: "regular".to_string(),
                },
                Action::Invite,
            ],
        );

        let user = test_user(10, "alice");
        let cast = test_cast("0xcast", &user);
        let err = h
            .engine
            .moderate_cast(&channel, &cast, ModerationOptions::default())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("grantRole"));
        // The like went through and its log stands; invite never ran.
        assert_eq!(h.backend.calls(), vec!["like_cast:0xcast"]);
        assert_eq!(h.logs.len().await, 1);
    }

    #[tokio::test]
    async fn simulation_matches_real_logs_without_side_effects() {
        let badge = Arc::new(StubCheck::passing("has badge"));
        let h = harness(vec![(CheckKind::UserHoldsPowerBadge, badge)]);

        let mut channel = test_channel("base");
        channel.inclusion_rule_set = inclusion_rule_set(
            Rule::or(vec![Rule::condition(CheckKind::UserHoldsPowerBadge)]),
            vec![Action::Like],
        );

        let user = test_user(10, "alice");
        let cast = test_cast("0xcast", &user);
        let simulated = h
            .engine
            .moderate_cast(
                &channel,
                &cast,
                ModerationOptions { simulation: true },
            )
            .await
            .unwrap();

        // No side effects anywhere.
        assert!(h.backend.calls().is_empty());
        assert!(h.logs.is_empty().await);
        assert!(h.cooldowns.find_cooldown(10, "base").await.unwrap().is_none());

        // Same shape as the real run, modulo the synthetic id.
        assert_eq!(simulated.logs.len(), 1);
        let entry = &simulated.logs[0];
        assert!(entry.is_simulated());
        assert_eq!(entry.action, "like");
        assert_eq!(entry.channel_id, "base");
        assert_eq!(entry.affected_user_fid, 10);
        assert_eq!(entry.cast_hash.as_deref(), Some("0xcast"));

        let real = h
            .engine
            .moderate_cast(&channel, &cast, ModerationOptions::default())
            .await
            .unwrap();
        let real_entry = &real.logs[0];
        assert_eq!(real_entry.action, entry.action);
        assert_eq!(real_entry.reason, entry.reason);
        assert_eq!(real_entry.affected_username, entry.affected_username);
    }

    #[tokio::test]
    async fn member_request_uses_short_circuit_or() {
        let cheap = Arc::new(StubCheck::passing("cheap pass"));
        let expensive = Arc::new(StubCheck::passing("expensive pass"));
        let h = harness(vec![
            (CheckKind::UserHoldsPowerBadge, cheap.clone()),
            (CheckKind::RequiresErc721, expensive.clone()),
        ]);

        let mut channel = test_channel("base");
        channel.inclusion_rule_set = inclusion_rule_set(
            Rule::or(vec![
                Rule::condition(CheckKind::UserHoldsPowerBadge),
                Rule::condition(CheckKind::RequiresErc721),
            ]),
            vec![],
        );

        let user = test_user(10, "alice");
        let outcome = h
            .engine
            .moderate_member_request(&channel, &user, ModerationOptions::default())
            .await
            .unwrap();

        assert!(outcome.approved);
        // Default inclusion action on the member path is invite.
        assert_eq!(h.backend.calls(), vec!["invite_user:base:10"]);
        assert_eq!(cheap.calls(), 1);
        assert_eq!(expensive.calls(), 0);
    }

    #[tokio::test]
    async fn member_request_denied_without_rules() {
        let h = harness(vec![]);
        let channel = test_channel("base");
        let user = test_user(10, "alice");

        let outcome = h
            .engine
            .moderate_member_request(&channel, &user, ModerationOptions::default())
            .await
            .unwrap();
        assert!(!outcome.approved);
        assert!(outcome.logs.is_empty());
        assert!(h.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn inclusion_target_mismatch_leaves_cast_alone() {
        let badge = Arc::new(StubCheck::passing("badge"));
        let h = harness(vec![(CheckKind::UserHoldsPowerBadge, badge.clone())]);

        let mut channel = test_channel("base");
        let mut rule_set = inclusion_rule_set(
            Rule::or(vec![Rule::condition(CheckKind::UserHoldsPowerBadge)]),
            vec![Action::Like],
        );
        rule_set.target = RuleSetTarget::Root;
        channel.inclusion_rule_set = rule_set;

        let user = test_user(10, "alice");
        let mut cast = test_cast("0xcast", &user);
        cast.parent_hash = Some("0xparent".to_string());

        let outcome = h
            .engine
            .moderate_cast(&channel, &cast, ModerationOptions::default())
            .await
            .unwrap();

        assert!(outcome.approved);
        assert!(outcome.logs.is_empty());
        assert_eq!(badge.calls(), 0);
        assert!(h.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn manual_approval_unhides_and_flips_log() {
        let h = harness(vec![]);
        let channel = test_channel("base");
        let user = test_user(10, "alice");
        let cast = test_cast("0xcast", &user);

        // Empty inclusion -> hideQuietly.
        let outcome = h
            .engine
            .moderate_cast(&channel, &cast, ModerationOptions::default())
            .await
            .unwrap();
        let hidden = &outcome.logs[0];
        assert_eq!(hidden.action, "hideQuietly");

        let updated = h.engine.approve_hidden_cast(&hidden.id).await.unwrap();
        assert_eq!(updated.action, "like");
        assert_eq!(
            h.backend.calls(),
            vec!["hide_cast:0xcast", "unhide_cast:0xcast"]
        );
        let stored = h.logs.get_log(&hidden.id).await.unwrap().unwrap();
        assert_eq!(stored.action, "like");
    }

    #[tokio::test]
    async fn manual_approval_rejects_non_hidden_entries() {
        let h = harness(vec![]);
        let entry = ModerationLog::new("base", "ban", "spam", 9, "mallory", None, false);
        h.logs.create_log(&entry).await.unwrap();

        let err = h.engine.approve_hidden_cast(&entry.id).await.unwrap_err();
        assert!(err.to_string().contains("hideQuietly"));
    }
}
