//! Recursive rule tree evaluation.
//!
//! The evaluator interprets a [`Rule`] tree for one subject (channel, user,
//! optional cast) and produces a boolean verdict plus a human-readable
//! explanation. Checks are side-effect-free reads, so AND nodes fan out to
//! all children concurrently. OR nodes support two deliberately distinct
//! disciplines:
//!
//! - [`OrDiscipline::Concurrent`] evaluates every child at once and picks
//!   the first pass in child order. Used on the cast path, where checks
//!   are cheap and independent.
//! - [`OrDiscipline::ShortCircuit`] evaluates children one at a time and
//!   stops at the first pass. Used on the member-request path, where
//!   checks may be expensive (on-chain calls, third-party APIs) and an
//!   early cheap pass should spare the rest.
//!
//! Explanations are deterministic: ordering always follows the tree, never
//! completion order. Every check invocation is capped by a per-check
//! timeout so one stuck provider cannot wedge a whole evaluation.

use anyhow::Result;
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::engine::check::CheckContext;
use crate::engine::registry::{CheckRegistry, definition};
use crate::engine::rule::{LogicalOperation, Rule};
use crate::errors::CheckError;
use crate::farcaster::{Cast, FarcasterUser};
use crate::storage::ModeratedChannel;

/// Default cap on a single check invocation.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Explanation used for a LOGICAL node with no children.
pub const NO_RULES_EXPLANATION: &str = "No rules";

/// How OR nodes schedule their children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrDiscipline {
    /// All children concurrently; first pass in child order wins.
    Concurrent,
    /// One child at a time; stop at the first pass.
    ShortCircuit,
}

/// Result contract of one evaluation call. Transient: produced and
/// consumed within a single moderation decision, projected into a log
/// entry rather than persisted directly.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub passed_rule: bool,
    pub explanation: String,
    pub rule: Rule,
}

/// Recursive interpreter over rule trees.
pub struct RuleEvaluator {
    registry: Arc<CheckRegistry>,
    check_timeout: Duration,
}

impl RuleEvaluator {
    pub fn new(registry: Arc<CheckRegistry>) -> Self {
        Self {
            registry,
            check_timeout: DEFAULT_CHECK_TIMEOUT,
        }
    }

    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }

    /// Evaluates a rule tree against one subject.
    ///
    /// Errors propagate unconditionally: an unregistered check, a timed
    /// out provider, or a transient classification aborts the evaluation
    /// rather than being coerced into a boolean.
    pub fn evaluate<'a>(
        &'a self,
        channel: &'a ModeratedChannel,
        user: &'a FarcasterUser,
        cast: Option<&'a Cast>,
        rule: &'a Rule,
        discipline: OrDiscipline,
    ) -> BoxFuture<'a, Result<EvaluationResult>> {
        async move {
            match rule {
                Rule::Condition { .. } => self.evaluate_condition(channel, user, cast, rule).await,
                Rule::Logical {
                    operation,
                    conditions,
                } => {
                    if conditions.is_empty() {
                        return Ok(EvaluationResult {
                            passed_rule: false,
                            explanation: NO_RULES_EXPLANATION.to_string(),
                            rule: rule.clone(),
                        });
                    }
                    match operation {
                        LogicalOperation::And => {
                            self.all_of(channel, user, cast, rule, conditions, discipline)
                                .await
                        }
                        LogicalOperation::Or => match discipline {
                            OrDiscipline::Concurrent => {
                                self.any_concurrent(channel, user, cast, rule, conditions)
                                    .await
                            }
                            OrDiscipline::ShortCircuit => {
                                self.any_short_circuit(channel, user, cast, rule, conditions)
                                    .await
                            }
                        },
                    }
                }
            }
        }
        .boxed()
    }

    #[instrument(skip_all, fields(channel.id = %channel.id, user.fid = user.fid))]
    async fn evaluate_condition(
        &self,
        channel: &ModeratedChannel,
        user: &FarcasterUser,
        cast: Option<&Cast>,
        rule: &Rule,
    ) -> Result<EvaluationResult> {
        let Rule::Condition { check, args } = rule else {
            unreachable!("evaluate_condition called with a logical node");
        };

        let evaluator = self.registry.lookup(*check)?;
        let ctx = CheckContext {
            channel,
            user,
            cast,
            args,
        };

        let outcome = match tokio::time::timeout(self.check_timeout, evaluator.execute(&ctx)).await
        {
            Ok(outcome) => outcome?,
            Err(_) => {
                return Err(CheckError::TimedOut {
                    check: check.as_str().to_string(),
                    timeout_ms: self.check_timeout.as_millis() as u64,
                }
                .into());
            }
        };

        let inverted = definition(*check).invertable
            && args
                .get("invert")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false);
        let passed = if inverted {
            !outcome.result
        } else {
            outcome.result
        };

        debug!(check = %check, passed, inverted, "Condition evaluated");
        Ok(EvaluationResult {
            passed_rule: passed,
            explanation: outcome.message,
            rule: rule.clone(),
        })
    }

    /// AND combinator: concurrent fan-out, all children must pass.
    async fn all_of<'a>(
        &'a self,
        channel: &'a ModeratedChannel,
        user: &'a FarcasterUser,
        cast: Option<&'a Cast>,
        rule: &'a Rule,
        conditions: &'a [Rule],
        discipline: OrDiscipline,
    ) -> Result<EvaluationResult> {
        let results = join_all(
            conditions
                .iter()
                .map(|child| self.evaluate(channel, user, cast, child, discipline)),
        )
        .await;

        // Errors surface in child order, not completion order.
        let results: Vec<EvaluationResult> =
            results.into_iter().collect::<Result<Vec<_>, _>>()?;

        if let Some(failed) = results.iter().find(|result| !result.passed_rule) {
            return Ok(EvaluationResult {
                passed_rule: false,
                explanation: failed.explanation.clone(),
                rule: rule.clone(),
            });
        }

        let explanation = results
            .iter()
            .map(|result| result.explanation.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Ok(EvaluationResult {
            passed_rule: true,
            explanation,
            rule: rule.clone(),
        })
    }

    /// Concurrent OR combinator: every child at once, first pass in child
    /// order wins.
    async fn any_concurrent<'a>(
        &'a self,
        channel: &'a ModeratedChannel,
        user: &'a FarcasterUser,
        cast: Option<&'a Cast>,
        rule: &'a Rule,
        conditions: &'a [Rule],
    ) -> Result<EvaluationResult> {
        let results = join_all(conditions.iter().map(|child| {
            self.evaluate(channel, user, cast, child, OrDiscipline::Concurrent)
        }))
        .await;

        let results: Vec<EvaluationResult> =
            results.into_iter().collect::<Result<Vec<_>, _>>()?;

        if let Some(passed) = results.iter().find(|result| result.passed_rule) {
            return Ok(passed.clone());
        }

        Ok(EvaluationResult {
            passed_rule: false,
            explanation: failed_or_explanation(&results),
            rule: rule.clone(),
        })
    }

    /// Sequential OR combinator: children in order, stopping at the first
    /// pass so later (possibly expensive) checks never run.
    async fn any_short_circuit<'a>(
        &'a self,
        channel: &'a ModeratedChannel,
        user: &'a FarcasterUser,
        cast: Option<&'a Cast>,
        rule: &'a Rule,
        conditions: &'a [Rule],
    ) -> Result<EvaluationResult> {
        let mut failed = Vec::with_capacity(conditions.len());
        for child in conditions {
            let result = self
                .evaluate(channel, user, cast, child, OrDiscipline::ShortCircuit)
                .await?;
            if result.passed_rule {
                return Ok(result);
            }
            failed.push(result);
        }

        Ok(EvaluationResult {
            passed_rule: false,
            explanation: failed_or_explanation(&failed),
            rule: rule.clone(),
        })
    }
}

/// Explanation for an OR node whose children all failed: a lone child's
/// explanation verbatim, otherwise a prefixed concatenation.
fn failed_or_explanation(results: &[EvaluationResult]) -> String {
    if results.len() == 1 {
        results[0].explanation.clone()
    } else {
        format!(
            "Failed all checks: {}",
            results
                .iter()
                .map(|result| result.explanation.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}
