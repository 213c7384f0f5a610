//! Rule tree data model and its persisted JSON contract.
//!
//! Rule trees are authored by the configuration surface, persisted as JSON,
//! and deserialized here before evaluation. The wire shape is a
//! compatibility contract with stored configuration:
//!
//! ```json
//! {
//!   "name": "or",
//!   "type": "LOGICAL",
//!   "args": {},
//!   "operation": "OR",
//!   "conditions": [
//!     {"name": "userHoldsPowerBadge", "type": "CONDITION", "args": {}},
//!     {"name": "containsText", "type": "CONDITION",
//!      "args": {"searchText": "gm", "caseSensitive": false}}
//!   ]
//! }
//! ```
//!
//! Internally the loose wire struct is converted into a strict recursive
//! sum type at the boundary, so the evaluator never sees a LOGICAL node
//! without an operation or a CONDITION node naming an unknown check.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::actions::Action;
use crate::errors::RuleError;

/// Identifier of a built-in check. This is a closed set: adding a check is
/// a code change, not configuration. Persisted rules referencing a name
/// outside this set fail deserialization with [`RuleError::UnknownCheck`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckKind {
    AlwaysInclude,
    AlwaysExclude,
    ContainsText,
    TextMatchesPattern,
    ContainsTooManyMentions,
    ContainsLinks,
    ContainsEmbeds,
    CastLength,
    UserProfileContainsText,
    UserDisplayNameContainsText,
    UserFollowerCount,
    UserFidInRange,
    UserHoldsPowerBadge,
    UserFollows,
    UserIsFollowedBy,
    UserIsChannelMember,
    RequiresErc20,
    RequiresErc721,
    RequiresErc1155,
    AirstackSocialCapitalRank,
    OpenRankGlobalEngagement,
    UserIsNotBot,
    HoldsIcebreakerCredential,
    HypersubSubscriber,
    ParagraphSubscriber,
    MoxieFanTokenBalance,
    Webhook,
}

impl CheckKind {
    /// Every built-in check, in registry order.
    pub const ALL: [CheckKind; 27] = [
        CheckKind::AlwaysInclude,
        CheckKind::AlwaysExclude,
        CheckKind::ContainsText,
        CheckKind::TextMatchesPattern,
        CheckKind::ContainsTooManyMentions,
        CheckKind::ContainsLinks,
        CheckKind::ContainsEmbeds,
        CheckKind::CastLength,
        CheckKind::UserProfileContainsText,
        CheckKind::UserDisplayNameContainsText,
        CheckKind::UserFollowerCount,
        CheckKind::UserFidInRange,
        CheckKind::UserHoldsPowerBadge,
        CheckKind::UserFollows,
        CheckKind::UserIsFollowedBy,
        CheckKind::UserIsChannelMember,
        CheckKind::RequiresErc20,
        CheckKind::RequiresErc721,
        CheckKind::RequiresErc1155,
        CheckKind::AirstackSocialCapitalRank,
        CheckKind::OpenRankGlobalEngagement,
        CheckKind::UserIsNotBot,
        CheckKind::HoldsIcebreakerCredential,
        CheckKind::HypersubSubscriber,
        CheckKind::ParagraphSubscriber,
        CheckKind::MoxieFanTokenBalance,
        CheckKind::Webhook,
    ];

    /// The persisted rule name for this check.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::AlwaysInclude => "alwaysInclude",
            CheckKind::AlwaysExclude => "alwaysExclude",
            CheckKind::ContainsText => "containsText",
            CheckKind::TextMatchesPattern => "textMatchesPattern",
            CheckKind::ContainsTooManyMentions => "containsTooManyMentions",
            CheckKind::ContainsLinks => "containsLinks",
            CheckKind::ContainsEmbeds => "containsEmbeds",
            CheckKind::CastLength => "castLength",
            CheckKind::UserProfileContainsText => "userProfileContainsText",
            CheckKind::UserDisplayNameContainsText => "userDisplayNameContainsText",
            CheckKind::UserFollowerCount => "userFollowerCount",
            CheckKind::UserFidInRange => "userFidInRange",
            CheckKind::UserHoldsPowerBadge => "userHoldsPowerBadge",
            CheckKind::UserFollows => "userFollows",
            CheckKind::UserIsFollowedBy => "userIsFollowedBy",
            CheckKind::UserIsChannelMember => "userIsChannelMember",
            CheckKind::RequiresErc20 => "requiresErc20",
            CheckKind::RequiresErc721 => "requiresErc721",
            CheckKind::RequiresErc1155 => "requiresErc1155",
            CheckKind::AirstackSocialCapitalRank => "airstackSocialCapitalRank",
            CheckKind::OpenRankGlobalEngagement => "openRankGlobalEngagement",
            CheckKind::UserIsNotBot => "userIsNotBot",
            CheckKind::HoldsIcebreakerCredential => "holdsIcebreakerCredential",
            CheckKind::HypersubSubscriber => "hypersubSubscriber",
            CheckKind::ParagraphSubscriber => "paragraphSubscriber",
            CheckKind::MoxieFanTokenBalance => "moxieFanTokenBalance",
            CheckKind::Webhook => "webhook",
        }
    }

    /// Resolve a persisted rule name. Returns `None` for names outside the
    /// closed set, which callers must treat as a fatal configuration error.
    pub fn from_name(name: &str) -> Option<CheckKind> {
        CheckKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == name)
    }
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical operator of a LOGICAL rule node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOperation {
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

/// A node in a boolean rule expression tree.
///
/// Trees are immutable once evaluation begins. Construction goes through
/// the wire representation (`try_from`/`into`), which enforces
/// well-formedness: every LOGICAL node has an operation and every
/// CONDITION node names a known check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRule", into = "RawRule")]
pub enum Rule {
    Condition {
        check: CheckKind,
        args: Map<String, Value>,
    },
    Logical {
        operation: LogicalOperation,
        conditions: Vec<Rule>,
    },
}

impl Rule {
    /// Convenience constructor for a CONDITION node with no arguments.
    pub fn condition(check: CheckKind) -> Rule {
        Rule::Condition {
            check,
            args: Map::new(),
        }
    }

    /// Convenience constructor for a CONDITION node with arguments.
    pub fn condition_with_args(check: CheckKind, args: Value) -> Rule {
        let args = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Rule::Condition { check, args }
    }

    pub fn and(conditions: Vec<Rule>) -> Rule {
        Rule::Logical {
            operation: LogicalOperation::And,
            conditions,
        }
    }

    pub fn or(conditions: Vec<Rule>) -> Rule {
        Rule::Logical {
            operation: LogicalOperation::Or,
            conditions,
        }
    }

    /// Whether this tree has anything to evaluate. A LOGICAL root with an
    /// empty conditions list is the "nothing configured" state.
    pub fn has_conditions(&self) -> bool {
        match self {
            Rule::Condition { .. } => true,
            Rule::Logical { conditions, .. } => !conditions.is_empty(),
        }
    }

    /// Depth-first iteration over every CONDITION node in the tree.
    pub fn visit_conditions<'a>(&'a self, visit: &mut dyn FnMut(CheckKind, &'a Map<String, Value>)) {
        match self {
            Rule::Condition { check, args } => visit(*check, args),
            Rule::Logical { conditions, .. } => {
                for child in conditions {
                    child.visit_conditions(visit);
                }
            }
        }
    }
}

/// Wire representation of a rule node, as persisted by the configuration
/// surface. Loosely typed on purpose; converted into [`Rule`] with full
/// validation before evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawRule {
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    node_type: RawRuleType,
    #[serde(default)]
    args: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    operation: Option<LogicalOperation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    conditions: Option<Vec<RawRule>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum RawRuleType {
    #[serde(rename = "CONDITION")]
    Condition,
    #[serde(rename = "LOGICAL")]
    Logical,
}

impl TryFrom<RawRule> for Rule {
    type Error = RuleError;

    fn try_from(raw: RawRule) -> Result<Rule, RuleError> {
        match raw.node_type {
            RawRuleType::Condition => {
                let check =
                    CheckKind::from_name(&raw.name).ok_or_else(|| RuleError::UnknownCheck {
                        name: raw.name.clone(),
                    })?;
                Ok(Rule::Condition {
                    check,
                    args: raw.args,
                })
            }
            RawRuleType::Logical => {
                let operation = raw.operation.ok_or_else(|| RuleError::MalformedTree {
                    details: format!("LOGICAL node '{}' is missing an operation", raw.name),
                })?;
                let conditions = raw
                    .conditions
                    .unwrap_or_default()
                    .into_iter()
                    .map(Rule::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Rule::Logical {
                    operation,
                    conditions,
                })
            }
        }
    }
}

impl From<Rule> for RawRule {
    fn from(rule: Rule) -> RawRule {
        match rule {
            Rule::Condition { check, args } => RawRule {
                name: check.as_str().to_string(),
                node_type: RawRuleType::Condition,
                args,
                operation: None,
                conditions: None,
            },
            Rule::Logical {
                operation,
                conditions,
            } => RawRule {
                name: match operation {
                    LogicalOperation::And => "and".to_string(),
                    LogicalOperation::Or => "or".to_string(),
                },
                node_type: RawRuleType::Logical,
                args: Map::new(),
                operation: Some(operation),
                conditions: Some(conditions.into_iter().map(RawRule::from).collect()),
            },
        }
    }
}

/// Which casts a rule set applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSetTarget {
    All,
    Root,
    Reply,
}

impl Default for RuleSetTarget {
    fn default() -> Self {
        RuleSetTarget::All
    }
}

/// A rule tree plus the actions to execute when it matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub id: String,
    #[serde(default)]
    pub target: RuleSetTarget,
    #[serde(default = "default_active")]
    pub active: bool,
    pub rule: Rule,
    #[serde(default)]
    pub actions: Vec<Action>,
}

fn default_active() -> bool {
    true
}

impl RuleSet {
    /// An inert rule set: no conditions, no actions.
    pub fn empty(id: &str) -> RuleSet {
        RuleSet {
            id: id.to_string(),
            target: RuleSetTarget::All,
            active: true,
            rule: Rule::or(vec![]),
            actions: vec![],
        }
    }

    pub fn has_conditions(&self) -> bool {
        self.rule.has_conditions()
    }

    /// Whether this rule set's target covers the given cast position.
    pub fn applies_to(&self, is_root_cast: bool) -> bool {
        match self.target {
            RuleSetTarget::All => true,
            RuleSetTarget::Root => is_root_cast,
            RuleSetTarget::Reply => !is_root_cast,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn condition_round_trip_preserves_wire_shape() {
        let wire = json!({
            "name": "containsText",
            "type": "CONDITION",
            "args": {"searchText": "spam", "caseSensitive": false}
        });

        let rule: Rule = serde_json::from_value(wire.clone()).unwrap();
        match &rule {
            Rule::Condition { check, args } => {
                assert_eq!(*check, CheckKind::ContainsText);
                assert_eq!(args.get("searchText"), Some(&json!("spam")));
            }
            other => panic!("expected condition, got {:?}", other),
        }

        let back = serde_json::to_value(&rule).unwrap();
        assert_eq!(back, wire);
    }

    #[test]
    fn logical_round_trip_preserves_wire_shape() {
        let wire = json!({
            "name": "or",
            "type": "LOGICAL",
            "args": {},
            "operation": "OR",
            "conditions": [
                {"name": "userHoldsPowerBadge", "type": "CONDITION", "args": {}},
                {"name": "alwaysInclude", "type": "CONDITION", "args": {}}
            ]
        });

        let rule: Rule = serde_json::from_value(wire.clone()).unwrap();
        match &rule {
            Rule::Logical {
                operation,
                conditions,
            } => {
                assert_eq!(*operation, LogicalOperation::Or);
                assert_eq!(conditions.len(), 2);
            }
            other => panic!("expected logical, got {:?}", other),
        }

        assert_eq!(serde_json::to_value(&rule).unwrap(), wire);
    }

    #[test]
    fn unknown_check_name_fails_deserialization() {
        let wire = json!({
            "name": "holdsRareNft",
            "type": "CONDITION",
            "args": {}
        });

        let err = serde_json::from_value::<Rule>(wire).unwrap_err();
        assert!(err.to_string().contains("holdsRareNft"));
    }

    #[test]
    fn logical_without_operation_fails_deserialization() {
        let wire = json!({
            "name": "and",
            "type": "LOGICAL",
            "args": {},
            "conditions": []
        });

        let err = serde_json::from_value::<Rule>(wire).unwrap_err();
        assert!(err.to_string().contains("missing an operation"));
    }

    #[test]
    fn empty_conditions_is_well_formed_but_inert() {
        let wire = json!({
            "name": "and",
            "type": "LOGICAL",
            "args": {},
            "operation": "AND",
            "conditions": []
        });

        let rule: Rule = serde_json::from_value(wire).unwrap();
        assert!(!rule.has_conditions());
    }

    #[test]
    fn nested_tree_deserializes() {
        let wire = json!({
            "name": "and",
            "type": "LOGICAL",
            "args": {},
            "operation": "AND",
            "conditions": [
                {"name": "userFollowerCount", "type": "CONDITION", "args": {"min": 10}},
                {
                    "name": "or",
                    "type": "LOGICAL",
                    "args": {},
                    "operation": "OR",
                    "conditions": [
                        {"name": "userHoldsPowerBadge", "type": "CONDITION", "args": {}},
                        {"name": "requiresErc721", "type": "CONDITION",
                         "args": {"chainId": 8453, "contractAddress": "0xabc"}}
                    ]
                }
            ]
        });

        let rule: Rule = serde_json::from_value(wire).unwrap();
        let mut seen = Vec::new();
        rule.visit_conditions(&mut |kind, _| seen.push(kind));
        assert_eq!(
            seen,
            vec![
                CheckKind::UserFollowerCount,
                CheckKind::UserHoldsPowerBadge,
                CheckKind::RequiresErc721
            ]
        );
    }

    #[test]
    fn check_names_round_trip() {
        for kind in CheckKind::ALL {
            assert_eq!(CheckKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(CheckKind::from_name("notARealCheck"), None);
    }

    #[test]
    fn rule_set_target_applies() {
        let mut rule_set = RuleSet::empty("rs1");
        assert!(rule_set.applies_to(true));
        assert!(rule_set.applies_to(false));

        rule_set.target = RuleSetTarget::Root;
        assert!(rule_set.applies_to(true));
        assert!(!rule_set.applies_to(false));

        rule_set.target = RuleSetTarget::Reply;
        assert!(!rule_set.applies_to(true));
        assert!(rule_set.applies_to(false));
    }

    #[test]
    fn rule_set_wire_shape() {
        let wire = json!({
            "id": "rs1",
            "target": "root",
            "active": true,
            "rule": {
                "name": "or",
                "type": "LOGICAL",
                "args": {},
                "operation": "OR",
                "conditions": [
                    {"name": "alwaysInclude", "type": "CONDITION", "args": {}}
                ]
            },
            "actions": [
                {"type": "like"},
                {"type": "cooldown", "duration": 12}
            ]
        });

        let rule_set: RuleSet = serde_json::from_value(wire.clone()).unwrap();
        assert_eq!(rule_set.target, RuleSetTarget::Root);
        assert_eq!(rule_set.actions.len(), 2);
        assert_eq!(serde_json::to_value(&rule_set).unwrap(), wire);
    }
}
