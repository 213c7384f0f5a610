//! Contract tests for the persisted configuration JSON: the exact field
//! names and discriminants the configuration surface writes must keep
//! deserializing, and stale configuration referencing removed checks must
//! fail fast.

use modbot::actions::Action;
use modbot::engine::rule::{CheckKind, LogicalOperation, Rule, RuleSet, RuleSetTarget};
use modbot::storage::ModeratedChannel;
use serde_json::json;

fn stored_channel_json() -> serde_json::Value {
    json!({
        "id": "memes",
        "ownerFid": 3,
        "ownerUsername": "dwr",
        "excludeUsernames": ["jtgi", "2"],
        "excludeCohosts": true,
        "slowModeHours": 1,
        "active": true,
        "inclusionRuleSet": {
            "id": "rs_inc",
            "target": "all",
            "active": true,
            "rule": {
                "name": "or",
                "type": "LOGICAL",
                "args": {},
                "operation": "OR",
                "conditions": [
                    {"name": "userHoldsPowerBadge", "type": "CONDITION", "args": {}},
                    {
                        "name": "and",
                        "type": "LOGICAL",
                        "args": {},
                        "operation": "AND",
                        "conditions": [
                            {"name": "userFollowerCount", "type": "CONDITION",
                             "args": {"min": 50}},
                            {"name": "requiresErc20", "type": "CONDITION",
                             "args": {"chainId": 8453,
                                      "contractAddress": "0xd0c3...",
                                      "minBalance": "1000"}}
                        ]
                    }
                ]
            },
            "actions": [{"type": "like"}]
        },
        "exclusionRuleSet": {
            "id": "rs_exc",
            "target": "all",
            "active": true,
            "rule": {
                "name": "or",
                "type": "LOGICAL",
                "args": {},
                "operation": "OR",
                "conditions": [
                    {"name": "containsText", "type": "CONDITION",
                     "args": {"searchText": "airdrop", "caseSensitive": false}}
                ]
            },
            "actions": [
                {"type": "hideQuietly"},
                {"type": "cooldown", "duration": 24}
            ]
        }
    })
}

#[test]
fn stored_channel_configuration_round_trips() {
    let channel: ModeratedChannel = serde_json::from_value(stored_channel_json()).unwrap();

    assert_eq!(channel.id, "memes");
    assert_eq!(channel.owner_fid, 3);
    assert!(channel.exclude_cohosts);
    assert_eq!(channel.slow_mode_hours, 1);
    assert_eq!(channel.inclusion_rule_set.target, RuleSetTarget::All);

    match &channel.inclusion_rule_set.rule {
        Rule::Logical {
            operation,
            conditions,
        } => {
            assert_eq!(*operation, LogicalOperation::Or);
            assert_eq!(conditions.len(), 2);
            match &conditions[1] {
                Rule::Logical { operation, .. } => {
                    assert_eq!(*operation, LogicalOperation::And)
                }
                other => panic!("expected nested AND, got {:?}", other),
            }
        }
        other => panic!("expected OR root, got {:?}", other),
    }

    assert_eq!(
        channel.exclusion_rule_set.actions,
        vec![Action::HideQuietly, Action::Cooldown { duration: 24 }]
    );

    // Serializing writes the identical wire shape back.
    let back = serde_json::to_value(&channel).unwrap();
    assert_eq!(
        back["inclusionRuleSet"]["rule"]["conditions"][0]["name"],
        json!("userHoldsPowerBadge")
    );
    assert_eq!(
        back["exclusionRuleSet"]["actions"],
        json!([
            {"type": "hideQuietly"},
            {"type": "cooldown", "duration": 24}
        ])
    );
}

#[test]
fn stale_configuration_with_removed_check_fails_fast() {
    let mut stored = stored_channel_json();
    stored["inclusionRuleSet"]["rule"]["conditions"][0]["name"] =
        json!("subscribesOnSuperphiz");

    let err = serde_json::from_value::<ModeratedChannel>(stored).unwrap_err();
    assert!(err.to_string().contains("subscribesOnSuperphiz"));
}

#[test]
fn condition_args_survive_unknown_keys() {
    // Forward compatibility: extra argument keys are preserved, not
    // rejected, since check arg schemas are owned by the checks.
    let rule: Rule = serde_json::from_value(json!({
        "name": "containsText",
        "type": "CONDITION",
        "args": {"searchText": "gm", "addedInFutureVersion": true}
    }))
    .unwrap();

    match rule {
        Rule::Condition { check, args } => {
            assert_eq!(check, CheckKind::ContainsText);
            assert!(args.contains_key("addedInFutureVersion"));
        }
        other => panic!("expected condition, got {:?}", other),
    }
}

#[test]
fn every_catalog_check_deserializes_by_name() {
    for kind in CheckKind::ALL {
        let rule: Rule = serde_json::from_value(json!({
            "name": kind.as_str(),
            "type": "CONDITION",
            "args": {}
        }))
        .unwrap();
        match rule {
            Rule::Condition { check, .. } => assert_eq!(check, kind),
            other => panic!("expected condition, got {:?}", other),
        }
    }
}

#[test]
fn rule_set_defaults_apply() {
    let rule_set: RuleSet = serde_json::from_value(json!({
        "id": "rs",
        "rule": {
            "name": "or", "type": "LOGICAL", "args": {},
            "operation": "OR", "conditions": []
        }
    }))
    .unwrap();

    assert_eq!(rule_set.target, RuleSetTarget::All);
    assert!(rule_set.active);
    assert!(rule_set.actions.is_empty());
    assert!(!rule_set.has_conditions());
}
