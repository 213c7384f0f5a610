//! Rule set validation at the configuration boundary.
//!
//! Deserialization already guarantees structural well-formedness (known
//! check names, operations on LOGICAL nodes). This module enforces the
//! registry metadata on top: category restrictions, multiplicity, and
//! fid/channel gating. Validation runs when a channel snapshot is loaded,
//! before any evaluation, so the evaluator can assume a clean tree.

use std::collections::HashMap;

use crate::engine::registry::{CheckCategory, CheckDefinition, definition};
use crate::engine::rule::{CheckKind, RuleSet};
use crate::errors::RuleError;
use crate::storage::ModeratedChannel;

/// Which rule set a tree belongs to, for category enforcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSetKind {
    Inclusion,
    Exclusion,
}

impl RuleSetKind {
    fn as_str(&self) -> &'static str {
        match self {
            RuleSetKind::Inclusion => "inclusion",
            RuleSetKind::Exclusion => "exclusion",
        }
    }
}

pub struct Validator;

impl Validator {
    /// Validate one rule set against the registry metadata.
    pub fn validate_rule_set(
        rule_set: &RuleSet,
        kind: RuleSetKind,
        channel_id: &str,
        owner_fid: i64,
    ) -> Result<(), RuleError> {
        let mut counts: HashMap<CheckKind, usize> = HashMap::new();
        let mut conditions = Vec::new();
        rule_set
            .rule
            .visit_conditions(&mut |check, _| conditions.push(check));

        for check in conditions {
            let def = definition(check);

            match def.category {
                CheckCategory::All | CheckCategory::Cast => {}
                CheckCategory::Inclusion if kind != RuleSetKind::Inclusion => {
                    return Err(RuleError::CategoryMismatch {
                        check: check.as_str().to_string(),
                        rule_set: kind.as_str().to_string(),
                    });
                }
                CheckCategory::Exclusion if kind != RuleSetKind::Exclusion => {
                    return Err(RuleError::CategoryMismatch {
                        check: check.as_str().to_string(),
                        rule_set: kind.as_str().to_string(),
                    });
                }
                _ => {}
            }

            Self::check_gating(&def, channel_id, owner_fid)?;

            let count = counts.entry(check).or_insert(0);
            *count += 1;
            if *count > 1 && !def.allow_multiple {
                return Err(RuleError::DuplicateCheck {
                    check: check.as_str().to_string(),
                });
            }
        }

        Ok(())
    }

    /// Enforce fid/channel allow-lists for gated checks.
    pub fn check_gating(
        def: &CheckDefinition,
        channel_id: &str,
        owner_fid: i64,
    ) -> Result<(), RuleError> {
        if let Some(fids) = def.fid_gated {
            if !fids.contains(&owner_fid) {
                return Err(RuleError::GatedCheck {
                    check: def.kind.as_str().to_string(),
                });
            }
        }
        if let Some(channels) = def.channel_gated {
            if !channels.contains(&channel_id) {
                return Err(RuleError::GatedCheck {
                    check: def.kind.as_str().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Validate both rule sets of a channel snapshot.
    pub fn validate_channel(channel: &ModeratedChannel) -> Result<(), RuleError> {
        Self::validate_rule_set(
            &channel.inclusion_rule_set,
            RuleSetKind::Inclusion,
            &channel.id,
            channel.owner_fid,
        )?;
        Self::validate_rule_set(
            &channel.exclusion_rule_set,
            RuleSetKind::Exclusion,
            &channel.id,
            channel.owner_fid,
        )
    }
}
