//! Core trait definition for rule condition checks.
//!
//! Every CONDITION node in a rule tree names a check. A check is an
//! asynchronous predicate over the evaluation subject: the channel being
//! moderated, the user under consideration, and (for cast events) the cast
//! itself. Checks are side-effect-free reads; the engine is free to run
//! them concurrently.
//!
//! # Example Implementation
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use anyhow::Result;
//! use modbot::engine::check::{Check, CheckContext, CheckOutcome};
//!
//! struct MinimumKarma;
//!
//! #[async_trait]
//! impl Check for MinimumKarma {
//!     async fn execute(&self, ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
//!         if ctx.user.follower_count >= 100 {
//!             Ok(CheckOutcome::triggered("User has enough followers"))
//!         } else {
//!             Ok(CheckOutcome::not_triggered("User has too few followers"))
//!         }
//!     }
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::engine::rule::CheckKind;
use crate::errors::RuleError;
use crate::farcaster::{Cast, FarcasterUser};
use crate::storage::ModeratedChannel;

/// Everything a check may inspect for one invocation.
///
/// `cast` is `None` on the member-request path; cast-category checks must
/// handle its absence.
pub struct CheckContext<'a> {
    pub channel: &'a ModeratedChannel,
    pub user: &'a FarcasterUser,
    pub cast: Option<&'a Cast>,
    /// The rule node's argument map, schema fixed by the named check.
    pub args: &'a Map<String, Value>,
}

/// The boolean verdict of one check plus its human-readable explanation.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub result: bool,
    pub message: String,
}

impl CheckOutcome {
    pub fn triggered(message: impl Into<String>) -> Self {
        Self {
            result: true,
            message: message.into(),
        }
    }

    pub fn not_triggered(message: impl Into<String>) -> Self {
        Self {
            result: false,
            message: message.into(),
        }
    }
}

/// An asynchronous predicate backing one check name.
///
/// Implementors must be `Send + Sync`; the evaluator shares them across
/// concurrent evaluations. Errors are interpreted by the caller: transient
/// conditions surface as [`crate::errors::CheckError::Transient`], anything
/// else is a hard check failure.
#[async_trait]
pub trait Check: Send + Sync {
    async fn execute(&self, ctx: &CheckContext<'_>) -> Result<CheckOutcome>;
}

/// Deserialize a check's argument map into its typed args struct.
///
/// Argument schemas are fixed per check name; a mismatch is a
/// configuration error on the persisted rule tree.
pub fn parse_args<T: DeserializeOwned>(
    kind: CheckKind,
    args: &Map<String, Value>,
) -> Result<T, RuleError> {
    serde_json::from_value(Value::Object(args.clone())).map_err(|e| RuleError::InvalidArgs {
        check: kind.as_str().to_string(),
        details: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct TextArgs {
        search_text: String,
        #[serde(default)]
        case_sensitive: bool,
    }

    #[test]
    fn parse_args_accepts_valid_map() {
        let mut args = Map::new();
        args.insert("searchText".to_string(), json!("gm"));

        let parsed: TextArgs = parse_args(CheckKind::ContainsText, &args).unwrap();
        assert_eq!(parsed.search_text, "gm");
        assert!(!parsed.case_sensitive);
    }

    #[test]
    fn parse_args_reports_check_name_on_mismatch() {
        let mut args = Map::new();
        args.insert("searchText".to_string(), json!(42));

        let err = parse_args::<TextArgs>(CheckKind::ContainsText, &args).unwrap_err();
        assert!(err.to_string().contains("containsText"));
    }
}
