//! Static always-true checks.
//!
//! These anchor the two trivial configurations: "curate everything" and
//! "exclude everyone except what inclusion rules admit".

use anyhow::Result;
use async_trait::async_trait;

use crate::engine::check::{Check, CheckContext, CheckOutcome};

/// Always triggers. Restricted to inclusion rule sets.
pub struct AlwaysIncludeCheck;

#[async_trait]
impl Check for AlwaysIncludeCheck {
    async fn execute(&self, _ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        Ok(CheckOutcome::triggered("Everything is included"))
    }
}

/// Always triggers. Restricted to exclusion rule sets.
pub struct AlwaysExcludeCheck;

#[async_trait]
impl Check for AlwaysExcludeCheck {
    async fn execute(&self, _ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        Ok(CheckOutcome::triggered("Everything is excluded"))
    }
}
