//! Moderation orchestration: the decision procedure over rule sets.

pub mod orchestrator;

pub use orchestrator::{ModerationEngine, ModerationOptions, ModerationOutcome};
