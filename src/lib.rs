//! # modbot
//!
//! modbot is an automated moderation and curation engine for Farcaster
//! channels. Channel owners configure boolean rule trees over an
//! extensible set of asynchronous checks (content patterns, social graph,
//! token ownership, third-party reputation); the engine evaluates incoming
//! casts and join requests against those rules and drives a side-effecting
//! action pipeline (curate, hide, invite, ban, cooldown) with an
//! append-only audit log.
//!
//! ## Architecture Overview
//!
//! The service is built around four core components:
//!
//! ### Check Registry
//! - A closed table mapping rule names to asynchronous predicate checks
//! - Each check carries metadata: category, multiplicity, inversion, gating
//! - Adding a check is a code change, not configuration
//!
//! ### Rule Tree Evaluator
//! - Recursive interpreter over CONDITION/LOGICAL (AND/OR) trees
//! - AND fans out concurrently; OR supports concurrent and
//!   short-circuiting disciplines chosen per call site
//! - Deterministic, ordered explanations for every verdict
//!
//! ### Action Dispatcher
//! - Maps declarative action values to protocol and storage effects
//! - Per-action error isolation with idempotent handlers where feasible
//!
//! ### Moderation Orchestrator
//! - The bypass -> cooldown -> exclusion -> inclusion decision procedure
//! - Simulation mode producing log-shaped previews with no side effects
//!
//! Events arrive through the HTTP intake (`http`/`intake` modules), which
//! deduplicates deliveries by content hash before the orchestrator runs.
//!
//! ## Example
//!
//! ```rust,ignore
//! use modbot::config::Config;
//! use modbot::engine::{CheckRegistry, RuleEvaluator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::new()?;
//!     let registry = CheckRegistry::builtin(dependencies);
//!     let evaluator = RuleEvaluator::new(std::sync::Arc::new(registry))
//!         .with_check_timeout(config.check_timeout.get());
//!     // ... wire the orchestrator and serve the intake router ...
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! All error strings use the format: `error-modbot-<domain>-<number> <message>`

/// Moderation actions and their dispatcher.
pub mod actions;

/// Service configuration loaded from environment variables.
pub mod config;

/// The rule evaluation engine: AST, checks, registry, evaluator.
pub mod engine;

pub mod errors;

/// Farcaster protocol types (casts, users).
pub mod farcaster;

/// HTTP intake surface.
pub mod http;

/// Event deduplication and fan-in to the orchestrator.
pub mod intake;

/// Metrics publishing.
pub mod metrics;

/// The top-level moderation decision procedure.
pub mod moderation;

/// Narrow interfaces to external collaborators.
pub mod providers;

/// Persistence traits and implementations.
pub mod storage;

/// Shared test fixtures and mocks.
pub mod test_helpers;

/// Rule set validation against registry metadata.
pub mod validation;
