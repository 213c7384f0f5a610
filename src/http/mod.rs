//! HTTP surface for event intake.
//!
//! A deliberately small Axum app: webhook endpoints that feed the intake
//! layer plus a health probe. Configuration editing, dashboards, and
//! authentication live elsewhere; this process only receives events.
//!
//! # Endpoints
//!
//! - `POST /webhooks/casts` - a new cast in a moderated channel
//! - `POST /webhooks/members` - a request to join a moderated channel
//! - `GET /health` - liveness probe
//!
//! Both webhook endpoints accept `?simulate=true` for dry-run previews.
//!
//! # Error Handling
//!
//! Rule outcomes are 200s carrying the evaluator's explanation. Transient
//! check states map to 503 so the upstream source redelivers. Everything
//! else is a 500 with a generic message; internals stay in the logs.

pub mod context;
pub mod handle_webhooks;
pub mod server;

pub use context::WebContext;
pub use server::build_router;
