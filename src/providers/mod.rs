//! Narrow interfaces to the external collaborators the engine consumes.
//!
//! Everything the moderation engine needs from the outside world comes in
//! through the traits in this module: the Farcaster social graph, on-chain
//! balance lookups, third-party reputation services, and the protocol
//! backend that applies moderation effects. Network clients implementing
//! these traits live outside the engine; the engine only sees the shapes
//! defined here, so checks stay testable with hand-built fakes.

pub mod backend;
pub mod onchain;
pub mod reputation;
pub mod social;

pub use backend::{ModerationBackend, NoopModerationBackend};
pub use onchain::{ChainProvider, TokenStandard};
pub use reputation::{
    AirstackProvider, BotClassification, BotDetectionProvider, IcebreakerProvider, MoxieProvider,
    OpenRankProvider, ParagraphProvider,
};
pub use social::SocialGraphProvider;
