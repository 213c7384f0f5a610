//! Persistence layer: traits and implementations.
//!
//! Each aggregate gets a storage trait plus a Postgres implementation and
//! an in-memory implementation. The moderation engine only ever sees the
//! traits; Postgres is assumed strongly consistent per row, and the
//! in-memory variants back development and tests.

pub mod channel;
pub mod cooldown;
pub mod moderation_log;
pub mod traits;

pub use channel::{ChannelStorage, InMemoryChannelStorage, ModeratedChannel, PostgresChannelStorage};
pub use cooldown::{Cooldown, CooldownStorage, InMemoryCooldownStorage, PostgresCooldownStorage};
pub use moderation_log::{
    InMemoryModerationLogStorage, ModerationLog, ModerationLogStorage, PostgresModerationLogStorage,
};
pub use traits::{Storage, StorageResult};
