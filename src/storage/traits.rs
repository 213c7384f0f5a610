//! Common storage abstractions.

use crate::errors::StorageError;
use async_trait::async_trait;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Health monitoring for storage backends.
///
/// Implementations should keep the check lightweight: `SELECT 1` for a
/// database, a no-op for in-memory stores.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn health_check(&self) -> StorageResult<()>;
}
