//! Common types used by the store backends.

use thiserror::Error;

/// Errors returned by a store backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Could not reach the backend
    #[error("Store connection error: {0}")]
    Connection(String),

    /// The backend did not answer in time
    #[error("Store operation timed out: {0}")]
    Timeout(String),

    /// The backend answered with an error
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Result of a store operation
pub type StoreResult<T> = std::result::Result<T, StoreError>;
