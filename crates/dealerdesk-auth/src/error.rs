//! Signing error types

use thiserror::Error;

/// Errors raised while producing a presigned URL
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("invalid storage endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("presigned URL expiry must be between 1 second and 7 days, got {0}s")]
    InvalidExpiry(u64),

    #[error("internal error: {0}")]
    Internal(String),
}
