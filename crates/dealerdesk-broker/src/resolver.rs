//! Logical to concrete bucket mapping.

use crate::error::BrokerError;
use dealerdesk_common::{BucketConfig, LogicalBucket, Operation};

/// Maps `public` / `private` onto configured bucket names and enforces
/// which operations each logical bucket permits.
#[derive(Debug, Clone, Default)]
pub struct BucketResolver {
    buckets: BucketConfig,
}

impl BucketResolver {
    #[must_use]
    pub const fn new(buckets: BucketConfig) -> Self {
        Self { buckets }
    }

    /// Concrete bucket for `operation` on `logical`.
    ///
    /// # Errors
    /// `InvalidRequest` if the logical bucket does not permit the operation,
    /// `Misconfigured` if no concrete bucket is configured for it.
    pub fn resolve(&self, logical: LogicalBucket, operation: Operation) -> Result<&str, BrokerError> {
        if !logical.allows(operation) {
            return Err(BrokerError::InvalidRequest(format!(
                "invalid bucket: {operation} is not permitted on '{logical}'"
            )));
        }
        self.buckets.get(logical).ok_or_else(|| {
            BrokerError::Misconfigured(format!(
                "no bucket configured for '{logical}' (set {})",
                BucketConfig::variable(logical)
            ))
        })
    }
}
