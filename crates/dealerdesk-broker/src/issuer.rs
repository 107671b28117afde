//! Presigned grant issuance.
//!
//! Grants are created fresh for every request and never cached.

use crate::error::BrokerError;
use dealerdesk_auth::{PresignRequest, Presigner, SigningError};
use dealerdesk_common::{ContentType, ObjectKey, Operation, StorageConfig};
use std::collections::BTreeMap;
use std::time::Duration;

/// Lifetime of every grant
pub const GRANT_TTL: Duration = Duration::from_secs(60);

/// A validated storage location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub bucket: String,
    pub key: ObjectKey,
}

/// Short-lived permission for one storage operation
#[derive(Debug, Clone)]
pub struct SignedGrant {
    pub url: String,
    pub expires_in_seconds: u64,
    pub method: &'static str,
    /// Headers that were signed and must be replayed byte-for-byte
    pub required_headers: BTreeMap<String, String>,
}

/// Turns resolved targets into presigned URLs
#[derive(Debug)]
pub struct CredentialIssuer {
    presigner: Presigner,
    ttl: Duration,
}

impl CredentialIssuer {
    /// Build an issuer from loaded storage credentials
    pub fn from_config(config: StorageConfig) -> Result<Self, SigningError> {
        let StorageConfig {
            endpoint,
            region,
            access_key_id,
            secret_access_key,
        } = config;
        Ok(Self::new(Presigner::new(
            endpoint,
            region,
            access_key_id,
            secret_access_key,
        )?))
    }

    #[must_use]
    pub const fn new(presigner: Presigner) -> Self {
        Self {
            presigner,
            ttl: GRANT_TTL,
        }
    }

    /// Issue a grant for `operation` on `target`.
    ///
    /// Writes must declare a content type; it is signed into the URL.
    pub fn issue(
        &self,
        target: &ResolvedTarget,
        operation: Operation,
        content_type: Option<&ContentType>,
    ) -> Result<SignedGrant, BrokerError> {
        let key = target.key.as_str();
        let (request, required_headers) = match operation {
            Operation::Read => (
                PresignRequest::get(&target.bucket, key, self.ttl),
                BTreeMap::new(),
            ),
            Operation::Write => {
                let content_type = content_type.ok_or_else(|| {
                    BrokerError::InvalidRequest("missing required field 'contentType'".to_string())
                })?;
                (
                    PresignRequest::put(&target.bucket, key, content_type.as_str(), self.ttl),
                    BTreeMap::from([(
                        "Content-Type".to_string(),
                        content_type.as_str().to_string(),
                    )]),
                )
            }
        };

        let url = self.presigner.presign(&request)?;
        Ok(SignedGrant {
            url,
            expires_in_seconds: self.ttl.as_secs(),
            method: operation.http_method(),
            required_headers,
        })
    }
}
