//! Broker REST API JSON types.
//!
//! Request bodies arrive as untrusted JSON. Every field is optional at the
//! serde layer so a missing field is reported by name; each one then goes
//! through its own validator before anything else sees it.

use crate::error::BrokerError;
use dealerdesk_common::{
    ContentType, Extension, KeyPrefix, LogicalBucket, ObjectKey, PathError, sanitize_extension,
    sanitize_key, sanitize_prefix,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---- Upload ----

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub bucket: Option<String>,
    pub content_type: Option<String>,
    pub extension: Option<String>,
    pub path_prefix: Option<String>,
}

/// An upload request that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadParams {
    pub bucket: LogicalBucket,
    pub content_type: ContentType,
    pub extension: Extension,
    pub prefix: KeyPrefix,
}

impl UploadRequest {
    /// Validate every field
    pub fn validate(self) -> Result<UploadParams, BrokerError> {
        let bucket = parse_bucket(self.bucket.as_deref())?;
        let content_type =
            ContentType::parse(required(self.content_type.as_deref(), "contentType")?)
                .map_err(|e| invalid("contentType", &e))?;
        let extension = sanitize_extension(required(self.extension.as_deref(), "extension")?)
            .map_err(|e| invalid("extension", &e))?;
        let prefix = sanitize_prefix(required(self.path_prefix.as_deref(), "pathPrefix")?)
            .map_err(|e| invalid("pathPrefix", &e))?;

        Ok(UploadParams {
            bucket,
            content_type,
            extension,
            prefix,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadGrantResponse {
    /// Presigned PUT URL
    pub url: String,
    /// Object key the upload will land at
    pub key: String,
    pub method: String,
    /// Headers the PUT must carry exactly as given
    pub headers: BTreeMap<String, String>,
}

// ---- Download ----

#[derive(Debug, Default, Deserialize)]
pub struct DownloadRequest {
    pub bucket: Option<String>,
    pub key: Option<String>,
}

/// A download request that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadParams {
    pub bucket: LogicalBucket,
    pub key: ObjectKey,
}

impl DownloadRequest {
    /// Validate every field
    pub fn validate(self) -> Result<DownloadParams, BrokerError> {
        let bucket = parse_bucket(self.bucket.as_deref())?;
        let key =
            sanitize_key(required(self.key.as_deref(), "key")?).map_err(|e| invalid("key", &e))?;
        Ok(DownloadParams { bucket, key })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DownloadGrantResponse {
    /// Presigned GET URL
    pub url: String,
}

// ---- Health ----

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Token verifier has been initialized
    pub identity_ready: bool,
    /// Storage signer has been initialized
    pub storage_ready: bool,
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, BrokerError> {
    value.ok_or_else(|| BrokerError::InvalidRequest(format!("missing required field '{field}'")))
}

fn invalid(field: &str, err: &PathError) -> BrokerError {
    BrokerError::InvalidRequest(format!("invalid {field}: {err}"))
}

fn parse_bucket(value: Option<&str>) -> Result<LogicalBucket, BrokerError> {
    required(value, "bucket")?
        .parse()
        .map_err(|e: PathError| invalid("bucket", &e))
}
