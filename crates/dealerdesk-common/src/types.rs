//! Core type definitions for Dealerdesk
//!
//! This module defines the request-scoped values shared by the broker:
//! storage operations, logical buckets, and the validated path components
//! produced by the sanitizers.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Maximum length of an object key or prefix in bytes (S3 limit)
pub const MAX_KEY_LEN: usize = 1024;

/// Maximum length of a file extension
pub const MAX_EXTENSION_LEN: usize = 16;

/// Maximum length of a declared content type
pub const MAX_CONTENT_TYPE_LEN: usize = 255;

/// Storage operation a grant authorizes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Download an existing object
    Read,
    /// Upload a new object
    Write,
}

impl Operation {
    /// HTTP method the caller replays against the storage provider
    #[must_use]
    pub const fn http_method(self) -> &'static str {
        match self {
            Self::Read => "GET",
            Self::Write => "PUT",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// Caller-facing bucket name, decoupled from the concrete storage bucket
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalBucket {
    /// Publicly readable assets (vehicle photos); downloads are served by the provider directly
    Public,
    /// Private documents; both reads and writes go through the broker
    Private,
}

impl LogicalBucket {
    /// Whether the broker will issue grants for `operation` on this bucket
    #[must_use]
    pub const fn allows(self, operation: Operation) -> bool {
        match (self, operation) {
            (Self::Public, Operation::Read) => false,
            (Self::Public, Operation::Write) | (Self::Private, _) => true,
        }
    }

    /// Lower-case name as accepted on the wire
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for LogicalBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogicalBucket {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            other => Err(PathError::UnknownBucket(other.to_string())),
        }
    }
}

/// Errors produced while validating caller-supplied path components
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("unknown bucket: {0}")]
    UnknownBucket(String),
    #[error("{0} cannot be empty")]
    Empty(&'static str),
    #[error("{0} must not contain '..'")]
    Traversal(&'static str),
    #[error("{0} must not contain control characters")]
    ControlCharacter(&'static str),
    #[error("{what} cannot exceed {max} bytes")]
    TooLong { what: &'static str, max: usize },
    #[error("extension may only contain a-z and 0-9")]
    InvalidExtension,
    #[error("content type must look like type/subtype")]
    InvalidContentType,
}

/// Validated key of an existing object
#[derive(Clone, PartialEq, Eq, Hash, Display)]
#[display("{_0}")]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Get the object key as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build the key for a new upload: `{prefix}/{uuid}.{extension}`
    #[must_use]
    pub fn generate(prefix: &KeyPrefix, extension: &Extension) -> Self {
        Self(format!("{}/{}.{}", prefix.0, Uuid::new_v4(), extension.0))
    }
}

impl fmt::Debug for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectKey({:?})", self.0)
    }
}

/// Validated directory under which uploads are written
#[derive(Clone, PartialEq, Eq, Hash, Display)]
#[display("{_0}")]
pub struct KeyPrefix(String);

impl KeyPrefix {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyPrefix({:?})", self.0)
    }
}

/// Validated, lower-case file extension without the leading dot
#[derive(Clone, PartialEq, Eq, Hash, Display)]
#[display("{_0}")]
pub struct Extension(String);

impl Extension {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Extension({:?})", self.0)
    }
}

/// Validated MIME type declared for an upload
///
/// The value is signed into the upload grant, so the caller has to send
/// exactly this string as its `Content-Type` header.
#[derive(Clone, PartialEq, Eq, Hash, Display)]
#[display("{_0}")]
pub struct ContentType(String);

impl ContentType {
    /// Validate a declared content type (`type/subtype[; params]`)
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(PathError::Empty("content type"));
        }
        if value.len() > MAX_CONTENT_TYPE_LEN {
            return Err(PathError::TooLong {
                what: "content type",
                max: MAX_CONTENT_TYPE_LEN,
            });
        }
        if value.chars().any(char::is_control) {
            return Err(PathError::ControlCharacter("content type"));
        }

        let essence = value.split(';').next().unwrap_or_default().trim();
        let (kind, subtype) = essence
            .split_once('/')
            .ok_or(PathError::InvalidContentType)?;
        if !is_token(kind) || !is_token(subtype) {
            return Err(PathError::InvalidContentType);
        }

        // storage canonicalizes signed header values this way; the caller must replay this form
        Ok(Self(value.split_whitespace().collect::<Vec<_>>().join(" ")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentType({:?})", self.0)
    }
}

/// RFC 7230 token
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#'
                        | b'$'
                        | b'%'
                        | b'&'
                        | b'\''
                        | b'*'
                        | b'+'
                        | b'-'
                        | b'.'
                        | b'^'
                        | b'_'
                        | b'`'
                        | b'|'
                        | b'~'
                )
        })
}

fn check_path(value: &str, what: &'static str) -> Result<(), PathError> {
    if value.is_empty() {
        return Err(PathError::Empty(what));
    }
    if value.contains("..") {
        return Err(PathError::Traversal(what));
    }
    if value.chars().any(char::is_control) {
        return Err(PathError::ControlCharacter(what));
    }
    if value.len() > MAX_KEY_LEN {
        return Err(PathError::TooLong {
            what,
            max: MAX_KEY_LEN,
        });
    }
    Ok(())
}

/// Sanitize the key of an object the caller wants to download.
///
/// Trims whitespace and leading slashes. Any `..` anywhere in the key is
/// rejected, not just `..` path segments.
pub fn sanitize_key(raw: &str) -> Result<ObjectKey, PathError> {
    let key = raw.trim().trim_start_matches('/');
    check_path(key, "key")?;
    Ok(ObjectKey(key.to_string()))
}

/// Sanitize the directory an upload will be written under.
pub fn sanitize_prefix(raw: &str) -> Result<KeyPrefix, PathError> {
    let prefix = raw.trim().trim_matches('/');
    check_path(prefix, "path prefix")?;
    Ok(KeyPrefix(prefix.to_string()))
}

/// Sanitize a file extension: lower-cased, leading dots removed, `[a-z0-9]+`.
pub fn sanitize_extension(raw: &str) -> Result<Extension, PathError> {
    let lowered = raw.trim().to_lowercase();
    let ext = lowered.trim_start_matches('.');
    if ext.is_empty() {
        return Err(PathError::Empty("extension"));
    }
    if !ext.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()) {
        return Err(PathError::InvalidExtension);
    }
    if ext.len() > MAX_EXTENSION_LEN {
        return Err(PathError::TooLong {
            what: "extension",
            max: MAX_EXTENSION_LEN,
        });
    }
    Ok(Extension(ext.to_string()))
}
