//! Dealerdesk Common - shared types and configuration
//!
//! This crate provides:
//! - The validated path components used to build object keys
//! - Logical bucket and operation types
//! - Configuration loading and secret normalization

pub mod config;
pub mod error;
pub mod types;

pub use config::{BucketConfig, EnvSource, IdentityConfig, ProcessEnv, StorageConfig};
pub use error::{ConfigError, Result};
pub use types::{
    ContentType, Extension, KeyPrefix, LogicalBucket, ObjectKey, Operation, PathError,
    sanitize_extension, sanitize_key, sanitize_prefix,
};
