//! Dealerdesk Authentication and Signing
//!
//! This crate provides:
//! - Bearer token extraction and the pluggable `TokenVerifier` trait
//! - An OIDC/JWT verifier for Firebase-style ID tokens
//! - AWS Signature V4 presigned URL generation
//!
//! # Features
//!
//! - `oidc` (default): OIDC/JWT verification support
//!
//! # Example
//!
//! ```rust,ignore
//! use dealerdesk_auth::{OidcConfig, OidcVerifier, TokenVerifier, bearer_token};
//!
//! let verifier = OidcVerifier::new(OidcConfig::firebase("dealer-app"));
//! let principal = verifier.verify(bearer_token(&headers)?).await?;
//! ```

pub mod error;
pub mod presign;
pub mod provider;
pub mod providers;

pub use error::SigningError;
pub use presign::{AddressingStyle, PresignRequest, Presigner};
pub use provider::{AuthProviderError, Principal, TokenVerifier, bearer_token};

#[cfg(feature = "oidc")]
pub use providers::{OidcConfig, OidcVerifier};
