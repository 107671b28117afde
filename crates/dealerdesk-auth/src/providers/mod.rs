//! Token verifier implementations
//!
//! This module contains implementations of the `TokenVerifier` trait:
//! - `oidc`: OIDC/JWT verification against a published key set (optional feature)

#[cfg(feature = "oidc")]
pub mod oidc;

#[cfg(feature = "oidc")]
pub use oidc::{OidcConfig, OidcVerifier};
