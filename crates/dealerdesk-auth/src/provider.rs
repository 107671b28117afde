//! Pluggable token verifier trait and types
//!
//! This module defines the abstraction for verifying bearer tokens, so the
//! broker can run against the OIDC provider in production and against a
//! fixed table of tokens in tests.

use async_trait::async_trait;
use http::HeaderMap;
use http::header::AUTHORIZATION;

/// Verified identity of a caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Unique identifier (subject claim)
    pub subject: String,
    /// Email address, when the token carries one
    pub email: Option<String>,
    /// Provider name (oidc, static)
    pub provider: String,
    /// Token expiry (unix seconds)
    pub expires_at: Option<u64>,
}

impl Principal {
    /// Create a new principal
    pub fn new(subject: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            email: None,
            provider: provider.into(),
            expires_at: None,
        }
    }

    /// Set email
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set expiry timestamp
    #[must_use]
    pub const fn with_expiry(mut self, expires_at: u64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// Authentication error types
#[derive(Debug, thiserror::Error)]
pub enum AuthProviderError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Token expired")]
    TokenExpired,
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Missing authentication")]
    MissingAuth,
    #[error("Unsupported authentication method")]
    UnsupportedAuthMethod,
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively.
///
/// # Errors
/// `MissingAuth` without an Authorization header, `UnsupportedAuthMethod`
/// for any other scheme, `InvalidCredentials` for an empty token.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthProviderError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthProviderError::MissingAuth)?
        .to_str()
        .map_err(|_| AuthProviderError::InvalidCredentials)?
        .trim();

    let (scheme, token) = value
        .split_once(char::is_whitespace)
        .ok_or(AuthProviderError::UnsupportedAuthMethod)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthProviderError::UnsupportedAuthMethod);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthProviderError::InvalidCredentials);
    }
    Ok(token)
}

/// Trait for pluggable token verifiers
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    /// Verify a bearer token and return the caller's identity
    async fn verify(&self, token: &str) -> Result<Principal, AuthProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", value.parse().unwrap());
        headers
    }

    #[test]
    fn test_principal_builder() {
        let principal = Principal::new("user123", "oidc")
            .with_email("sales@example.com")
            .with_expiry(1_234_567_890);

        assert_eq!(principal.subject, "user123");
        assert_eq!(principal.email.as_deref(), Some("sales@example.com"));
        assert_eq!(principal.expires_at, Some(1_234_567_890));
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
        assert_eq!(bearer_token(&headers("bearer   abc ")).unwrap(), "abc");
        assert_eq!(bearer_token(&headers("BEARER abc")).unwrap(), "abc");
    }

    #[test]
    fn test_bearer_token_failures() {
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AuthProviderError::MissingAuth)
        ));
        assert!(matches!(
            bearer_token(&headers("Basic dXNlcjpwYXNz")),
            Err(AuthProviderError::UnsupportedAuthMethod)
        ));
        assert!(matches!(
            bearer_token(&headers("Bearer")),
            Err(AuthProviderError::UnsupportedAuthMethod)
        ));
        assert!(matches!(
            bearer_token(&headers("Bearertoken")),
            Err(AuthProviderError::UnsupportedAuthMethod)
        ));
    }
}
