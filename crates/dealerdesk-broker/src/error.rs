//! Broker error type.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use dealerdesk_auth::{AuthProviderError, SigningError};
use dealerdesk_common::{ConfigError, PathError};
use thiserror::Error;
use tracing::{error, warn};

/// Body used for every unexpected failure; details only go to the log
const UNEXPECTED_MESSAGE: &str = "internal server error";

/// Outcome of a failed broker request
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("{0}")]
    Unauthenticated(&'static str),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("server misconfigured: {0}")]
    Misconfigured(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl BrokerError {
    /// Get the HTTP status code
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Misconfigured(_) | Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BrokerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::Unexpected(detail) => {
                error!(detail = %detail, "request failed unexpectedly");
                UNEXPECTED_MESSAGE.to_string()
            }
            Self::Misconfigured(detail) => {
                error!(detail = %detail, "broker is misconfigured");
                self.to_string()
            }
            other => other.to_string(),
        };

        let mut response = (status, Json(serde_json::json!({ "error": message }))).into_response();
        if matches!(self, Self::MethodNotAllowed) {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("POST"));
        }
        response
    }
}

impl From<ConfigError> for BrokerError {
    fn from(e: ConfigError) -> Self {
        Self::Misconfigured(e.to_string())
    }
}

impl From<PathError> for BrokerError {
    fn from(e: PathError) -> Self {
        Self::InvalidRequest(e.to_string())
    }
}

impl From<AuthProviderError> for BrokerError {
    fn from(e: AuthProviderError) -> Self {
        match e {
            AuthProviderError::MissingAuth | AuthProviderError::UnsupportedAuthMethod => {
                Self::Unauthenticated("missing or invalid Authorization header")
            }
            AuthProviderError::InvalidCredentials | AuthProviderError::TokenExpired => {
                Self::Unauthenticated("invalid or expired token")
            }
            AuthProviderError::ProviderUnavailable(detail) => {
                warn!(detail = %detail, "identity provider unavailable");
                Self::Unauthenticated("invalid or expired token")
            }
            AuthProviderError::ConfigurationError(detail) => Self::Misconfigured(detail),
        }
    }
}

impl From<SigningError> for BrokerError {
    fn from(e: SigningError) -> Self {
        match e {
            SigningError::InvalidEndpoint(_) => Self::Misconfigured(e.to_string()),
            SigningError::InvalidExpiry(_) | SigningError::Internal(_) => {
                Self::Unexpected(e.to_string())
            }
        }
    }
}
