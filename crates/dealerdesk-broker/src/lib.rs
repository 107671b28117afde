//! Object storage access broker for Dealerdesk.
//!
//! Implements the grant endpoints as an Axum router. A caller presents an
//! ID token, names a logical bucket and a path, and gets back a presigned
//! URL valid for one minute. Uploads never let the caller pick the full
//! object key: the broker generates it from a validated prefix and
//! extension.

pub mod error;
pub mod handlers;
pub mod issuer;
pub mod resolver;
pub mod state;
pub mod types;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{any, get};
use std::sync::Arc;

pub use error::BrokerError;
pub use issuer::{CredentialIssuer, GRANT_TTL, ResolvedTarget, SignedGrant};
pub use resolver::BucketResolver;
pub use state::{BrokerSettings, BrokerState};

/// Upload grant endpoint
pub const UPLOAD_PATH: &str = "/api/storage/upload-url";
/// Download grant endpoint
pub const DOWNLOAD_PATH: &str = "/api/storage/download-url";
/// Largest request body accepted by the grant endpoints
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Build the broker router.
///
/// The grant routes accept every method so that anything but POST gets a
/// 405 from the handler rather than the router's default.
pub fn router(state: Arc<BrokerState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route(UPLOAD_PATH, any(handlers::issue_upload_grant))
        .route(DOWNLOAD_PATH, any(handlers::issue_download_grant))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
