//! Axum handlers for the storage grant endpoints.
//!
//! Both endpoints run the same pipeline: method check, bearer token
//! verification, body parsing, field validation, bucket resolution and
//! signing. Every stage fails fast; nothing is retried.

use crate::error::BrokerError;
use crate::issuer::ResolvedTarget;
use crate::state::BrokerState;
use crate::types::{
    DownloadGrantResponse, DownloadRequest, HealthResponse, UploadGrantResponse, UploadRequest,
};
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method};
use dealerdesk_auth::{Principal, bearer_token};
use dealerdesk_common::{ObjectKey, Operation};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info};

type Result<T> = std::result::Result<T, BrokerError>;

fn require_post(method: &Method) -> Result<()> {
    if method == Method::POST {
        Ok(())
    } else {
        Err(BrokerError::MethodNotAllowed)
    }
}

async fn authenticate(state: &BrokerState, headers: &HeaderMap) -> Result<Principal> {
    let token = bearer_token(headers)?;
    let verifier = state.verifier().await?;
    let principal = verifier.verify(token).await.inspect_err(|e| {
        debug!(provider = verifier.name(), error = %e, "token verification failed");
    })?;
    Ok(principal)
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(BrokerError::InvalidRequest(
            "request body must be a JSON object".to_string(),
        ));
    }
    serde_json::from_slice(body)
        .map_err(|e| BrokerError::InvalidRequest(format!("malformed JSON body: {e}")))
}

/// POST /api/storage/upload-url
///
/// # Errors
/// Returns `BrokerError` for the first stage that fails.
pub async fn issue_upload_grant(
    State(state): State<Arc<BrokerState>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UploadGrantResponse>> {
    require_post(&method)?;
    let principal = authenticate(&state, &headers).await?;

    let params = parse_body::<UploadRequest>(&body)?.validate()?;
    let bucket = state.resolver().resolve(params.bucket, Operation::Write)?;
    let target = ResolvedTarget {
        bucket: bucket.to_string(),
        key: ObjectKey::generate(&params.prefix, &params.extension),
    };

    let issuer = state.issuer().await?;
    let grant = issuer.issue(&target, Operation::Write, Some(&params.content_type))?;

    info!(
        subject = %principal.subject,
        bucket = %params.bucket,
        key = %target.key,
        content_type = %params.content_type,
        "issued upload grant"
    );

    Ok(Json(UploadGrantResponse {
        url: grant.url,
        key: target.key.to_string(),
        method: grant.method.to_string(),
        headers: grant.required_headers,
    }))
}

/// POST /api/storage/download-url
///
/// # Errors
/// Returns `BrokerError` for the first stage that fails.
pub async fn issue_download_grant(
    State(state): State<Arc<BrokerState>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<DownloadGrantResponse>> {
    require_post(&method)?;
    let principal = authenticate(&state, &headers).await?;

    let params = parse_body::<DownloadRequest>(&body)?.validate()?;
    let bucket = state.resolver().resolve(params.bucket, Operation::Read)?;
    let target = ResolvedTarget {
        bucket: bucket.to_string(),
        key: params.key,
    };

    let issuer = state.issuer().await?;
    let grant = issuer.issue(&target, Operation::Read, None)?;

    info!(
        subject = %principal.subject,
        bucket = %params.bucket,
        key = %target.key,
        "issued download grant"
    );

    Ok(Json(DownloadGrantResponse { url: grant.url }))
}

/// GET /health
pub async fn health_check(State(state): State<Arc<BrokerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        identity_ready: state.identity_ready(),
        storage_ready: state.storage_ready(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router;
    use crate::state::BrokerSettings;
    use async_trait::async_trait;
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use dealerdesk_auth::{AuthProviderError, TokenVerifier};
    use dealerdesk_common::config::{
        R2_ACCESS_KEY_ID, R2_ACCOUNT_ID, R2_PRIVATE_BUCKET, R2_PUBLIC_BUCKET, R2_SECRET_ACCESS_KEY,
    };
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    const TOKEN: &str = "valid-token";

    /// Accepts exactly one token
    #[derive(Default)]
    struct StaticVerifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenVerifier for StaticVerifier {
        fn name(&self) -> &str {
            "static"
        }

        async fn verify(&self, token: &str) -> std::result::Result<Principal, AuthProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if token == TOKEN {
                Ok(Principal::new("user-1", "static"))
            } else {
                Err(AuthProviderError::InvalidCredentials)
            }
        }
    }

    fn env() -> HashMap<String, String> {
        HashMap::from([
            (R2_ACCOUNT_ID.to_string(), "acct".to_string()),
            (R2_ACCESS_KEY_ID.to_string(), "AKID".to_string()),
            (R2_SECRET_ACCESS_KEY.to_string(), "secret".to_string()),
            (R2_PUBLIC_BUCKET.to_string(), "dealer-public".to_string()),
            (R2_PRIVATE_BUCKET.to_string(), "dealer-private".to_string()),
        ])
    }

    fn state_with(env: HashMap<String, String>) -> Arc<BrokerState> {
        state_with_verifier(env, Arc::new(StaticVerifier::default()))
    }

    fn state_with_verifier(
        env: HashMap<String, String>,
        verifier: Arc<StaticVerifier>,
    ) -> Arc<BrokerState> {
        Arc::new(BrokerState::new(Arc::new(env), BrokerSettings::default()).with_verifier(verifier))
    }

    fn app(state: &Arc<BrokerState>) -> Router {
        router(state.clone())
    }

    fn post(uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn upload_body(bucket: &str) -> serde_json::Value {
        serde_json::json!({
            "bucket": bucket,
            "contentType": "image/jpeg",
            "extension": "JPG",
            "pathPrefix": "/vehicles/vin123/",
        })
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_upload_grant() {
        let state = state_with(env());
        let response = app(&state)
            .oneshot(post("/api/storage/upload-url", Some(TOKEN), upload_body("private")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        let key = json["key"].as_str().unwrap();
        assert!(key.starts_with("vehicles/vin123/"));
        assert!(key.ends_with(".jpg"));
        let url = json["url"].as_str().unwrap();
        assert!(url.contains("/dealer-private/"));
        assert!(url.contains(key));
        assert_eq!(json["method"], "PUT");
        assert_eq!(json["headers"]["Content-Type"], "image/jpeg");
    }

    #[tokio::test]
    async fn test_upload_keys_are_unique_and_short_lived() {
        let state = state_with(env());
        let mut keys = Vec::new();
        for _ in 0..2 {
            let response = app(&state)
                .oneshot(post("/api/storage/upload-url", Some(TOKEN), upload_body("public")))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let json = body_json(response).await;
            assert!(json["url"].as_str().unwrap().contains("X-Amz-Expires=60&"));
            keys.push(json["key"].as_str().unwrap().to_string());
        }
        assert_ne!(keys[0], keys[1]);
    }

    #[tokio::test]
    async fn test_download_grant() {
        let state = state_with(env());
        let body = serde_json::json!({ "bucket": "private", "key": "/deals/9/contract.pdf" });
        let response = app(&state)
            .oneshot(post("/api/storage/download-url", Some(TOKEN), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        let url = json["url"].as_str().unwrap();
        assert!(url.starts_with(
            "https://acct.r2.cloudflarestorage.com/dealer-private/deals/9/contract.pdf?"
        ));
        assert_eq!(json.as_object().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_token_is_rejected_before_body_or_signing() {
        for uri in ["/api/storage/upload-url", "/api/storage/download-url"] {
            let verifier = Arc::new(StaticVerifier::default());
            let state = state_with_verifier(env(), verifier.clone());
            let request = Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::from("{ this is not json"))
                .unwrap();
            let response = app(&state).oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
            assert!(!state.storage_ready());
        }
    }

    #[tokio::test]
    async fn test_bad_token_and_wrong_scheme() {
        let state = state_with(env());
        let response = app(&state)
            .oneshot(post("/api/storage/upload-url", Some("forged"), upload_body("private")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .method("POST")
            .uri("/api/storage/download-url")
            .header("Authorization", format!("Basic {TOKEN}"))
            .body(Body::from(r#"{"bucket":"private","key":"a"}"#))
            .unwrap();
        let response = app(&state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_wrong_method() {
        let state = state_with(env());
        for uri in ["/api/storage/upload-url", "/api/storage/download-url"] {
            let request = Request::builder()
                .method("GET")
                .uri(uri)
                .header("authorization", format!("Bearer {TOKEN}"))
                .body(Body::empty())
                .unwrap();
            let response = app(&state).oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        }
    }

    #[tokio::test]
    async fn test_public_download_is_rejected() {
        let state = state_with(env());
        let body = serde_json::json!({ "bucket": "public", "key": "vehicles/a.jpg" });
        let response = app(&state)
            .oneshot(post("/api/storage/download-url", Some(TOKEN), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invalid_input() {
        let state = state_with(env());
        let cases = [
            (
                "/api/storage/download-url",
                serde_json::json!({ "bucket": "private", "key": "../etc/passwd" }),
            ),
            (
                "/api/storage/download-url",
                serde_json::json!({ "bucket": "private" }),
            ),
            (
                "/api/storage/upload-url",
                serde_json::json!({
                    "bucket": "private",
                    "contentType": "image/jpeg",
                    "extension": "php/x",
                    "pathPrefix": "vehicles",
                }),
            ),
            ("/api/storage/upload-url", upload_body("archive")),
            ("/api/storage/upload-url", serde_json::json!(["not", "an", "object"])),
        ];
        for (uri, body) in cases {
            let response = app(&state)
                .oneshot(post(uri, Some(TOKEN), body.clone()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri} {body}");
            assert!(body_json(response).await["error"].is_string());
        }
    }

    #[tokio::test]
    async fn test_empty_body() {
        let state = state_with(env());
        let request = Request::builder()
            .method("POST")
            .uri("/api/storage/upload-url")
            .header("authorization", format!("Bearer {TOKEN}"))
            .body(Body::empty())
            .unwrap();
        let response = app(&state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_misconfiguration() {
        let mut missing_bucket = env();
        missing_bucket.remove(R2_PRIVATE_BUCKET);
        let state = state_with(missing_bucket);
        let response = app(&state)
            .oneshot(post("/api/storage/upload-url", Some(TOKEN), upload_body("private")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let mut missing_secret = env();
        missing_secret.remove(R2_SECRET_ACCESS_KEY);
        let state = state_with(missing_secret);
        let response = app(&state)
            .oneshot(post("/api/storage/upload-url", Some(TOKEN), upload_body("private")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let message = body_json(response).await["error"].as_str().unwrap().to_string();
        assert!(message.contains(R2_SECRET_ACCESS_KEY));
    }

    #[tokio::test]
    async fn test_health() {
        let state = state_with(env());
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app(&state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["identity_ready"], true);
        assert_eq!(json["storage_ready"], false);
    }
}
