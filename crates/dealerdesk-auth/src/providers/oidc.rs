//! OIDC / Firebase ID token verifier
//!
//! Verifies RS256 JWTs against the identity provider's published JSON Web
//! Key Set. The key set is fetched lazily and cached; it is refreshed when
//! it goes stale or when a token names a key id we have not seen (the
//! provider rotates keys). Refreshes are serialized, so a burst of requests
//! carrying a new `kid` causes a single fetch. While the cached set is fresh,
//! an unknown `kid` triggers at most one refresh per `min_refresh_interval`.

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use parking_lot::RwLock;
use serde::Deserialize;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use crate::provider::{AuthProviderError, Principal, TokenVerifier};

/// Google Secure Token signing keys (Firebase Authentication ID tokens)
pub const FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Configuration for the OIDC verifier
#[derive(Debug, Clone)]
pub struct OidcConfig {
    /// Required `iss` claim
    pub issuer: String,
    /// Required `aud` claim
    pub audience: String,
    /// JWKS document location
    pub jwks_url: String,
    /// How long a fetched key set is trusted when the response has no max-age
    pub jwks_ttl: Duration,
    /// Clock skew tolerated on `exp` / `auth_time`
    pub leeway: Duration,
    /// Timeout for the JWKS request
    pub timeout: Duration,
    /// Minimum time between refreshes triggered by an unknown `kid` while the key set is fresh
    pub min_refresh_interval: Duration,
}

impl OidcConfig {
    /// Settings for Firebase Authentication ID tokens of `project_id`
    pub fn firebase(project_id: impl Into<String>) -> Self {
        let project_id = project_id.into();
        Self {
            issuer: format!("https://securetoken.google.com/{project_id}"),
            audience: project_id,
            jwks_url: FIREBASE_JWKS_URL.to_string(),
            jwks_ttl: Duration::from_secs(60 * 60),
            leeway: Duration::from_secs(60),
            timeout: Duration::from_secs(5),
            min_refresh_interval: Duration::from_secs(30),
        }
    }

    /// Override the JWKS location
    #[must_use]
    pub fn with_jwks_url(mut self, url: impl Into<String>) -> Self {
        self.jwks_url = url.into();
        self
    }

    /// Set the fallback key set lifetime
    #[must_use]
    pub const fn with_jwks_ttl(mut self, ttl: Duration) -> Self {
        self.jwks_ttl = ttl;
        self
    }

    /// Set the unknown-`kid` refresh cooldown
    #[must_use]
    pub const fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    exp: u64,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    auth_time: Option<u64>,
}

struct CachedKeys {
    keys: JwkSet,
    expires_at: Option<Instant>,
}

impl CachedKeys {
    fn is_fresh(&self) -> bool {
        self.expires_at.is_none_or(|at| Instant::now() < at)
    }
}

/// Verifies ID tokens issued by an OIDC provider
pub struct OidcVerifier {
    config: OidcConfig,
    http_client: OnceCell<reqwest::Client>,
    keys: RwLock<Option<CachedKeys>>,
    /// Serializes refreshes; holds the time of the last successful one
    last_refresh: Mutex<Option<Instant>>,
    /// Keys were supplied up front; never go to the network
    pinned: bool,
}

impl OidcVerifier {
    /// Create a verifier that fetches keys from `config.jwks_url` on demand
    #[must_use]
    pub fn new(config: OidcConfig) -> Self {
        Self {
            config,
            http_client: OnceCell::new(),
            keys: RwLock::new(None),
            last_refresh: Mutex::new(None),
            pinned: false,
        }
    }

    /// Create a verifier with a fixed key set
    #[must_use]
    pub fn with_keys(config: OidcConfig, keys: JwkSet) -> Self {
        Self {
            config,
            http_client: OnceCell::new(),
            keys: RwLock::new(Some(CachedKeys {
                keys,
                expires_at: None,
            })),
            last_refresh: Mutex::new(None),
            pinned: true,
        }
    }

    /// Expected issuer
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.config.issuer
    }

    async fn client(&self) -> Result<&reqwest::Client, AuthProviderError> {
        self.http_client
            .get_or_try_init(|| async {
                reqwest::Client::builder()
                    .timeout(self.config.timeout)
                    .build()
                    .map_err(|e| AuthProviderError::ConfigurationError(e.to_string()))
            })
            .await
    }

    /// Cached key for `kid`, if the cache is fresh
    fn cached_key(&self, kid: &str) -> Option<Result<DecodingKey, AuthProviderError>> {
        let guard = self.keys.read();
        let cached = guard.as_ref().filter(|c| c.is_fresh())?;
        let jwk = cached.keys.find(kid)?;
        Some(DecodingKey::from_jwk(jwk).map_err(|e| {
            warn!(kid, error = %e, "unusable signing key in key set");
            AuthProviderError::InvalidCredentials
        }))
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthProviderError> {
        if let Some(key) = self.cached_key(kid) {
            return key;
        }
        if self.pinned {
            debug!(kid, "token signed with unknown key");
            return Err(AuthProviderError::InvalidCredentials);
        }

        let mut last_refresh = self.last_refresh.lock().await;
        // another request may have refreshed while we waited
        if let Some(key) = self.cached_key(kid) {
            return key;
        }
        let recently_refreshed =
            last_refresh.is_some_and(|at| at.elapsed() < self.config.min_refresh_interval);
        if recently_refreshed && self.keys_fresh() {
            debug!(kid, "unknown key id; key set was refreshed recently");
            return Err(AuthProviderError::InvalidCredentials);
        }
        self.refresh_keys().await?;
        *last_refresh = Some(Instant::now());
        self.cached_key(kid).unwrap_or_else(|| {
            debug!(kid, "token signed with unknown key");
            Err(AuthProviderError::InvalidCredentials)
        })
    }

    fn keys_fresh(&self) -> bool {
        self.keys.read().as_ref().is_some_and(CachedKeys::is_fresh)
    }

    async fn refresh_keys(&self) -> Result<(), AuthProviderError> {
        let client = self.client().await?;
        let response = client
            .get(&self.config.jwks_url)
            .send()
            .await
            .map_err(|e| AuthProviderError::ProviderUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthProviderError::ProviderUnavailable(format!(
                "JWKS endpoint returned status {}",
                response.status()
            )));
        }

        let ttl = response
            .headers()
            .get(http::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(max_age)
            .unwrap_or(self.config.jwks_ttl);

        let keys: JwkSet = response
            .json()
            .await
            .map_err(|e| AuthProviderError::ProviderUnavailable(format!("invalid JWKS: {e}")))?;

        info!(
            url = %self.config.jwks_url,
            keys = keys.keys.len(),
            ttl_secs = ttl.as_secs(),
            "refreshed identity provider signing keys"
        );
        *self.keys.write() = Some(CachedKeys {
            keys,
            expires_at: Some(Instant::now() + ttl),
        });
        Ok(())
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = self.config.leeway.as_secs();
        validation
    }
}

/// `max-age` directive of a Cache-Control header
fn max_age(cache_control: &str) -> Option<Duration> {
    cache_control.split(',').find_map(|directive| {
        let (name, value) = directive.trim().split_once('=')?;
        if name.trim().eq_ignore_ascii_case("max-age") {
            value.trim().parse().ok().map(Duration::from_secs)
        } else {
            None
        }
    })
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

#[async_trait]
impl TokenVerifier for OidcVerifier {
    fn name(&self) -> &str {
        "oidc"
    }

    async fn verify(&self, token: &str) -> Result<Principal, AuthProviderError> {
        let header = decode_header(token).map_err(|_| AuthProviderError::InvalidCredentials)?;
        if header.alg != Algorithm::RS256 {
            debug!(alg = ?header.alg, "rejecting token with unexpected algorithm");
            return Err(AuthProviderError::InvalidCredentials);
        }
        let kid = header.kid.ok_or(AuthProviderError::InvalidCredentials)?;

        let key = self.decoding_key(&kid).await?;
        let data = decode::<IdTokenClaims>(token, &key, &self.validation()).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthProviderError::TokenExpired,
                _ => {
                    debug!(error = %e, "token rejected");
                    AuthProviderError::InvalidCredentials
                }
            }
        })?;
        let claims = data.claims;

        if claims.sub.trim().is_empty() {
            return Err(AuthProviderError::InvalidCredentials);
        }
        if let Some(auth_time) = claims.auth_time
            && auth_time > unix_now() + self.config.leeway.as_secs()
        {
            return Err(AuthProviderError::InvalidCredentials);
        }

        let mut principal = Principal::new(claims.sub, self.name()).with_expiry(claims.exp);
        principal.email = claims.email;
        Ok(principal)
    }
}
