//! Shared broker state.
//!
//! The token verifier and the credential issuer are built from
//! configuration on first use and then shared by every request. Both sit in
//! a `OnceCell`, so requests racing on a cold process wait for a single
//! initialization. A failed initialization is not cached: the request gets
//! a `Misconfigured` error and the next one tries again.

use crate::error::BrokerError;
use crate::issuer::CredentialIssuer;
use crate::resolver::BucketResolver;
use dealerdesk_auth::{OidcConfig, OidcVerifier, TokenVerifier};
use dealerdesk_common::{BucketConfig, EnvSource, IdentityConfig, ProcessEnv, StorageConfig};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

/// Process-level settings that are not credentials
#[derive(Debug, Clone, Default)]
pub struct BrokerSettings {
    /// Override the identity provider's JWKS location
    pub jwks_url: Option<String>,
}

/// State shared across requests
pub struct BrokerState {
    env: Arc<dyn EnvSource>,
    settings: BrokerSettings,
    resolver: BucketResolver,
    verifier: OnceCell<Arc<dyn TokenVerifier>>,
    issuer: OnceCell<Arc<CredentialIssuer>>,
}

impl BrokerState {
    /// Create state that reads configuration from `env`
    pub fn new(env: Arc<dyn EnvSource>, settings: BrokerSettings) -> Self {
        let resolver = BucketResolver::new(BucketConfig::load(env.as_ref()));
        Self {
            env,
            settings,
            resolver,
            verifier: OnceCell::new(),
            issuer: OnceCell::new(),
        }
    }

    /// Create state backed by the process environment
    #[must_use]
    pub fn from_process_env(settings: BrokerSettings) -> Self {
        Self::new(Arc::new(ProcessEnv), settings)
    }

    /// Use `verifier` instead of building one from configuration
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn TokenVerifier>) -> Self {
        self.verifier = OnceCell::new_with(Some(verifier));
        self
    }

    /// Use `issuer` instead of building one from configuration
    #[must_use]
    pub fn with_issuer(mut self, issuer: Arc<CredentialIssuer>) -> Self {
        self.issuer = OnceCell::new_with(Some(issuer));
        self
    }

    #[must_use]
    pub const fn resolver(&self) -> &BucketResolver {
        &self.resolver
    }

    /// Token verifier, built on first use
    pub async fn verifier(&self) -> Result<&dyn TokenVerifier, BrokerError> {
        let verifier = self
            .verifier
            .get_or_try_init(|| async {
                // loading validates the service account key; verification itself needs only the project
                let identity = IdentityConfig::load(self.env.as_ref())?;
                let mut oidc = OidcConfig::firebase(&identity.project_id);
                if let Some(url) = &self.settings.jwks_url {
                    oidc = oidc.with_jwks_url(url);
                }
                info!(
                    project = %identity.project_id,
                    service_account = %identity.client_email,
                    issuer = %oidc.issuer,
                    "initialized token verifier"
                );
                Ok::<_, BrokerError>(Arc::new(OidcVerifier::new(oidc)) as Arc<dyn TokenVerifier>)
            })
            .await?;
        Ok(verifier.as_ref())
    }

    /// Credential issuer, built on first use
    pub async fn issuer(&self) -> Result<&CredentialIssuer, BrokerError> {
        let issuer = self
            .issuer
            .get_or_try_init(|| async {
                let storage = StorageConfig::load(self.env.as_ref())?;
                info!(
                    endpoint = %storage.endpoint,
                    region = %storage.region,
                    "initialized storage signer"
                );
                Ok::<_, BrokerError>(Arc::new(CredentialIssuer::from_config(storage)?))
            })
            .await?;
        Ok(issuer.as_ref())
    }

    /// Build both handles now rather than on the first request
    pub async fn warm_up(&self) -> Result<(), BrokerError> {
        self.verifier().await?;
        self.issuer().await?;
        Ok(())
    }

    #[must_use]
    pub fn identity_ready(&self) -> bool {
        self.verifier.initialized()
    }

    #[must_use]
    pub fn storage_ready(&self) -> bool {
        self.issuer.initialized()
    }
}
