//! Store-backed authentication manager.
//!
//! [`AuthManager`] composes a [`CredentialStore`] with a [`TokenIssuer`]:
//! registration and login go through the store, and only a store-confirmed
//! identity is ever handed to the issuer. [`AuthCapability`] lets the registry
//! build the manager lazily from an [`AuthConfig`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{AuthConfig, KeySource};
use crate::credentials::{CredentialStore, Identity};
use crate::error::{Error, Result, TokenError};
use crate::password::PasswordHasher;
use crate::registry::Capability;
use crate::token::{Claims, IssuedToken, SigningKey, TokenCodec, TokenIssuer, TokenVerifier};

/// Slot name of the auth manager.
pub const AUTH_CAPABILITY: &str = "auth";

/// Credential store plus token issuer.
#[derive(Debug)]
pub struct AuthManager {
    store: CredentialStore,
    issuer: TokenIssuer,
}

impl AuthManager {
    /// Compose a manager from its parts.
    pub fn new(store: CredentialStore, issuer: TokenIssuer) -> Self {
        Self { store, issuer }
    }

    /// Build a manager from configuration and already loaded key material.
    ///
    /// Hashes a decoy secret, so this costs one password hash.
    pub fn from_config(config: &AuthConfig, key: &SigningKey) -> Result<Self> {
        let codec = TokenCodec::new(config.algorithm, key)?;
        let mut issuer = TokenIssuer::new(codec, config.token_ttl);
        if let Some(iss) = &config.issuer {
            issuer = issuer.with_issuer(iss.clone());
        }

        let store = CredentialStore::new(PasswordHasher::new(config.hasher)?)?;
        Ok(Self::new(store, issuer))
    }

    /// Create a user and hand back a token for it.
    ///
    /// Costs one password hash; the new credential is not verified again.
    pub fn register(&self, username: &str, secret: &str) -> Result<IssuedToken> {
        self.store.create_user(username, secret)?;
        self.issuer.issue(&Identity::new(username))
    }

    /// Exchange credentials for a token.
    pub fn login(&self, username: &str, secret: &str) -> Result<IssuedToken> {
        let identity = self.store.authenticate(username, secret)?;
        self.issuer.issue(&identity)
    }

    /// The credential store.
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// The token issuer.
    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }
}

impl TokenVerifier for AuthManager {
    fn verify(&self, token: &str) -> std::result::Result<Claims, TokenError> {
        self.issuer.verify(token)
    }
}

/// Registry capability that builds the [`AuthManager`].
///
/// The probe only checks that key material is configured; parsing PEM keys and
/// hashing the decoy secret happen on initialization.
#[derive(Debug, Clone)]
pub struct AuthCapability {
    config: AuthConfig,
}

impl AuthCapability {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    async fn load_key(&self) -> Result<SigningKey> {
        match &self.config.key {
            KeySource::Secret(secret) => Ok(SigningKey::Secret(secret.as_bytes().to_vec())),
            KeySource::PemFiles {
                private_key,
                public_key,
            } => {
                let read = |path: &std::path::Path, e: std::io::Error| {
                    Error::Config(format!("failed to read {}: {}", path.display(), e))
                };
                Ok(SigningKey::Pem {
                    private_key: tokio::fs::read(private_key)
                        .await
                        .map_err(|e| read(private_key.as_path(), e))?,
                    public_key: tokio::fs::read(public_key)
                        .await
                        .map_err(|e| read(public_key.as_path(), e))?,
                })
            }
        }
    }
}

#[async_trait]
impl Capability for AuthCapability {
    type Instance = AuthManager;

    fn name(&self) -> &'static str {
        AUTH_CAPABILITY
    }

    fn probe(&self) -> bool {
        self.config.key_material_present()
    }

    async fn initialize(&self) -> std::result::Result<Arc<AuthManager>, String> {
        let key = self.load_key().await.map_err(|e| e.to_string())?;
        let config = self.config.clone();

        let manager = tokio::task::spawn_blocking(move || AuthManager::from_config(&config, &key))
            .await
            .map_err(|e| format!("auth initialization task failed: {}", e))?
            .map_err(|e| e.to_string())?;

        tracing::info!(
            algorithm = ?self.config.algorithm,
            token_ttl_secs = self.config.token_ttl.as_secs(),
            "auth manager ready"
        );
        Ok(Arc::new(manager))
    }
}
