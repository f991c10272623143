//! Authentication configuration.

use std::path::PathBuf;
use std::time::Duration;

use jsonwebtoken::Algorithm;

use crate::password::HasherConfig;
use crate::token::is_hmac;

/// Default token lifetime (60 minutes).
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// Default signing algorithm.
pub const DEFAULT_ALGORITHM: Algorithm = Algorithm::HS256;

/// Where the signing key comes from.
#[derive(Clone)]
pub enum KeySource {
    /// Shared secret for HMAC algorithms.
    Secret(String),

    /// PEM files for asymmetric algorithms, read when the auth capability
    /// initializes.
    PemFiles {
        private_key: PathBuf,
        public_key: PathBuf,
    },
}

impl std::fmt::Debug for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Secret(_) => f.write_str("Secret(<redacted>)"),
            KeySource::PemFiles {
                private_key,
                public_key,
            } => f
                .debug_struct("PemFiles")
                .field("private_key", private_key)
                .field("public_key", public_key)
                .finish(),
        }
    }
}

/// Authentication configuration, fixed at process start.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Token signing algorithm.
    pub algorithm: Algorithm,

    /// Signing key source.
    pub key: KeySource,

    /// Lifetime of issued tokens.
    pub token_ttl: Duration,

    /// Issuer claim stamped on and required from tokens.
    pub issuer: Option<String>,

    /// Password hashing cost.
    pub hasher: HasherConfig,
}

impl AuthConfig {
    /// HMAC configuration with the given shared secret.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            algorithm: DEFAULT_ALGORITHM,
            key: KeySource::Secret(secret.into()),
            token_ttl: DEFAULT_TOKEN_TTL,
            issuer: None,
            hasher: HasherConfig::default(),
        }
    }

    /// Asymmetric configuration reading keys from PEM files.
    pub fn with_pem_files(
        algorithm: Algorithm,
        private_key: impl Into<PathBuf>,
        public_key: impl Into<PathBuf>,
    ) -> Self {
        Self {
            algorithm,
            key: KeySource::PemFiles {
                private_key: private_key.into(),
                public_key: public_key.into(),
            },
            token_ttl: DEFAULT_TOKEN_TTL,
            issuer: None,
            hasher: HasherConfig::default(),
        }
    }

    /// Set the signing algorithm.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the token lifetime.
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Set the issuer claim.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Set the password hashing cost.
    pub fn with_hasher(mut self, hasher: HasherConfig) -> Self {
        self.hasher = hasher;
        self
    }

    /// Whether key material of the right kind appears to be present.
    ///
    /// Only looks at the configuration and the file system; does not parse keys.
    pub fn key_material_present(&self) -> bool {
        match (&self.key, is_hmac(self.algorithm)) {
            (KeySource::Secret(secret), true) => !secret.is_empty(),
            (
                KeySource::PemFiles {
                    private_key,
                    public_key,
                },
                false,
            ) => private_key.is_file() && public_key.is_file(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_redacted() {
        let config = AuthConfig::with_secret("super-secret-value");
        let printed = format!("{:?}", config);
        assert!(!printed.contains("super-secret-value"));
        assert!(printed.contains("redacted"));
    }

    #[test]
    fn test_key_material_present() {
        assert!(AuthConfig::with_secret("s").key_material_present());
        assert!(!AuthConfig::with_secret("").key_material_present());
        assert!(!AuthConfig::with_secret("s")
            .with_algorithm(Algorithm::PS512)
            .key_material_present());
        assert!(
            !AuthConfig::with_pem_files(Algorithm::RS256, "/nonexistent/a", "/nonexistent/b")
                .key_material_present()
        );
    }

    #[test]
    fn test_pem_files_present() {
        let dir = tempfile::tempdir().unwrap();
        let private_key = dir.path().join("private.pem");
        let public_key = dir.path().join("public.pem");
        std::fs::write(&private_key, "not really a key").unwrap();
        std::fs::write(&public_key, "not really a key").unwrap();

        let config = AuthConfig::with_pem_files(Algorithm::ES256, &private_key, &public_key);
        assert!(config.key_material_present());
        assert!(!config
            .clone()
            .with_algorithm(Algorithm::HS256)
            .key_material_present());
    }

    #[test]
    fn test_defaults() {
        let config = AuthConfig::with_secret("s")
            .with_token_ttl(Duration::from_secs(30))
            .with_issuer("nautic");
        assert_eq!(config.algorithm, Algorithm::HS256);
        assert_eq!(config.token_ttl, Duration::from_secs(30));
        assert_eq!(config.issuer.as_deref(), Some("nautic"));
        assert_eq!(config.hasher, HasherConfig::default());
    }
}
