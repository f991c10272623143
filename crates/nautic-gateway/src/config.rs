//! Gateway configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use nautic_core::{Algorithm, AuthConfig, FailurePolicy};

/// What to do after a capability fails to initialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FailureMode {
    /// Retry on use after an exponentially growing backoff.
    Retry,
    /// Keep the failure until the process restarts.
    Sticky,
}

/// Nautic HTTP gateway command line arguments.
#[derive(Debug, Parser)]
#[command(name = "nautic-gateway")]
#[command(about = "Authentication and image analysis gateway for Nautic")]
pub struct Args {
    /// Address to listen on for HTTP requests.
    #[arg(short, long, env = "NAUTIC_LISTEN", default_value = "0.0.0.0:8000")]
    pub listen: String,

    /// Shared secret for HMAC token signing. Generated at start-up when unset.
    #[arg(long, env = "NAUTIC_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Token signing algorithm.
    #[arg(long, env = "NAUTIC_JWT_ALGORITHM", default_value = "HS256", value_parser = parse_algorithm)]
    pub jwt_algorithm: Algorithm,

    /// PEM private key for asymmetric algorithms.
    #[arg(long, env = "NAUTIC_JWT_PRIVATE_KEY", requires = "jwt_public_key")]
    pub jwt_private_key: Option<PathBuf>,

    /// PEM public key for asymmetric algorithms.
    #[arg(long, env = "NAUTIC_JWT_PUBLIC_KEY", requires = "jwt_private_key")]
    pub jwt_public_key: Option<PathBuf>,

    /// Issuer claim stamped on and required from tokens.
    #[arg(long, env = "NAUTIC_JWT_ISSUER")]
    pub jwt_issuer: Option<String>,

    /// Lifetime of issued tokens in minutes.
    #[arg(long, env = "NAUTIC_TOKEN_TTL_MINUTES", default_value_t = 60)]
    pub token_ttl_minutes: u64,

    /// Path to the detection model weights.
    #[arg(long, env = "NAUTIC_MODEL_PATH", default_value = "models/best.pt")]
    pub model_path: PathBuf,

    /// Default detection confidence threshold.
    #[arg(long, env = "NAUTIC_CONFIDENCE", default_value_t = 0.25, value_parser = parse_confidence)]
    pub confidence: f32,

    /// Failure policy for capability initialization.
    #[arg(long, env = "NAUTIC_CAPABILITY_FAILURE", value_enum, default_value_t = FailureMode::Retry)]
    pub capability_failure: FailureMode,

    /// Initial retry backoff (ms) after a failed initialization.
    #[arg(long, default_value_t = 5_000)]
    pub retry_backoff_ms: u64,

    /// Maximum retry backoff (ms).
    #[arg(long, default_value_t = 300_000)]
    pub retry_backoff_max_ms: u64,

    /// Maximum upload size in megabytes.
    #[arg(long, env = "NAUTIC_MAX_UPLOAD_MB", default_value_t = 16)]
    pub max_upload_mb: usize,

    /// Initialize every capability at start-up instead of on first use.
    #[arg(long, env = "NAUTIC_PRELOAD")]
    pub preload: bool,
}

fn parse_algorithm(value: &str) -> Result<Algorithm, String> {
    value
        .to_ascii_uppercase()
        .parse::<Algorithm>()
        .map_err(|_| format!("unsupported algorithm '{}'", value))
}

/// Parse a confidence threshold in `[0, 1]`.
pub fn parse_confidence(value: &str) -> Result<f32, String> {
    let confidence: f32 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    if (0.0..=1.0).contains(&confidence) {
        Ok(confidence)
    } else {
        Err(format!("confidence {} is outside [0, 1]", confidence))
    }
}

/// Random 256-bit hex secret.
pub fn generate_secret() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address to listen on for HTTP requests.
    pub listen_addr: String,
    /// Authentication settings.
    pub auth: AuthConfig,
    /// Whether the signing secret was generated rather than configured.
    pub secret_generated: bool,
    /// Path to the detection model weights.
    pub model_path: PathBuf,
    /// Default detection confidence threshold.
    pub confidence: f32,
    /// Failure policy for capability initialization.
    pub failure_policy: FailurePolicy,
    /// Maximum request body size in bytes.
    pub max_upload_bytes: usize,
    /// Initialize capabilities at start-up.
    pub preload: bool,
}

impl GatewayConfig {
    /// Replace the authentication settings.
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self.secret_generated = false;
        self
    }

    /// Set the model path.
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }

    /// Set the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}

impl From<&Args> for GatewayConfig {
    fn from(args: &Args) -> Self {
        let (key_config, secret_generated) = match (&args.jwt_private_key, &args.jwt_public_key) {
            (Some(private_key), Some(public_key)) => (
                AuthConfig::with_pem_files(args.jwt_algorithm, private_key, public_key),
                false,
            ),
            _ => match &args.secret_key {
                Some(secret) => (
                    AuthConfig::with_secret(secret.clone()).with_algorithm(args.jwt_algorithm),
                    false,
                ),
                None => (
                    AuthConfig::with_secret(generate_secret()).with_algorithm(args.jwt_algorithm),
                    true,
                ),
            },
        };

        let token_ttl = Duration::from_secs(args.token_ttl_minutes.saturating_mul(60));
        let mut auth = key_config.with_token_ttl(token_ttl);
        if let Some(issuer) = &args.jwt_issuer {
            auth = auth.with_issuer(issuer.clone());
        }

        let failure_policy = match args.capability_failure {
            FailureMode::Sticky => FailurePolicy::Sticky,
            FailureMode::Retry => FailurePolicy::retry_with_backoff(
                Duration::from_millis(args.retry_backoff_ms),
                Duration::from_millis(args.retry_backoff_max_ms),
            ),
        };

        Self {
            listen_addr: args.listen.clone(),
            auth,
            secret_generated,
            model_path: args.model_path.clone(),
            confidence: args.confidence,
            failure_policy,
            max_upload_bytes: args.max_upload_mb.saturating_mul(1024 * 1024),
            preload: args.preload,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            auth: AuthConfig::with_secret(generate_secret()),
            secret_generated: true,
            model_path: PathBuf::from("models/best.pt"),
            confidence: 0.25,
            failure_policy: FailurePolicy::default(),
            max_upload_bytes: 16 * 1024 * 1024,
            preload: false,
        }
    }
}
