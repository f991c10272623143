//! Issuing and verifying expiring tokens for authenticated identities.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use super::codec::{Claims, TokenCodec};
use crate::credentials::Identity;
use crate::error::{Result, TokenError};

/// Verifies bearer tokens.
///
/// The request gate only depends on this trait, so admission can be exercised
/// without a real key.
pub trait TokenVerifier: Send + Sync {
    /// Verify a token against the current time.
    fn verify(&self, token: &str) -> std::result::Result<Claims, TokenError>;
}

/// A freshly signed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Compact signed token.
    pub token: String,
    /// Absolute expiry.
    pub expires_at: DateTime<Utc>,
    /// Lifetime in seconds.
    pub expires_in: u64,
}

/// Stateless token issuer with a fixed TTL.
#[derive(Debug)]
pub struct TokenIssuer {
    codec: TokenCodec,
    ttl: Duration,
    issuer: Option<String>,
}

impl TokenIssuer {
    /// Create an issuer that signs with `codec` and hands out tokens valid for `ttl`.
    pub fn new(codec: TokenCodec, ttl: Duration) -> Self {
        Self {
            codec,
            ttl,
            issuer: None,
        }
    }

    /// Stamp an `iss` claim on issued tokens and require it on verification.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        let issuer = issuer.into();
        self.codec = self.codec.with_issuer(&issuer);
        self.issuer = Some(issuer);
        self
    }

    /// Configured token lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `identity` valid from now.
    pub fn issue(&self, identity: &Identity) -> Result<IssuedToken> {
        self.issue_at(identity, Utc::now())
    }

    /// Issue a token for `identity` as if the current time were `now`.
    pub fn issue_at(&self, identity: &Identity, now: DateTime<Utc>) -> Result<IssuedToken> {
        let iat = now.timestamp();
        let ttl_secs = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let exp = iat.saturating_add(ttl_secs);

        let claims = Claims {
            sub: identity.as_str().to_string(),
            iat,
            exp,
            iss: self.issuer.clone(),
        };
        let token = self.codec.encode(&claims)?;

        Ok(IssuedToken {
            token,
            expires_at: timestamp_to_datetime(exp),
            expires_in: self.ttl.as_secs(),
        })
    }

    /// Verify a token as if the current time were `now`.
    ///
    /// The signature is checked first; `exp` is only trusted afterwards.
    pub fn verify_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<Claims, TokenError> {
        let claims = self.codec.decode(token)?;
        if claims.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

impl TokenVerifier for TokenIssuer {
    fn verify(&self, token: &str) -> std::result::Result<Claims, TokenError> {
        self.verify_at(token, Utc::now())
    }
}

/// Convert a Unix timestamp claim to a datetime, clamping out-of-range values.
pub fn timestamp_to_datetime(timestamp: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(timestamp, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
