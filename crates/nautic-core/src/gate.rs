//! Per-request bearer token admission.
//!
//! ```text
//! Start ──► TokenExtracted ──► Verified ──► Admitted
//!               │                  │
//!               └──► Rejected ◄────┘
//! ```
//!
//! Admission depends only on the verifier's answer; the gate never touches
//! the credential store.

use std::fmt;

use crate::error::TokenError;
use crate::token::{Claims, TokenVerifier};

/// Stage at which a request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStage {
    TokenExtracted,
    Verified,
}

/// Why a request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// No `Authorization` header.
    MissingHeader,
    /// Header present but not `Bearer <token>`.
    MalformedHeader,
    /// Token failed verification.
    Token(TokenError),
}

/// A rejected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub stage: GateStage,
    pub reason: RejectReason,
}

impl Rejection {
    fn at_extraction(reason: RejectReason) -> Self {
        Self {
            stage: GateStage::TokenExtracted,
            reason,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            RejectReason::MissingHeader => f.write_str("missing authorization header"),
            RejectReason::MalformedHeader => f.write_str("invalid authorization header"),
            RejectReason::Token(TokenError::Expired) => f.write_str("token expired"),
            RejectReason::Token(TokenError::Malformed) => f.write_str("invalid token"),
        }
    }
}

impl std::error::Error for Rejection {}

/// An admitted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub claims: Claims,
}

impl Admission {
    /// Authenticated username.
    pub fn subject(&self) -> &str {
        &self.claims.sub
    }
}

/// Pull the token out of an `Authorization` header value.
///
/// The scheme is matched case-insensitively; surrounding whitespace is ignored.
pub fn extract_bearer(header: Option<&str>) -> Result<&str, Rejection> {
    let header = header.ok_or(Rejection::at_extraction(RejectReason::MissingHeader))?;

    let (scheme, token) = header
        .trim()
        .split_once(' ')
        .ok_or(Rejection::at_extraction(RejectReason::MalformedHeader))?;

    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(Rejection::at_extraction(RejectReason::MalformedHeader));
    }
    Ok(token)
}

/// Admission check bound to a verifier.
pub struct RequestGate<'a, V: TokenVerifier + ?Sized> {
    verifier: &'a V,
}

impl<'a, V: TokenVerifier + ?Sized> RequestGate<'a, V> {
    pub fn new(verifier: &'a V) -> Self {
        Self { verifier }
    }

    /// Run the gate over an `Authorization` header value.
    pub fn admit(&self, authorization: Option<&str>) -> Result<Admission, Rejection> {
        let token = extract_bearer(authorization).inspect_err(|rejection| {
            tracing::debug!(stage = ?rejection.stage, %rejection, "request rejected");
        })?;

        match self.verifier.verify(token) {
            Ok(claims) => {
                tracing::debug!(subject = %claims.sub, "request admitted");
                Ok(Admission { claims })
            }
            Err(err) => {
                let rejection = Rejection {
                    stage: GateStage::Verified,
                    reason: RejectReason::Token(err),
                };
                tracing::debug!(stage = ?rejection.stage, %rejection, "request rejected");
                Err(rejection)
            }
        }
    }
}
