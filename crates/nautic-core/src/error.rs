//! Core error types.

use thiserror::Error;

/// Errors produced by the credential store, token issuer and capability registry.
#[derive(Debug, Error)]
pub enum Error {
    /// Registration data was empty or otherwise unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A user with this name is already registered.
    #[error("user '{0}' already exists")]
    DuplicateUser(String),

    /// Username or secret did not match. Deliberately carries no detail.
    #[error("invalid credentials")]
    AuthFailure,

    /// Token could not be verified.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// An optional subsystem failed to initialize.
    #[error(transparent)]
    Init(#[from] InitError),

    /// Password hashing failed.
    #[error("password hashing error: {0}")]
    Hash(String),

    /// Key material or other configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Token verification failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Signature or structure check failed.
    #[error("malformed token")]
    Malformed,

    /// Signature is valid but `exp` has passed.
    #[error("token expired")]
    Expired,
}

/// Failure to materialize an optional subsystem.
///
/// Cloned to every caller that coalesced onto the failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{capability} unavailable: {reason}")]
pub struct InitError {
    /// Name of the capability slot.
    pub capability: String,
    /// Reason reported by the initializer.
    pub reason: String,
}

impl InitError {
    /// Create a new initialization error.
    pub fn new(capability: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::DuplicateUser("alice".to_string());
        assert_eq!(err.to_string(), "user 'alice' already exists");

        let err = Error::from(TokenError::Expired);
        assert_eq!(err.to_string(), "token expired");

        let err = Error::from(InitError::new("vision", "model file not found"));
        assert_eq!(err.to_string(), "vision unavailable: model file not found");
    }

    #[test]
    fn test_auth_failure_has_no_detail() {
        assert_eq!(Error::AuthFailure.to_string(), "invalid credentials");
    }
}
