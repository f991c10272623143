//! Token codec and issuer.
//!
//! Tokens are JWTs carrying `sub`, `iat`, `exp` and an optional `iss`. The
//! issuer holds no per-token state: anything signed with the configured key
//! and not yet expired verifies.

pub mod codec;
pub mod issuer;

pub use codec::{is_hmac, Claims, SigningKey, TokenCodec};
pub use issuer::{timestamp_to_datetime, IssuedToken, TokenIssuer, TokenVerifier};
