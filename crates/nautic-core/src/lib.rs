//! Nautic core.
//!
//! Bearer-token authentication and lazy initialization of optional
//! subsystems:
//!
//! - [`password`]: salted, slow password hashing.
//! - [`credentials`]: in-memory user store.
//! - [`token`]: signed, expiring tokens.
//! - [`auth`]: store plus issuer, loadable as a capability.
//! - [`registry`]: tri-state slots with coalesced initialization.
//! - [`gate`]: per-request admission over a [`TokenVerifier`].

pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gate;
pub mod password;
pub mod registry;
pub mod token;

pub use auth::{AuthCapability, AuthManager, AUTH_CAPABILITY};
pub use config::{AuthConfig, KeySource};
pub use credentials::{CredentialStore, Identity, UserCredential};
pub use error::{Error, InitError, Result, TokenError};
pub use gate::{extract_bearer, Admission, GateStage, RejectReason, Rejection, RequestGate};
pub use password::{HasherConfig, PasswordHasher};
pub use registry::{
    Availability, Capability, CapabilityRegistry, CapabilitySlot, FailurePolicy, FnCapability,
    SlotStatus,
};
pub use token::{Claims, IssuedToken, SigningKey, TokenCodec, TokenIssuer, TokenVerifier};

pub use jsonwebtoken::Algorithm;
