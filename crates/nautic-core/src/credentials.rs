//! In-process credential store.
//!
//! Maps usernames to Argon2 hashes. Nothing is persisted; the store lives as
//! long as the process (or test) that owns it.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::password::PasswordHasher;

/// Secret hashed once at construction and verified against when the
/// username is unknown, so both failure paths pay for one verification.
const DECOY_SECRET: &str = "nautic-decoy-secret";

/// A username confirmed by the credential store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    /// Wrap a username that has already been authenticated.
    pub(crate) fn new(username: impl Into<String>) -> Self {
        Self(username.into())
    }

    /// The username.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the username.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered user.
#[derive(Debug, Clone)]
pub struct UserCredential {
    pub username: String,
    pub hashed_secret: String,
    pub created_at: DateTime<Utc>,
}

/// Registry of usernames to hashed secrets.
pub struct CredentialStore {
    hasher: PasswordHasher,
    users: RwLock<HashMap<String, UserCredential>>,
    decoy_hash: String,
    authentications: AtomicU64,
}

impl CredentialStore {
    /// Create an empty store.
    pub fn new(hasher: PasswordHasher) -> Result<Self> {
        let decoy_hash = hasher.hash(DECOY_SECRET)?;
        Ok(Self {
            hasher,
            users: RwLock::new(HashMap::new()),
            decoy_hash,
            authentications: AtomicU64::new(0),
        })
    }

    /// Register a new user.
    ///
    /// The secret is hashed before the write lock is taken; the duplicate
    /// check and the insert happen under the same lock.
    pub fn create_user(&self, username: &str, secret: &str) -> Result<()> {
        if username.trim().is_empty() || secret.is_empty() {
            return Err(Error::InvalidInput(
                "username and password are required".to_string(),
            ));
        }

        // Cheap early exit; the authoritative check is below.
        if self.user_exists(username) {
            return Err(Error::DuplicateUser(username.to_string()));
        }

        let hashed_secret = self.hasher.hash(secret)?;

        let mut users = self.users.write();
        if users.contains_key(username) {
            return Err(Error::DuplicateUser(username.to_string()));
        }
        users.insert(
            username.to_string(),
            UserCredential {
                username: username.to_string(),
                hashed_secret,
                created_at: Utc::now(),
            },
        );
        drop(users);

        tracing::info!(username, "user registered");
        Ok(())
    }

    /// Check whether a username is registered.
    pub fn user_exists(&self, username: &str) -> bool {
        self.users.read().contains_key(username)
    }

    /// Verify a username/secret pair.
    ///
    /// Unknown users and wrong secrets both return [`Error::AuthFailure`].
    pub fn authenticate(&self, username: &str, secret: &str) -> Result<Identity> {
        self.authentications.fetch_add(1, Ordering::Relaxed);
        let stored = self
            .users
            .read()
            .get(username)
            .map(|user| user.hashed_secret.clone());

        match stored {
            Some(hash) if self.hasher.verify(secret, &hash) => Ok(Identity::new(username)),
            Some(_) => Err(Error::AuthFailure),
            None => {
                let _ = self.hasher.verify(secret, &self.decoy_hash);
                Err(Error::AuthFailure)
            }
        }
    }

    /// Number of credential checks performed, successful or not.
    pub fn authentication_count(&self) -> u64 {
        self.authentications.load(Ordering::Relaxed)
    }

    /// Look up a registered user.
    pub fn get(&self, username: &str) -> Option<UserCredential> {
        self.users.read().get(username).cloned()
    }

    /// All registered usernames, sorted.
    pub fn usernames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.users.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered users.
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    /// Whether no users are registered.
    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("users", &self.len())
            .finish_non_exhaustive()
    }
}
