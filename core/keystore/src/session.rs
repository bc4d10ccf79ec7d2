//! Session/auth collaborator interface.
//!
//! The authentication subsystem is out of scope here; key management
//! only needs three things from it: the current token, the current user,
//! and the per-user derivation salt handed out at login.

use async_trait::async_trait;
use tokio::sync::RwLock;

use zerovault_common::{AuthToken, Result, UserId};

/// Access to the authenticated session.
///
/// The salt is returned in its base64url transport form; parsing and
/// validation happen at the point of derivation so a malformed value
/// surfaces as `InvalidSalt` there.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Current authentication token.
    async fn auth_token(&self) -> Result<AuthToken>;

    /// Identity of the authenticated user.
    async fn current_user(&self) -> Result<UserId>;

    /// The per-user master key salt, base64url-encoded, as returned by
    /// the server at login.
    async fn master_key_salt(&self) -> Result<String>;
}

/// Fixed-value session provider for tests and embedding.
///
/// The token can be swapped to simulate rotation.
pub struct StaticSession {
    token: RwLock<AuthToken>,
    user: UserId,
    salt: String,
}

impl StaticSession {
    /// Create a session with the given token, user and encoded salt.
    pub fn new(token: AuthToken, user: UserId, salt: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(token),
            user,
            salt: salt.into(),
        }
    }

    /// Replace the authentication token (e.g. simulating re-login).
    pub async fn set_auth_token(&self, token: AuthToken) {
        *self.token.write().await = token;
    }
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn auth_token(&self) -> Result<AuthToken> {
        Ok(self.token.read().await.clone())
    }

    async fn current_user(&self) -> Result<UserId> {
        Ok(self.user.clone())
    }

    async fn master_key_salt(&self) -> Result<String> {
        Ok(self.salt.clone())
    }
}
