//! Master key session store.
//!
//! Holds the decrypted master key for the lifetime of the session and
//! supports reload survival: a copy wrapped under a key derived from the
//! current authentication token is kept in durable storage, so a page
//! reload can restore the session without reprompting for the password.
//! The plaintext master key never reaches any store.

use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use zerovault_common::{AuthToken, Error, Result};
use zerovault_crypto::{derive_token_key, unwrap_key, wrap_key, MasterKey, WrappedKey};
use zerovault_keystore::LocalStore;

/// Storage key for the session-wrapped master key entry.
const MASTER_KEY_ENTRY: &str = "zerovault.master-key";

/// Process-wide session store for the master key.
///
/// Restore consults an ordered chain of durable stores (primary first,
/// legacy fallbacks after); persist always writes to the primary. All
/// mutation goes through these methods so the single-in-flight-restore
/// invariant holds.
pub struct MasterKeySession {
    key: RwLock<Option<MasterKey>>,
    stores: Vec<Arc<dyn LocalStore>>,
    restore_lock: Mutex<()>,
}

impl MasterKeySession {
    /// Create a session store over an ordered chain of durable stores.
    ///
    /// The first store is the primary: `persist` writes only there.
    pub fn new(stores: Vec<Arc<dyn LocalStore>>) -> Self {
        Self {
            key: RwLock::new(None),
            stores,
            restore_lock: Mutex::new(()),
        }
    }

    /// Get the master key, if the session is unlocked.
    pub async fn get(&self) -> Option<MasterKey> {
        self.key.read().await.clone()
    }

    /// Set the in-memory master key.
    pub async fn set(&self, key: MasterKey) {
        *self.key.write().await = Some(key);
    }

    /// Whether a master key is currently available.
    pub async fn is_unlocked(&self) -> bool {
        self.key.read().await.is_some()
    }

    /// Clear the session: drops the in-memory key (zeroized on drop) and
    /// removes every persisted copy.
    pub async fn clear(&self) -> Result<()> {
        *self.key.write().await = None;
        for store in &self.stores {
            store.remove(MASTER_KEY_ENTRY).await?;
        }
        Ok(())
    }

    /// Persist the master key wrapped under the session token.
    ///
    /// The entry becomes invalid the moment the token rotates; `restore`
    /// treats that as a normal miss.
    pub async fn persist(&self, key: &MasterKey, token: &AuthToken) -> Result<()> {
        let token_key = derive_token_key(token.as_bytes());
        let wrapped = wrap_key(key.as_bytes(), token_key.as_bytes())?;

        let bytes = serde_json::to_vec(&wrapped)
            .map_err(|e| Error::Serialization(format!("Wrapped master key: {}", e)))?;

        let primary = self
            .stores
            .first()
            .ok_or_else(|| Error::Storage("No durable store configured".to_string()))?;
        primary.put(MASTER_KEY_ENTRY, bytes).await
    }

    /// Restore the master key from durable storage.
    ///
    /// Returns `Ok(None)` — never an error — when no entry exists, an
    /// entry cannot be decoded, or the token has rotated since it was
    /// written; the caller handles absence by prompting for the
    /// password. Safe under concurrent invocation: a single in-flight
    /// restore runs at a time, and later callers observe its result.
    pub async fn restore(&self, token: &AuthToken) -> Result<Option<MasterKey>> {
        if let Some(key) = self.get().await {
            return Ok(Some(key));
        }

        let _guard = self.restore_lock.lock().await;

        // Another restore may have completed while we waited.
        if let Some(key) = self.get().await {
            return Ok(Some(key));
        }

        let token_key = derive_token_key(token.as_bytes());

        for store in &self.stores {
            let Some(bytes) = store.get(MASTER_KEY_ENTRY).await? else {
                continue;
            };

            let wrapped: WrappedKey = match serde_json::from_slice(&bytes) {
                Ok(wrapped) => wrapped,
                Err(e) => {
                    warn!("Discarding undecodable persisted master key: {}", e);
                    store.remove(MASTER_KEY_ENTRY).await?;
                    continue;
                }
            };

            match unwrap_key(&wrapped, token_key.as_bytes()) {
                Ok(key_bytes) => {
                    let key = MasterKey::from_bytes(key_bytes);
                    *self.key.write().await = Some(key.clone());
                    debug!("Master key restored from durable storage");
                    return Ok(Some(key));
                }
                Err(Error::UnwrapAuthentication) => {
                    warn!("Persisted master key was wrapped under a rotated token, discarding");
                    store.remove(MASTER_KEY_ENTRY).await?;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }
}
