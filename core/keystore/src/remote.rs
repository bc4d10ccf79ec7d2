//! Remote wrapped-key store collaborator.
//!
//! The server stores one wrapped container key per (user, container) and
//! one wrapped file key per file. Envelopes are opaque to it; transport
//! failures surface as the transient `KeyFetch` kind so callers can
//! retry.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use zerovault_common::{ContainerId, Error, FileId, Result, UserId};
use zerovault_crypto::WrappedKey;

/// Remote store for wrapped-key envelopes.
///
/// The authenticated user is implicit in the connection, so container
/// fetches are keyed by container id alone.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Fetch the wrapped container key for the current user, if one has
    /// been created.
    async fn fetch_container_key(&self, container: &ContainerId) -> Result<Option<WrappedKey>>;

    /// Store (or overwrite) the wrapped container key for a user.
    async fn store_container_key(
        &self,
        container: &ContainerId,
        user: &UserId,
        wrapped: &WrappedKey,
    ) -> Result<()>;

    /// Fetch the wrapped file key recorded alongside file metadata.
    async fn fetch_file_key(&self, file: &FileId) -> Result<WrappedKey>;

    /// Store the wrapped file key for a file.
    async fn store_file_key(&self, file: &FileId, wrapped: &WrappedKey) -> Result<()>;
}

/// In-memory key store.
///
/// Useful for testing and development. All envelopes are stored in
/// memory and lost on drop. Write counts are tracked so tests can assert
/// that concurrent resolution collapses into a single creation.
pub struct MemoryKeyStore {
    container_keys: Arc<RwLock<HashMap<String, (UserId, WrappedKey)>>>,
    file_keys: Arc<RwLock<HashMap<String, WrappedKey>>>,
    container_writes: AtomicUsize,
}

impl MemoryKeyStore {
    /// Create a new empty key store.
    pub fn new() -> Self {
        Self {
            container_keys: Arc::new(RwLock::new(HashMap::new())),
            file_keys: Arc::new(RwLock::new(HashMap::new())),
            container_writes: AtomicUsize::new(0),
        }
    }

    /// Number of container-key writes observed.
    pub fn container_writes(&self) -> usize {
        self.container_writes.load(Ordering::SeqCst)
    }
}

impl Default for MemoryKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn fetch_container_key(&self, container: &ContainerId) -> Result<Option<WrappedKey>> {
        let keys = self.container_keys.read().unwrap();
        Ok(keys.get(container.as_str()).map(|(_, w)| w.clone()))
    }

    async fn store_container_key(
        &self,
        container: &ContainerId,
        user: &UserId,
        wrapped: &WrappedKey,
    ) -> Result<()> {
        self.container_writes.fetch_add(1, Ordering::SeqCst);
        self.container_keys
            .write()
            .unwrap()
            .insert(container.as_str().to_string(), (user.clone(), wrapped.clone()));
        Ok(())
    }

    async fn fetch_file_key(&self, file: &FileId) -> Result<WrappedKey> {
        self.file_keys
            .read()
            .unwrap()
            .get(file.as_str())
            .cloned()
            .ok_or_else(|| Error::KeyFetch(format!("No wrapped key for file {}", file)))
    }

    async fn store_file_key(&self, file: &FileId, wrapped: &WrappedKey) -> Result<()> {
        self.file_keys
            .write()
            .unwrap()
            .insert(file.as_str().to_string(), wrapped.clone());
        Ok(())
    }
}
