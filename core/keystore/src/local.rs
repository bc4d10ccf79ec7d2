//! Durable per-origin key/value store collaborator.
//!
//! Holds exactly one thing for this subsystem: the session-wrapped
//! master key that lets an unlocked session survive a reload. Several
//! implementations can be chained (durable store, legacy flat store);
//! the session store consults them in order.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use zerovault_common::Result;

/// Durable, origin-scoped key/value store.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Read a value, `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a value, replacing any existing one.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Remove a value. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory local store.
///
/// Useful for testing and development; "durable" only for the lifetime
/// of the process.
pub struct MemoryLocalStore {
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryLocalStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryLocalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalStore for MemoryLocalStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.entries.write().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().unwrap().remove(key);
        Ok(())
    }
}
