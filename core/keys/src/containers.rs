//! Container key resolution, creation, caching and recovery.
//!
//! One content key exists per container; each authorized user holds a
//! copy wrapped under their master key in the remote key store. The
//! manager caches unwrapped keys per container and collapses concurrent
//! resolutions for one container into a single fetch/unwrap/create
//! sequence, so two racing callers can never mint divergent keys.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use zerovault_common::{ContainerId, Error, Result};
use zerovault_crypto::{unwrap_key, wrap_key, ContainerKey};
use zerovault_keystore::{KeyStore, SessionProvider};

use crate::retry::{retry_transient, RetryConfig};
use crate::session::MasterKeySession;

/// How a resolved container key was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrigin {
    /// Returned from the in-memory cache.
    Cached,
    /// Unwrapped from the stored envelope.
    Unwrapped,
    /// No envelope existed; a fresh key was created and stored.
    Created,
    /// The stored envelope failed authentication and was replaced with a
    /// fresh key. Content encrypted under the previous key is no longer
    /// recoverable; callers must surface a data-loss warning.
    Recovered,
}

/// Result of a container key resolution.
#[derive(Debug)]
pub struct ResolvedContainerKey {
    pub key: ContainerKey,
    pub origin: KeyOrigin,
}

/// Resolves, creates and caches per-container content keys.
pub struct ContainerKeyManager {
    session: Arc<MasterKeySession>,
    session_provider: Arc<dyn SessionProvider>,
    key_store: Arc<dyn KeyStore>,
    cache: Mutex<HashMap<ContainerId, ContainerKey>>,
    inflight: Mutex<HashMap<ContainerId, Arc<Mutex<()>>>>,
    retry: RetryConfig,
}

impl ContainerKeyManager {
    /// Create a manager over the given collaborators.
    pub fn new(
        session: Arc<MasterKeySession>,
        session_provider: Arc<dyn SessionProvider>,
        key_store: Arc<dyn KeyStore>,
    ) -> Self {
        Self {
            session,
            session_provider,
            key_store,
            cache: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
            retry: RetryConfig::default(),
        }
    }

    /// Override the retry configuration for remote fetches.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Resolve the content key for a container.
    ///
    /// Cached keys are returned immediately. Otherwise the stored
    /// envelope is fetched and unwrapped under the master key; a missing
    /// envelope produces a fresh key, and an envelope that fails
    /// authentication is replaced per the availability-over-data
    /// recovery policy (origin `Recovered`).
    ///
    /// # Errors
    /// - `MasterKeyRequired` if the session is locked
    /// - `KeyFetch` if the remote store stays unreachable through retries
    pub async fn resolve(&self, container: &ContainerId) -> Result<ResolvedContainerKey> {
        if let Some(key) = self.cache.lock().await.get(container) {
            return Ok(ResolvedContainerKey {
                key: key.clone(),
                origin: KeyOrigin::Cached,
            });
        }

        // One resolution sequence per container id at a time.
        let gate = {
            let mut inflight = self.inflight.lock().await;
            inflight
                .entry(container.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = gate.lock().await;

        // A resolution that held the gate before us may have filled the
        // cache already.
        if let Some(key) = self.cache.lock().await.get(container) {
            return Ok(ResolvedContainerKey {
                key: key.clone(),
                origin: KeyOrigin::Cached,
            });
        }

        let result = self.resolve_uncached(container).await;

        self.inflight.lock().await.remove(container);
        result
    }

    async fn resolve_uncached(&self, container: &ContainerId) -> Result<ResolvedContainerKey> {
        let master = self.session.get().await.ok_or(Error::MasterKeyRequired)?;

        let envelope = retry_transient(&self.retry, || {
            self.key_store.fetch_container_key(container)
        })
        .await?;

        match envelope {
            None => {
                debug!("No container key envelope for {}, creating", container);
                let key = self.create_and_store(container, &master).await?;
                Ok(ResolvedContainerKey {
                    key,
                    origin: KeyOrigin::Created,
                })
            }
            Some(wrapped) => match unwrap_key(&wrapped, master.as_bytes()) {
                Ok(key_bytes) => {
                    let key = ContainerKey::from_bytes(key_bytes);
                    self.cache
                        .lock()
                        .await
                        .insert(container.clone(), key.clone());
                    Ok(ResolvedContainerKey {
                        key,
                        origin: KeyOrigin::Unwrapped,
                    })
                }
                Err(Error::UnwrapAuthentication) => {
                    warn!(
                        "Container key envelope for {} failed authentication; re-keying. \
                         Content under the previous key is no longer recoverable",
                        container
                    );
                    let key = self.create_and_store(container, &master).await?;
                    Ok(ResolvedContainerKey {
                        key,
                        origin: KeyOrigin::Recovered,
                    })
                }
                Err(e) => Err(e),
            },
        }
    }

    async fn create_and_store(
        &self,
        container: &ContainerId,
        master: &zerovault_crypto::MasterKey,
    ) -> Result<ContainerKey> {
        let key = ContainerKey::generate();
        let wrapped = wrap_key(key.as_bytes(), master.as_bytes())?;
        let user = self.session_provider.current_user().await?;

        retry_transient(&self.retry, || {
            self.key_store.store_container_key(container, &user, &wrapped)
        })
        .await?;

        self.cache
            .lock()
            .await
            .insert(container.clone(), key.clone());
        info!("Container key created and stored for {}", container);
        Ok(key)
    }

    /// Drop one container's cached key.
    pub async fn forget(&self, container: &ContainerId) {
        self.cache.lock().await.remove(container);
    }

    /// Drop every cached key (logout/lock).
    pub async fn clear(&self) {
        self.cache.lock().await.clear();
    }
}
