//! Key service facade.
//!
//! The single entry point the view and API layers talk to. Owns the
//! process-wide key state (master key session, container key cache) as
//! explicit objects and composes the derivation, wrapping, file and
//! share-link modules over the injected collaborators.

use std::sync::Arc;
use tracing::{debug, info};

use zerovault_common::{ContainerId, FileId, Result};
use zerovault_crypto::{derive_key, KdfParams, MasterKey, Salt, WrappedKey};
use zerovault_keystore::{KeyStore, LocalStore, SessionProvider};

use crate::containers::{ContainerKeyManager, ResolvedContainerKey};
use crate::files::{self, EncryptedUpload};
use crate::retry::{retry_transient, RetryConfig};
use crate::session::MasterKeySession;
use crate::share::{self, DecodedShareLink};

/// Client-side key management for the encrypted vault.
pub struct KeyService {
    session_provider: Arc<dyn SessionProvider>,
    key_store: Arc<dyn KeyStore>,
    session: Arc<MasterKeySession>,
    containers: ContainerKeyManager,
    kdf_params: KdfParams,
    retry: RetryConfig,
}

impl KeyService {
    /// Create a service over the given collaborators.
    ///
    /// `local_stores` is the ordered durable-store chain used for reload
    /// survival; the first entry is the primary.
    pub fn new(
        session_provider: Arc<dyn SessionProvider>,
        key_store: Arc<dyn KeyStore>,
        local_stores: Vec<Arc<dyn LocalStore>>,
    ) -> Self {
        let session = Arc::new(MasterKeySession::new(local_stores));
        let containers = ContainerKeyManager::new(
            session.clone(),
            session_provider.clone(),
            key_store.clone(),
        );
        Self {
            session_provider,
            key_store,
            session,
            containers,
            kdf_params: KdfParams::default(),
            retry: RetryConfig::default(),
        }
    }

    /// Override the KDF parameters (e.g. for constrained devices).
    pub fn with_kdf_params(mut self, params: KdfParams) -> Self {
        self.kdf_params = params;
        self
    }

    /// Override the retry configuration for remote key operations.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.containers = self.containers.with_retry(retry.clone());
        self.retry = retry;
        self
    }

    /// Whether a master key is available.
    pub async fn is_unlocked(&self) -> bool {
        self.session.is_unlocked().await
    }

    /// Unlock the session with the vault password.
    ///
    /// Derives the master key from the password and the per-user salt,
    /// stores it for the session, and persists a token-wrapped copy for
    /// reload survival.
    ///
    /// # Errors
    /// - `InvalidSalt` if the server-provided salt is malformed; fatal
    ///   for the session, requires reauthentication
    pub async fn unlock(&self, password: &[u8]) -> Result<MasterKey> {
        let encoded_salt = self.session_provider.master_key_salt().await?;
        let salt = Salt::from_base64(&encoded_salt)?;

        let derived = derive_key(password, &salt, &self.kdf_params)?;
        let master = MasterKey::from_derived(derived);

        self.session.set(master.clone()).await;

        let token = self.session_provider.auth_token().await?;
        self.session.persist(&master, &token).await?;

        info!("Session unlocked");
        Ok(master)
    }

    /// Try to restore the session after a reload.
    ///
    /// Returns `false` when no usable persisted copy exists; the caller
    /// handles that by prompting for the password.
    pub async fn try_restore(&self) -> Result<bool> {
        let token = self.session_provider.auth_token().await?;
        let restored = self.session.restore(&token).await?.is_some();
        debug!("Session restore attempted, restored={}", restored);
        Ok(restored)
    }

    /// Lock the session: clears the master key (memory and durable
    /// copies) and every cached container key.
    pub async fn lock(&self) -> Result<()> {
        self.session.clear().await?;
        self.containers.clear().await;
        info!("Session locked");
        Ok(())
    }

    /// Resolve the content key for a container.
    ///
    /// Callers must surface a data-loss warning when the origin is
    /// `Recovered`.
    pub async fn resolve_container_key(
        &self,
        container: &ContainerId,
    ) -> Result<ResolvedContainerKey> {
        self.containers.resolve(container).await
    }

    /// Encrypt content for upload into a container.
    pub async fn encrypt_upload(
        &self,
        container: &ContainerId,
        plaintext: &[u8],
    ) -> Result<EncryptedUpload> {
        let resolved = self.containers.resolve(container).await?;
        files::encrypt_for_upload(&resolved.key, plaintext)
    }

    /// Record the wrapped file key once the server has assigned the
    /// uploaded file its id.
    pub async fn commit_file_key(&self, file: &FileId, wrapped: &WrappedKey) -> Result<()> {
        retry_transient(&self.retry, || self.key_store.store_file_key(file, wrapped)).await
    }

    /// Decrypt a downloaded content envelope.
    pub async fn download(
        &self,
        file: &FileId,
        container: &ContainerId,
        envelope: &[u8],
    ) -> Result<Vec<u8>> {
        let resolved = self.containers.resolve(container).await?;
        let wrapped = retry_transient(&self.retry, || self.key_store.fetch_file_key(file)).await?;
        files::decrypt_download(&resolved.key, &wrapped, envelope)
    }

    /// Recover the plaintext file key for a file, e.g. to mint a share
    /// link.
    pub async fn file_key(
        &self,
        file: &FileId,
        container: &ContainerId,
    ) -> Result<zerovault_crypto::FileKey> {
        let resolved = self.containers.resolve(container).await?;
        let wrapped = retry_transient(&self.retry, || self.key_store.fetch_file_key(file)).await?;
        files::unwrap_file_key(&resolved.key, &wrapped)
    }

    /// Create a share-link fragment for a file, optionally
    /// password-gated.
    pub fn create_share_link(
        &self,
        file: &FileId,
        file_key: &zerovault_crypto::FileKey,
        password: Option<&str>,
    ) -> Result<String> {
        match password {
            Some(password) => share::encode_with_password(file, file_key, password),
            None => Ok(share::encode(file, file_key)),
        }
    }

    /// Open a share-link fragment.
    ///
    /// `resolved_file` is the id returned by the (unauthenticated) link
    /// metadata lookup; the decoded key is only returned when the
    /// fragment is bound to that exact file.
    pub fn open_share_link(
        &self,
        fragment: &str,
        resolved_file: &FileId,
        password: Option<&str>,
    ) -> Result<DecodedShareLink> {
        let decoded = share::decode(fragment, password)?;
        decoded.verify_binding(resolved_file)?;
        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::KeyOrigin;
    use zerovault_common::{AuthToken, Error, UserId};
    use zerovault_crypto::{wrap_key, ContainerKey, KEY_LENGTH};
    use zerovault_keystore::{MemoryKeyStore, MemoryLocalStore, StaticSession};

    struct Fixture {
        provider: Arc<StaticSession>,
        key_store: Arc<MemoryKeyStore>,
        local_store: Arc<MemoryLocalStore>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                provider: Arc::new(StaticSession::new(
                    AuthToken::new("token-1").unwrap(),
                    UserId::new("alice").unwrap(),
                    Salt::from_bytes([42u8; 32]).to_base64(),
                )),
                key_store: Arc::new(MemoryKeyStore::new()),
                local_store: Arc::new(MemoryLocalStore::new()),
            }
        }

        fn service(&self) -> KeyService {
            KeyService::new(
                self.provider.clone(),
                self.key_store.clone(),
                vec![self.local_store.clone()],
            )
            .with_kdf_params(KdfParams::moderate())
        }
    }

    #[tokio::test]
    async fn test_unlock_with_malformed_salt_is_fatal() {
        let fixture = Fixture::new();
        let provider = Arc::new(StaticSession::new(
            AuthToken::new("token-1").unwrap(),
            UserId::new("alice").unwrap(),
            "!!!not-base64!!!",
        ));
        let service = KeyService::new(
            provider,
            fixture.key_store.clone(),
            vec![fixture.local_store.clone()],
        );

        let err = service.unlock(b"password").await.unwrap_err();
        assert!(matches!(err, Error::InvalidSalt(_)));
        assert!(!service.is_unlocked().await);
    }

    #[tokio::test]
    async fn test_upload_requires_unlock() {
        let fixture = Fixture::new();
        let service = fixture.service();
        let container = ContainerId::new("c1").unwrap();

        let err = service.encrypt_upload(&container, b"data").await.unwrap_err();
        assert!(matches!(err, Error::MasterKeyRequired));
    }

    #[tokio::test]
    async fn test_scenario_upload_logout_login_download() {
        let fixture = Fixture::new();
        let container = ContainerId::new("c1").unwrap();
        let file = FileId::new("f1").unwrap();
        let content = vec![0xC3u8; 2 * 1024 * 1024]; // multi-chunk sized

        let service = fixture.service();
        service.unlock(b"correct horse").await.unwrap();

        let upload = service.encrypt_upload(&container, &content).await.unwrap();
        service
            .commit_file_key(&file, &upload.wrapped_file_key)
            .await
            .unwrap();

        service.lock().await.unwrap();
        let err = service
            .download(&file, &container, &upload.envelope)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MasterKeyRequired));

        // Log back in with the correct password
        service.unlock(b"correct horse").await.unwrap();
        let downloaded = service
            .download(&file, &container, &upload.envelope)
            .await
            .unwrap();
        assert_eq!(downloaded, content);
    }

    #[tokio::test]
    async fn test_scenario_foreign_envelope_recovers_and_warns() {
        let fixture = Fixture::new();
        let container = ContainerId::new("c1").unwrap();

        // A container key wrapped under someone else's master key
        let foreign_master = MasterKey::from_bytes([9u8; KEY_LENGTH]);
        let old_key = ContainerKey::generate();
        let wrapped = wrap_key(old_key.as_bytes(), foreign_master.as_bytes()).unwrap();
        fixture
            .key_store
            .store_container_key(&container, &UserId::new("alice").unwrap(), &wrapped)
            .await
            .unwrap();

        let service = fixture.service();
        service.unlock(b"password").await.unwrap();

        let resolved = service.resolve_container_key(&container).await.unwrap();
        assert_eq!(resolved.origin, KeyOrigin::Recovered);

        // New uploads succeed under the replacement key
        let file = FileId::new("f1").unwrap();
        let upload = service.encrypt_upload(&container, b"fresh data").await.unwrap();
        service
            .commit_file_key(&file, &upload.wrapped_file_key)
            .await
            .unwrap();
        let downloaded = service
            .download(&file, &container, &upload.envelope)
            .await
            .unwrap();
        assert_eq!(downloaded, b"fresh data");
    }

    #[tokio::test]
    async fn test_reload_survival() {
        let fixture = Fixture::new();
        let container = ContainerId::new("c1").unwrap();
        let file = FileId::new("f1").unwrap();

        let service = fixture.service();
        service.unlock(b"password").await.unwrap();
        let upload = service.encrypt_upload(&container, b"survives").await.unwrap();
        service
            .commit_file_key(&file, &upload.wrapped_file_key)
            .await
            .unwrap();

        // Same collaborators, fresh process state: a page reload
        let reloaded = fixture.service();
        assert!(reloaded.try_restore().await.unwrap());
        assert!(reloaded.is_unlocked().await);

        let downloaded = reloaded
            .download(&file, &container, &upload.envelope)
            .await
            .unwrap();
        assert_eq!(downloaded, b"survives");
    }

    #[tokio::test]
    async fn test_restore_after_token_rotation_requires_password() {
        let fixture = Fixture::new();

        let service = fixture.service();
        service.unlock(b"password").await.unwrap();

        fixture
            .provider
            .set_auth_token(AuthToken::new("token-2").unwrap())
            .await;

        let reloaded = fixture.service();
        assert!(!reloaded.try_restore().await.unwrap());
        assert!(!reloaded.is_unlocked().await);
    }

    #[tokio::test]
    async fn test_share_link_flow() {
        let fixture = Fixture::new();
        let container = ContainerId::new("c1").unwrap();
        let file = FileId::new("f1").unwrap();

        let service = fixture.service();
        service.unlock(b"password").await.unwrap();

        let upload = service.encrypt_upload(&container, b"shared bytes").await.unwrap();
        service
            .commit_file_key(&file, &upload.wrapped_file_key)
            .await
            .unwrap();

        let file_key = service.file_key(&file, &container).await.unwrap();
        let fragment = service.create_share_link(&file, &file_key, None).unwrap();

        // Recipient side: binding must match the resolved link target
        let other = FileId::new("f2").unwrap();
        let err = service.open_share_link(&fragment, &other, None).unwrap_err();
        assert!(matches!(err, Error::KeyBinding { .. }));

        let opened = service.open_share_link(&fragment, &file, None).unwrap();
        let plaintext =
            zerovault_crypto::open(opened.file_key.as_bytes(), &upload.envelope).unwrap();
        assert_eq!(plaintext, b"shared bytes");
    }
}
