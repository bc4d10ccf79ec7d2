//! Key types with secure memory handling.
//!
//! All key types automatically zeroize their memory on drop to prevent
//! sensitive data from persisting in memory. The hierarchy has three
//! levels: the master key (derived from the password) wraps container
//! keys, and each container key wraps the file keys of its files.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use zerovault_common::Error;

/// Length of encryption keys in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Length of the key derivation salt in bytes.
pub const SALT_LENGTH: usize = 32;

/// Raw output of a key derivation.
///
/// Intermediate type between the KDF and the typed keys of the hierarchy;
/// also used directly as the wrapping key for share-link passwords and
/// session tokens.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; KEY_LENGTH],
}

impl DerivedKey {
    /// Create from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerivedKey([REDACTED])")
    }
}

/// Master key derived from the user password.
///
/// Root of the key hierarchy; wraps container keys. Never serialized in
/// plaintext and never sent anywhere.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    key: [u8; KEY_LENGTH],
}

impl MasterKey {
    /// Create a master key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Take ownership of a derivation output as the master key.
    pub fn from_derived(derived: DerivedKey) -> Self {
        Self { key: *derived.as_bytes() }
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }

    /// Constant-time equality check.
    pub fn ct_eq(&self, other: &MasterKey) -> bool {
        self.key.ct_eq(&other.key).into()
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasterKey([REDACTED])")
    }
}

/// Key encrypting all file keys within one container.
///
/// One per container; wrapped once per authorized user under that user's
/// master key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ContainerKey {
    key: [u8; KEY_LENGTH],
}

impl ContainerKey {
    /// Create a container key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }

    /// Generate a random container key.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut key = [0u8; KEY_LENGTH];
        rand::thread_rng().fill_bytes(&mut key);
        Self { key }
    }
}

impl fmt::Debug for ContainerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContainerKey([REDACTED])")
    }
}

/// Key encrypting one file's content.
///
/// Fresh per file revision; wrapped under exactly one container key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct FileKey {
    key: [u8; KEY_LENGTH],
}

impl FileKey {
    /// Create a file key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }

    /// Generate a random file key.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut key = [0u8; KEY_LENGTH];
        rand::thread_rng().fill_bytes(&mut key);
        Self { key }
    }

    /// Constant-time equality check.
    pub fn ct_eq(&self, other: &FileKey) -> bool {
        self.key.ct_eq(&other.key).into()
    }
}

impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileKey([REDACTED])")
    }
}

/// Salt for key derivation.
///
/// Generated once per user, stored server-side, and returned on every
/// login. Public, but must stay stable or previously wrapped keys become
/// unrecoverable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salt(pub [u8; SALT_LENGTH]);

impl Salt {
    /// Generate a random salt.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut salt = [0u8; SALT_LENGTH];
        rand::thread_rng().fill_bytes(&mut salt);
        Self(salt)
    }

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; SALT_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parse the base64url transport form the server returns at login.
    ///
    /// # Errors
    /// - `InvalidSalt` if the encoding is invalid or the length is wrong.
    ///   This is fatal for the session and requires reauthentication.
    pub fn from_base64(encoded: &str) -> zerovault_common::Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| Error::InvalidSalt(format!("bad encoding: {}", e)))?;
        let bytes: [u8; SALT_LENGTH] = bytes.try_into().map_err(|v: Vec<u8>| {
            Error::InvalidSalt(format!("expected {} bytes, got {}", SALT_LENGTH, v.len()))
        })?;
        Ok(Self(bytes))
    }

    /// Encode to the base64url transport form.
    pub fn to_base64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    /// Get the salt bytes.
    pub fn as_bytes(&self) -> &[u8; SALT_LENGTH] {
        &self.0
    }
}
