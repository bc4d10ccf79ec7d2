//! Key wrapping: encrypting one key under another.
//!
//! Both levels of the hierarchy go through here — container keys wrapped
//! under the master key, file keys wrapped under a container key — as
//! does the session-persisted master key. The envelope keeps ciphertext
//! and nonce as separate fields because that is the shape the key store
//! and the durable session store record.

use serde::{Deserialize, Serialize};

use crate::aead::{decrypt_detached, encrypt_detached, NONCE_SIZE, TAG_SIZE};
use crate::keys::KEY_LENGTH;
use zerovault_common::{Error, Result};

/// A key encrypted under another key, with the nonce that produced it.
///
/// Opaque to everything except this module; stored server-side as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey {
    /// Ciphertext plus authentication tag.
    pub ciphertext: Vec<u8>,
    /// The nonce drawn for this wrap call.
    pub nonce: [u8; NONCE_SIZE],
}

/// Wrap a content key under a wrapping key.
///
/// Every call draws a fresh random nonce; wrapping the same key twice
/// yields two different envelopes.
pub fn wrap_key(key: &[u8; KEY_LENGTH], wrapping: &[u8; KEY_LENGTH]) -> Result<WrappedKey> {
    let (ciphertext, nonce) = encrypt_detached(wrapping, key)?;
    Ok(WrappedKey { ciphertext, nonce })
}

/// Unwrap a content key.
///
/// # Errors
/// - `UnwrapAuthentication` if the integrity tag fails to verify: the
///   wrapping key is wrong. Callers use this signal to drive the
///   container re-keying policy.
/// - `Crypto` if the envelope is structurally invalid for a wrapped key.
pub fn unwrap_key(wrapped: &WrappedKey, wrapping: &[u8; KEY_LENGTH]) -> Result<[u8; KEY_LENGTH]> {
    if wrapped.ciphertext.len() != KEY_LENGTH + TAG_SIZE {
        return Err(Error::Crypto(format!(
            "Wrapped key has unexpected length: {}",
            wrapped.ciphertext.len()
        )));
    }

    let plaintext = decrypt_detached(wrapping, &wrapped.nonce, &wrapped.ciphertext)
        .map_err(|_| Error::UnwrapAuthentication)?;

    let mut key = [0u8; KEY_LENGTH];
    key.copy_from_slice(&plaintext);
    Ok(key)
}
