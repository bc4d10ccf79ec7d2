//! Authenticated encryption using ChaCha20-Poly1305.
//!
//! ChaCha20-Poly1305 provides both confidentiality and authenticity with
//! a 96-bit nonce, matching the nonce recorded in every stored envelope.
//! The detached functions expose ciphertext and nonce separately for the
//! key wrapping unit; `seal`/`open` produce the nonce-prefixed envelope
//! used for file content.

use chacha20poly1305::{
    aead::{generic_array::GenericArray, Aead, AeadCore, KeyInit, OsRng},
    ChaCha20Poly1305,
};

use crate::keys::KEY_LENGTH;
use zerovault_common::{Error, Result};

/// Nonce size for ChaCha20-Poly1305 (12 bytes, 96-bit).
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

fn cipher(key: &[u8]) -> Result<ChaCha20Poly1305> {
    if key.len() != KEY_LENGTH {
        return Err(Error::Crypto(format!(
            "Invalid key length: expected {}, got {}",
            KEY_LENGTH,
            key.len()
        )));
    }
    Ok(ChaCha20Poly1305::new(GenericArray::from_slice(key)))
}

/// Encrypt plaintext, returning ciphertext and the fresh random nonce
/// separately.
///
/// Every call draws a new nonce from the OS secure source; nonce reuse
/// under one key cannot occur by construction.
///
/// # Errors
/// - Returns error if key length is incorrect
/// - Returns error if encryption fails
pub fn encrypt_detached(key: &[u8], plaintext: &[u8]) -> Result<(Vec<u8>, [u8; NONCE_SIZE])> {
    let cipher = cipher(key)?;
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    nonce_bytes.copy_from_slice(&nonce);

    Ok((ciphertext, nonce_bytes))
}

/// Decrypt ciphertext with its recorded nonce.
///
/// # Errors
/// - `Decryption` if the authentication tag fails to verify (tampered
///   data or wrong key)
pub fn decrypt_detached(key: &[u8], nonce: &[u8; NONCE_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher(key)?;

    if ciphertext.len() < TAG_SIZE {
        return Err(Error::Decryption("Ciphertext too short".to_string()));
    }

    cipher
        .decrypt(GenericArray::from_slice(nonce), ciphertext)
        .map_err(|_| Error::Decryption("Authentication failed".to_string()))
}

/// Encrypt plaintext into a nonce-prefixed envelope.
///
/// # Postconditions
/// - Returns nonce || ciphertext || tag
/// - The envelope length is plaintext length + NONCE_SIZE + TAG_SIZE
pub fn seal(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let (ciphertext, nonce) = encrypt_detached(key, plaintext)?;

    let mut envelope = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&ciphertext);

    Ok(envelope)
}

/// Decrypt a nonce-prefixed envelope.
///
/// # Errors
/// - `Decryption` if the envelope is too short or the tag fails to verify
pub fn open(key: &[u8], envelope: &[u8]) -> Result<Vec<u8>> {
    if envelope.len() < NONCE_SIZE + TAG_SIZE {
        return Err(Error::Decryption("Envelope too short".to_string()));
    }

    let (nonce_bytes, ciphertext) = envelope.split_at(NONCE_SIZE);
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(nonce_bytes);

    decrypt_detached(key, &nonce, ciphertext)
}
