//! Per-file content encryption.
//!
//! Every upload gets a fresh file key; the content is sealed into a
//! nonce-prefixed envelope under that key, and the key itself is wrapped
//! under the container key. No network I/O happens here — storing the
//! envelope and the wrapped key is the caller's business.

use zerovault_common::{Error, Result};
use zerovault_crypto::{aead, unwrap_key, wrap_key, ContainerKey, FileKey, WrappedKey};

/// Output of encrypting a file for upload.
#[derive(Debug)]
pub struct EncryptedUpload {
    /// Nonce-prefixed authenticated ciphertext of the content.
    pub envelope: Vec<u8>,
    /// The file key wrapped under the container key.
    pub wrapped_file_key: WrappedKey,
}

/// Encrypt file content with a fresh file key.
///
/// A new file key is generated per call, so a key/nonce pair is never
/// reused across distinct plaintexts.
pub fn encrypt_for_upload(container_key: &ContainerKey, plaintext: &[u8]) -> Result<EncryptedUpload> {
    let file_key = FileKey::generate();
    let envelope = aead::seal(file_key.as_bytes(), plaintext)?;
    let wrapped_file_key = wrap_key(file_key.as_bytes(), container_key.as_bytes())?;

    Ok(EncryptedUpload {
        envelope,
        wrapped_file_key,
    })
}

/// Decrypt downloaded file content.
///
/// # Errors
/// - `Decryption` if either the key unwrap or the content decryption
///   fails. Fatal for this operation; retrying with identical inputs
///   cannot succeed.
pub fn decrypt_download(
    container_key: &ContainerKey,
    wrapped_file_key: &WrappedKey,
    envelope: &[u8],
) -> Result<Vec<u8>> {
    let key_bytes = unwrap_key(wrapped_file_key, container_key.as_bytes())
        .map_err(|_| Error::Decryption("File key unwrap failed".to_string()))?;
    let file_key = FileKey::from_bytes(key_bytes);

    aead::open(file_key.as_bytes(), envelope)
}

/// Unwrap a file key under its container key.
///
/// Used when the plaintext file key itself is needed, e.g. to mint a
/// share link.
pub fn unwrap_file_key(container_key: &ContainerKey, wrapped: &WrappedKey) -> Result<FileKey> {
    let key_bytes = unwrap_key(wrapped, container_key.as_bytes())?;
    Ok(FileKey::from_bytes(key_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerovault_crypto::{NONCE_SIZE, TAG_SIZE};

    #[test]
    fn test_upload_download_roundtrip() {
        let container_key = ContainerKey::generate();
        let plaintext = b"file content";

        let upload = encrypt_for_upload(&container_key, plaintext).unwrap();
        let decrypted =
            decrypt_download(&container_key, &upload.wrapped_file_key, &upload.envelope).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_empty_file_roundtrip() {
        let container_key = ContainerKey::generate();

        let upload = encrypt_for_upload(&container_key, b"").unwrap();
        assert_eq!(upload.envelope.len(), NONCE_SIZE + TAG_SIZE);

        let decrypted =
            decrypt_download(&container_key, &upload.wrapped_file_key, &upload.envelope).unwrap();
        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_fresh_file_key_per_upload() {
        let container_key = ContainerKey::generate();
        let plaintext = b"same content";

        let up1 = encrypt_for_upload(&container_key, plaintext).unwrap();
        let up2 = encrypt_for_upload(&container_key, plaintext).unwrap();

        assert_ne!(up1.envelope, up2.envelope);
        assert_ne!(up1.wrapped_file_key, up2.wrapped_file_key);

        // Both stay independently decryptable
        assert_eq!(
            decrypt_download(&container_key, &up1.wrapped_file_key, &up1.envelope).unwrap(),
            plaintext
        );
        assert_eq!(
            decrypt_download(&container_key, &up2.wrapped_file_key, &up2.envelope).unwrap(),
            plaintext
        );
    }

    #[test]
    fn test_wrong_container_key_is_decryption_error() {
        let container_key = ContainerKey::generate();
        let other_key = ContainerKey::generate();

        let upload = encrypt_for_upload(&container_key, b"secret").unwrap();
        let result = decrypt_download(&other_key, &upload.wrapped_file_key, &upload.envelope);

        assert!(matches!(result, Err(Error::Decryption(_))));
    }

    #[test]
    fn test_tampered_envelope_is_decryption_error() {
        let container_key = ContainerKey::generate();

        let mut upload = encrypt_for_upload(&container_key, b"secret data").unwrap();
        let last = upload.envelope.len() - 1;
        upload.envelope[last] ^= 0x01;

        let result = decrypt_download(&container_key, &upload.wrapped_file_key, &upload.envelope);
        assert!(matches!(result, Err(Error::Decryption(_))));
    }

    #[test]
    fn test_unwrap_file_key_matches_upload() {
        let container_key = ContainerKey::generate();
        let plaintext = b"content";

        let upload = encrypt_for_upload(&container_key, plaintext).unwrap();
        let file_key = unwrap_file_key(&container_key, &upload.wrapped_file_key).unwrap();

        // The recovered key opens the envelope directly
        let decrypted = zerovault_crypto::open(file_key.as_bytes(), &upload.envelope).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_large_file_roundtrip() {
        let container_key = ContainerKey::generate();
        let plaintext = vec![0x5Au8; 3 * 1024 * 1024]; // 3 MB

        let upload = encrypt_for_upload(&container_key, &plaintext).unwrap();
        let decrypted =
            decrypt_download(&container_key, &upload.wrapped_file_key, &upload.envelope).unwrap();

        assert_eq!(decrypted, plaintext);
    }
}
