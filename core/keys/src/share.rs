//! Share-link key codec.
//!
//! A share link carries the file key in the URL fragment, which browsers
//! never send to any server — that is how decryption capability travels
//! out-of-band from the request that serves the ciphertext. Grammar:
//!
//! ```text
//! key=<base64url>&file=<id>                      plain link
//! file=<id>&pwkey=<base64url>&pwsalt=<base64url> password-gated link
//! ```
//!
//! A gated fragment never contains the plaintext key: `pwkey` is the
//! file key wrapped (nonce || ciphertext) under an Argon2id key derived
//! from the link password and `pwsalt`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use std::collections::HashMap;

use zerovault_common::{Error, FileId, Result};
use zerovault_crypto::{
    derive_key, unwrap_key, wrap_key, FileKey, KdfParams, Salt, WrappedKey, KEY_LENGTH, NONCE_SIZE,
};

/// The key material decoded from a share fragment.
///
/// The file id here is the one the creator bound into the link; callers
/// must check it against the id returned by link resolution before using
/// the key.
#[derive(Debug)]
pub struct DecodedShareLink {
    pub file_id: FileId,
    pub file_key: FileKey,
}

impl DecodedShareLink {
    /// Verify the fragment is bound to the file the link actually
    /// resolves to.
    ///
    /// # Errors
    /// - `KeyBinding` on mismatch; decryption must be refused.
    pub fn verify_binding(&self, resolved: &FileId) -> Result<()> {
        if &self.file_id != resolved {
            return Err(Error::KeyBinding {
                expected: resolved.as_str().to_string(),
                actual: self.file_id.as_str().to_string(),
            });
        }
        Ok(())
    }
}

/// Encode a file key into a plain fragment.
pub fn encode(file_id: &FileId, file_key: &FileKey) -> String {
    format!(
        "key={}&file={}",
        URL_SAFE_NO_PAD.encode(file_key.as_bytes()),
        file_id
    )
}

/// Encode a file key into a password-gated fragment.
///
/// The file key is wrapped under a key derived from `password` and a
/// fresh salt; both the wrapped blob and the salt travel in the
/// fragment, so the password is the only input the consumer needs.
pub fn encode_with_password(
    file_id: &FileId,
    file_key: &FileKey,
    password: &str,
) -> Result<String> {
    let salt = Salt::generate();
    let derived = derive_key(password.as_bytes(), &salt, &KdfParams::interactive())?;
    let wrapped = wrap_key(file_key.as_bytes(), derived.as_bytes())?;

    let mut blob = Vec::with_capacity(NONCE_SIZE + wrapped.ciphertext.len());
    blob.extend_from_slice(&wrapped.nonce);
    blob.extend_from_slice(&wrapped.ciphertext);

    Ok(format!(
        "file={}&pwkey={}&pwsalt={}",
        file_id,
        URL_SAFE_NO_PAD.encode(&blob),
        salt.to_base64()
    ))
}

/// Decode a share fragment back into file id and key.
///
/// No network I/O: everything needed is in the fragment (plus the
/// password for gated links).
///
/// # Errors
/// - `MalformedFragment` if the grammar or any encoding is invalid
/// - `InvalidPassword` if the link is password-gated and the password is
///   missing or wrong — distinct from the other kinds so the UI can ask
///   for the password specifically
pub fn decode(fragment: &str, password: Option<&str>) -> Result<DecodedShareLink> {
    let params = parse_params(fragment)?;

    let file_id = params
        .get("file")
        .ok_or_else(|| Error::MalformedFragment("Missing file id".to_string()))?;
    let file_id = FileId::new(file_id.as_str())
        .map_err(|_| Error::MalformedFragment("Empty file id".to_string()))?;

    match (params.get("key"), params.get("pwkey")) {
        (Some(_), Some(_)) => Err(Error::MalformedFragment(
            "Both plain and password-wrapped key present".to_string(),
        )),
        (Some(key), None) => {
            let file_key = decode_key_bytes(key)?;
            Ok(DecodedShareLink { file_id, file_key })
        }
        (None, Some(pwkey)) => {
            let pwsalt = params
                .get("pwsalt")
                .ok_or_else(|| Error::MalformedFragment("Missing pwsalt".to_string()))?;
            let file_key = unwrap_gated_key(pwkey, pwsalt, password)?;
            Ok(DecodedShareLink { file_id, file_key })
        }
        (None, None) => Err(Error::MalformedFragment(
            "Missing key material".to_string(),
        )),
    }
}

fn parse_params(fragment: &str) -> Result<HashMap<String, String>> {
    let mut params = HashMap::new();
    for pair in fragment.split('&') {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| Error::MalformedFragment(format!("Not a parameter: '{}'", pair)))?;
        if params.insert(name.to_string(), value.to_string()).is_some() {
            return Err(Error::MalformedFragment(format!(
                "Duplicate parameter: '{}'",
                name
            )));
        }
    }
    Ok(params)
}

fn decode_key_bytes(encoded: &str) -> Result<FileKey> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| Error::MalformedFragment(format!("Bad key encoding: {}", e)))?;
    let bytes: [u8; KEY_LENGTH] = bytes
        .try_into()
        .map_err(|v: Vec<u8>| Error::MalformedFragment(format!("Key is {} bytes", v.len())))?;
    Ok(FileKey::from_bytes(bytes))
}

fn unwrap_gated_key(pwkey: &str, pwsalt: &str, password: Option<&str>) -> Result<FileKey> {
    let blob = URL_SAFE_NO_PAD
        .decode(pwkey)
        .map_err(|e| Error::MalformedFragment(format!("Bad pwkey encoding: {}", e)))?;
    if blob.len() <= NONCE_SIZE {
        return Err(Error::MalformedFragment("pwkey too short".to_string()));
    }

    let salt =
        Salt::from_base64(pwsalt).map_err(|_| Error::MalformedFragment("Bad pwsalt".to_string()))?;

    let password = password.ok_or(Error::InvalidPassword)?;
    let derived = derive_key(password.as_bytes(), &salt, &KdfParams::interactive())?;

    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&blob[..NONCE_SIZE]);
    let wrapped = WrappedKey {
        ciphertext: blob[NONCE_SIZE..].to_vec(),
        nonce,
    };

    let key_bytes = unwrap_key(&wrapped, derived.as_bytes()).map_err(|e| match e {
        Error::UnwrapAuthentication => Error::InvalidPassword,
        other => other,
    })?;
    Ok(FileKey::from_bytes(key_bytes))
}
