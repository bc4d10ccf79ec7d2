//! Common error types for ZeroVault.
//!
//! Every failure a caller can act on has its own variant, so UI layers can
//! choose behavior (reprompt, retry, warn) without string matching.

use thiserror::Error;

/// Top-level error type for ZeroVault operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The per-user derivation salt is malformed. Fatal for the session;
    /// the caller must reauthenticate to obtain a fresh salt.
    #[error("Invalid master key salt: {0}")]
    InvalidSalt(String),

    /// No master key is available for the session. Recoverable by
    /// prompting the user to unlock with their password.
    #[error("Master key required: session is locked")]
    MasterKeyRequired,

    /// An unwrap failed authentication: the wrapping key is wrong, not
    /// the data corrupted.
    #[error("Key unwrap failed authentication")]
    UnwrapAuthentication,

    /// Content decryption failed. Fatal for that single operation; must
    /// not be retried with identical inputs.
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// A wrapped-key fetch from the remote store failed. Transient.
    #[error("Key fetch failed: {0}")]
    KeyFetch(String),

    /// A share-link fragment does not match the fragment grammar.
    #[error("Malformed share fragment: {0}")]
    MalformedFragment(String),

    /// A share-link fragment is bound to a different file than the one
    /// resolved by the link lookup.
    #[error("Share link bound to file '{actual}', expected '{expected}'")]
    KeyBinding { expected: String, actual: String },

    /// The password supplied for a password-gated share link is wrong
    /// or missing.
    #[error("Invalid share link password")]
    InvalidPassword,

    /// Cryptographic operation failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Durable storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Whether this error is transient and worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::KeyFetch(_))
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
