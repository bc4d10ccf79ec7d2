//! Cryptographic primitives for ZeroVault.
//!
//! This module provides:
//! - Key derivation using Argon2id
//! - Authenticated encryption using ChaCha20-Poly1305
//! - Key wrapping for the master key / container key / file key hierarchy
//! - Secure key management with automatic zeroization
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - Every encrypt and wrap call draws a fresh random nonce
//! - Constant-time operations for sensitive comparisons

pub mod aead;
pub mod kdf;
pub mod keys;
pub mod wrap;

pub use aead::{open, seal, NONCE_SIZE, TAG_SIZE};
pub use kdf::{derive_key, derive_token_key, verify_password, KdfParams};
pub use keys::{ContainerKey, DerivedKey, FileKey, MasterKey, Salt, KEY_LENGTH, SALT_LENGTH};
pub use wrap::{unwrap_key, wrap_key, WrappedKey};
