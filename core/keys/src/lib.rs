//! Key hierarchy management for ZeroVault.
//!
//! This module provides:
//! - The master key session store with reload survival
//! - Container key resolution, creation, caching and recovery
//! - Per-file content encryption and key wrapping
//! - The share-link fragment codec
//!
//! # Architecture
//! All process-wide state (the session master key, the container key
//! cache) lives in explicit context objects owned by the `KeyService`
//! facade; collaborators are injected as trait objects. Nothing here
//! performs transport or rendering.

pub mod containers;
pub mod files;
pub mod retry;
pub mod service;
pub mod session;
pub mod share;

pub use containers::{ContainerKeyManager, KeyOrigin, ResolvedContainerKey};
pub use files::{decrypt_download, encrypt_for_upload, unwrap_file_key, EncryptedUpload};
pub use retry::{retry_transient, RetryConfig};
pub use service::KeyService;
pub use session::MasterKeySession;
pub use share::{decode, encode, encode_with_password, DecodedShareLink};
