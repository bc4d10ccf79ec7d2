//! Collaborator interfaces for ZeroVault key management.
//!
//! This module provides trait-based interfaces for the three
//! collaborators the key hierarchy depends on — the session/auth
//! subsystem, the remote wrapped-key store, and the durable per-origin
//! key/value store — plus in-memory implementations for tests and
//! embedding.
//!
//! # Design Principles
//! - Collaborator isolation: no transport or auth logic in key modules
//! - Async operations: every collaborator call may suspend
//! - Opaque envelopes: stores only ever see {ciphertext, nonce} pairs

pub mod local;
pub mod remote;
pub mod session;

pub use local::{LocalStore, MemoryLocalStore};
pub use remote::{KeyStore, MemoryKeyStore};
pub use session::{SessionProvider, StaticSession};
