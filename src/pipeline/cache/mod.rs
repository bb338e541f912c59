//! Local result cache: content fingerprint -> last analysis, 24h validity.
//!
//! Lookups never touch the network and never fail outward; writes are
//! best-effort. The same `KeyValueStore` also backs the health passport.

pub mod fingerprint;
pub mod kv_store;
pub mod result_cache;

pub use fingerprint::*;
pub use kv_store::*;
pub use result_cache::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage quota exceeded ({needed} bytes needed, {available} available)")]
    QuotaExceeded { needed: usize, available: usize },

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}
