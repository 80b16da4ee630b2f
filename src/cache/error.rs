//! Error types for cache operations.

use std::path::PathBuf;

/// Errors that can occur inside the cache subsystem.
///
/// Most of these never reach callers of [`AnalysisCache`](super::AnalysisCache):
/// read failures become misses and write failures are logged and dropped.
/// Only [`CacheError::FileNotFound`] and [`CacheError::Io`] escape, from key
/// derivation, because they point at caller misuse rather than a cache
/// condition.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Key derivation was asked for a file that does not exist.
    #[error("capture file not found: {}", path.display())]
    FileNotFound {
        /// The path that did not resolve to a regular file.
        path: PathBuf,
    },

    /// Reading file metadata failed for a reason other than absence.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A stored payload could not be decompressed or parsed.
    #[error("corrupt cache payload: {reason}")]
    CorruptPayload {
        /// Description of the decode failure.
        reason: String,
    },

    /// A result could not be encoded.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    /// The store file could not be opened, locked or initialized.
    #[error("cache store unavailable at {}: {reason}", path.display())]
    StoreUnavailable { path: PathBuf, reason: String },

    /// An SQLite statement failed.
    #[error("cache database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// An eviction sweep failed part-way; `removed` rows were still deleted.
    #[error("eviction partially failed after removing {removed} entries: {reason}")]
    EvictionFailure { removed: usize, reason: String },

    /// The operation observed its cancellation flag and rolled back.
    #[error("cache operation cancelled")]
    Cancelled,
}

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
