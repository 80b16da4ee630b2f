//! Cache key derivation from capture file metadata.
//!
//! # Overview
//!
//! A cache key identifies one capture file at one point in time. It is a
//! SHA-256 digest of the file's absolute path, byte length and modification
//! time, followed by the analysis format version:
//!
//! ```text
//! 3f2a...9c1e_1.0
//! └─ file digest ─┘ └ ANALYSIS_VERSION
//! ```
//!
//! Hashing metadata instead of contents keeps derivation O(1) regardless of
//! capture size. An edit that preserves both size and mtime is not detected.
//!
//! The path is part of the digest, so results are cached per location:
//! copying a capture elsewhere produces a new key even though its contents,
//! size and mtime are unchanged.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use super::error::{CacheError, CacheResult};

/// Version of the cached result shapes.
///
/// Bump whenever [`SecurityThreat`](crate::model::SecurityThreat) or
/// [`VoiceQosResult`](crate::model::VoiceQosResult) change shape. Old rows
/// then live under a different key and are simply never read again; the
/// age-based sweep removes them eventually.
pub const ANALYSIS_VERSION: &str = "1.0";

/// Stable identity of a capture file for caching purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build a key from a file digest and the current [`ANALYSIS_VERSION`].
    #[must_use]
    pub fn from_digest(file_digest: &str) -> Self {
        Self(format!("{file_digest}_{ANALYSIS_VERSION}"))
    }

    /// Wrap an already-formatted key, e.g. one typed by an operator.
    #[must_use]
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The file digest portion (everything before the last `_`).
    ///
    /// Keys without a version suffix are treated as pure digests.
    #[must_use]
    pub fn file_digest(&self) -> &str {
        self.0
            .rsplit_once('_')
            .map_or(self.0.as_str(), |(digest, _)| digest)
    }

    /// The analysis version suffix, if present.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.0.rsplit_once('_').map(|(_, version)| version)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the cache key for the capture file at `path`.
///
/// # Errors
///
/// * [`CacheError::FileNotFound`] if `path` does not name an existing regular file.
/// * [`CacheError::Io`] if its metadata cannot be read for any other reason.
///
/// # Example
///
/// ```no_run
/// use pcapcache::cache::compute_cache_key;
/// use std::path::Path;
///
/// let key = compute_cache_key(Path::new("/captures/office.pcapng"))?;
/// println!("{key}");
/// # Ok::<(), pcapcache::cache::CacheError>(())
/// ```
pub fn compute_cache_key(path: &Path) -> CacheResult<CacheKey> {
    let io_err = |source: std::io::Error| {
        if source.kind() == ErrorKind::NotFound {
            CacheError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            CacheError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    };

    let metadata = fs::metadata(path).map_err(io_err)?;
    if !metadata.is_file() {
        return Err(CacheError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let absolute = fs::canonicalize(path).map_err(io_err)?;
    let modified = metadata.modified().map_err(io_err)?;

    let digest = file_digest(&absolute, metadata.len(), modified.into());
    Ok(CacheKey::from_digest(&digest))
}

/// Hex SHA-256 of the identity `path|len|mtime`.
///
/// The path enters as its raw OS bytes, so names that are not valid UTF-8
/// stay distinct. The timestamp is RFC 3339 UTC with nanoseconds so that
/// every mtime the filesystem can represent maps to a distinct string.
fn file_digest(absolute_path: &Path, len: u64, modified: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(absolute_path.as_os_str().as_encoded_bytes());
    hasher.update(
        format!(
            "|{}|{}",
            len,
            modified.to_rfc3339_opts(SecondsFormat::Nanos, true)
        )
        .as_bytes(),
    );
    format!("{:x}", hasher.finalize())
}
