//! The cache facade and the contract it shares with the disabled cache.
//!
//! [`CacheService`] orchestrates key derivation, the codec and the store.
//! Its one hard rule: the cache may report a miss when something goes
//! wrong, but it never returns wrong data and never fails the caller.
//!
//! * Reads (`is_cached`, `load_*`, `statistics`) degrade to "not cached".
//! * Writes (`save_*`) and maintenance are logged and swallowed on failure.
//! * Only [`AnalysisCache::compute_cache_key`] returns errors, because a
//!   missing capture file is caller misuse rather than a cache condition.
//!
//! # Concurrency
//!
//! All store access goes through one gate, a `tokio::sync::Mutex` of width
//! one. The owned guard moves into the blocking task that runs the SQLite
//! work, so a multi-step operation (select then refresh timestamp) cannot
//! interleave with another one. If the awaiting future is dropped, the
//! blocking task still finishes its transaction and the row ends up either
//! fully written or untouched.
//!
//! The store is opened lazily inside the gate, so the schema bootstrap runs
//! once even when the first callers race.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::codec::{self, AnalysisArtifact, CachedArtifact};
use super::database::AnalysisStore;
use super::entry::{CacheEntry, EntryInfo, ResultKind};
use super::error::{CacheError, CacheResult};
use super::key::{self, CacheKey};
use super::stats::CacheStatistics;
use crate::cancel::CancelFlag;
use crate::model::{SecurityThreat, VoiceQosResult};

/// Default age threshold for [`AnalysisCache::clear_older_than`].
pub const DEFAULT_MAX_AGE_DAYS: u32 = 30;

/// Contract shared by [`CacheService`] and [`NullCacheService`].
///
/// Construct one implementation at process start and hand it to every
/// consumer as `Arc<dyn AnalysisCache>`.
///
/// [`NullCacheService`]: super::NullCacheService
#[async_trait]
pub trait AnalysisCache: Send + Sync {
    /// Derive the cache key for a capture file.
    fn compute_cache_key(&self, path: &Path) -> CacheResult<CacheKey>;

    /// Whether a result of `kind` is stored under `key`. A hit counts as an access.
    async fn is_cached(&self, key: &CacheKey, kind: ResultKind, cancel: &CancelFlag) -> bool;

    /// Store security findings. Failures are logged, never returned.
    async fn save_threats(&self, key: &CacheKey, threats: &[SecurityThreat], cancel: &CancelFlag);

    /// Load security findings; `None` is a miss.
    async fn load_threats(&self, key: &CacheKey, cancel: &CancelFlag) -> Option<Vec<SecurityThreat>>;

    /// Store a voice QoS bundle. Failures are logged, never returned.
    async fn save_voice_qos(&self, key: &CacheKey, result: &VoiceQosResult, cancel: &CancelFlag);

    /// Load a voice QoS bundle; `None` is a miss.
    async fn load_voice_qos(&self, key: &CacheKey, cancel: &CancelFlag) -> Option<VoiceQosResult>;

    /// Load whichever result type `kind` names.
    async fn load_artifact(
        &self,
        key: &CacheKey,
        kind: ResultKind,
        cancel: &CancelFlag,
    ) -> Option<AnalysisArtifact>;

    /// Entry metadata, without counting as an access.
    async fn entry_info(
        &self,
        key: &CacheKey,
        kind: ResultKind,
        cancel: &CancelFlag,
    ) -> Option<EntryInfo>;

    /// Evict entries not accessed in the last `max_age_days` days.
    /// Returns how many were removed, even if the sweep partially failed.
    async fn clear_older_than(&self, max_age_days: u32, cancel: &CancelFlag) -> usize;

    /// Remove every entry of one source file, across kinds and versions.
    async fn delete_for_file(&self, file_digest: &str, cancel: &CancelFlag) -> usize;

    /// Remove every entry.
    async fn clear_all(&self, cancel: &CancelFlag) -> usize;

    async fn statistics(&self, cancel: &CancelFlag) -> CacheStatistics;

    /// Reclaim space after deletions. Never required for correctness.
    async fn compact(&self, cancel: &CancelFlag);

    /// `false` for the disabled cache.
    fn is_enabled(&self) -> bool;
}

/// Persistent cache backed by a single SQLite file.
pub struct CacheService {
    store_path: PathBuf,
    store: Arc<Mutex<Option<AnalysisStore>>>,
    compact_after_evict: bool,
}

impl CacheService {
    /// Create a service for the store at `store_path`.
    ///
    /// Nothing is opened yet; the file and schema are created by the first
    /// operation.
    #[must_use]
    pub fn new(store_path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: store_path.into(),
            store: Arc::new(Mutex::new(None)),
            compact_after_evict: false,
        }
    }

    /// Compact the store after every sweep that removed entries.
    #[must_use]
    pub fn with_compact_after_evict(mut self, enabled: bool) -> Self {
        self.compact_after_evict = enabled;
        self
    }

    #[must_use]
    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Run `op` against the store on the blocking pool, holding the gate.
    async fn with_store<F, T>(&self, op: F) -> CacheResult<T>
    where
        F: FnOnce(&mut AnalysisStore) -> CacheResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut guard = Arc::clone(&self.store).lock_owned().await;
        let path = self.store_path.clone();

        tokio::task::spawn_blocking(move || {
            if guard.is_none() {
                *guard = Some(AnalysisStore::open(&path)?);
            }
            match guard.as_mut() {
                Some(store) => op(store),
                None => Err(CacheError::StoreUnavailable {
                    path,
                    reason: "store was not initialized".to_string(),
                }),
            }
        })
        .await
        .map_err(|e| CacheError::StoreUnavailable {
            path: self.store_path.clone(),
            reason: format!("cache task failed: {e}"),
        })?
    }

    async fn save_encoded(
        &self,
        key: &CacheKey,
        kind: ResultKind,
        encoded: CacheResult<Vec<u8>>,
        cancel: &CancelFlag,
    ) {
        if cancel.is_cancelled() {
            log::debug!("Skipping cache save for {} ({}): cancelled", key, kind);
            return;
        }

        let payload = match encoded {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("Failed to encode {} result for {}: {}", kind, key, e);
                return;
            }
        };

        let entry = CacheEntry::new(key.clone(), kind, payload, Utc::now());
        let size = entry.payload_size();
        let cancel = cancel.clone();

        match self.with_store(move |store| store.upsert(&entry, &cancel)).await {
            Ok(()) => log::debug!("Cached {} result for {} ({} bytes)", kind, key, size),
            Err(CacheError::Cancelled) => {
                log::debug!("Cache save for {} ({}) cancelled and rolled back", key, kind);
            }
            Err(e) => log::warn!("Failed to save {} result for {}: {}", kind, key, e),
        }
    }

    async fn load_payload(
        &self,
        key: &CacheKey,
        kind: ResultKind,
        cancel: &CancelFlag,
    ) -> Option<Vec<u8>> {
        if cancel.is_cancelled() {
            return None;
        }

        let lookup = key.clone();
        match self
            .with_store(move |store| store.get(&lookup, kind, Utc::now()))
            .await
        {
            Ok(Some(payload)) => Some(payload),
            Ok(None) => {
                log::trace!("Cache miss for {} ({})", key, kind);
                None
            }
            Err(e) => {
                log::warn!("Cache lookup for {} ({}) failed: {}", key, kind, e);
                None
            }
        }
    }

    async fn load_typed<T: CachedArtifact>(&self, key: &CacheKey, cancel: &CancelFlag) -> Option<T> {
        let payload = self.load_payload(key, T::KIND, cancel).await?;
        match codec::decode::<T>(&payload) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Ignoring unreadable {} entry for {}: {}", T::KIND, key, e);
                None
            }
        }
    }

    async fn delete_with<F>(&self, what: &str, cancel: &CancelFlag, op: F) -> usize
    where
        F: FnOnce(&mut AnalysisStore, &CancelFlag) -> CacheResult<usize> + Send + 'static,
    {
        if cancel.is_cancelled() {
            return 0;
        }

        let cancel = cancel.clone();
        match self.with_store(move |store| op(store, &cancel)).await {
            Ok(removed) => {
                log::info!("Removed {} cache entries ({})", removed, what);
                removed
            }
            Err(CacheError::EvictionFailure { removed, reason }) => {
                log::warn!(
                    "Cache sweep ({}) partially failed after removing {} entries: {}",
                    what,
                    removed,
                    reason
                );
                removed
            }
            Err(CacheError::Cancelled) => {
                log::debug!("Cache sweep ({}) cancelled and rolled back", what);
                0
            }
            Err(e) => {
                log::warn!("Cache sweep ({}) failed: {}", what, e);
                0
            }
        }
    }
}

#[async_trait]
impl AnalysisCache for CacheService {
    fn compute_cache_key(&self, path: &Path) -> CacheResult<CacheKey> {
        key::compute_cache_key(path)
    }

    async fn is_cached(&self, key: &CacheKey, kind: ResultKind, cancel: &CancelFlag) -> bool {
        if cancel.is_cancelled() {
            return false;
        }

        let lookup = key.clone();
        self.with_store(move |store| store.exists(&lookup, kind, Utc::now()))
            .await
            .unwrap_or_else(|e| {
                log::warn!("Cache presence check for {} ({}) failed: {}", key, kind, e);
                false
            })
    }

    async fn save_threats(&self, key: &CacheKey, threats: &[SecurityThreat], cancel: &CancelFlag) {
        let encoded = codec::encode(threats);
        self.save_encoded(key, ResultKind::Threats, encoded, cancel)
            .await;
    }

    async fn load_threats(&self, key: &CacheKey, cancel: &CancelFlag) -> Option<Vec<SecurityThreat>> {
        self.load_typed(key, cancel).await
    }

    async fn save_voice_qos(&self, key: &CacheKey, result: &VoiceQosResult, cancel: &CancelFlag) {
        let encoded = codec::encode(result);
        self.save_encoded(key, ResultKind::VoiceQos, encoded, cancel)
            .await;
    }

    async fn load_voice_qos(&self, key: &CacheKey, cancel: &CancelFlag) -> Option<VoiceQosResult> {
        self.load_typed(key, cancel).await
    }

    async fn load_artifact(
        &self,
        key: &CacheKey,
        kind: ResultKind,
        cancel: &CancelFlag,
    ) -> Option<AnalysisArtifact> {
        let payload = self.load_payload(key, kind, cancel).await?;
        codec::decode_artifact(&payload, kind)
            .map_err(|e| log::warn!("Ignoring unreadable {} entry for {}: {}", kind, key, e))
            .ok()
    }

    async fn entry_info(
        &self,
        key: &CacheKey,
        kind: ResultKind,
        cancel: &CancelFlag,
    ) -> Option<EntryInfo> {
        if cancel.is_cancelled() {
            return None;
        }

        let lookup = key.clone();
        self.with_store(move |store| store.entry(&lookup, kind))
            .await
            .unwrap_or_else(|e| {
                log::warn!("Cache entry lookup for {} ({}) failed: {}", key, kind, e);
                None
            })
    }

    async fn clear_older_than(&self, max_age_days: u32, cancel: &CancelFlag) -> usize {
        let max_age = Duration::days(i64::from(max_age_days));
        let removed = self
            .delete_with("age sweep", cancel, move |store, cancel| {
                let cutoff = Utc::now()
                    .checked_sub_signed(max_age)
                    .unwrap_or(DateTime::<Utc>::MIN_UTC);
                store.delete_older_than(cutoff, cancel)
            })
            .await;

        if removed > 0 && self.compact_after_evict {
            self.compact(cancel).await;
        }
        removed
    }

    async fn delete_for_file(&self, file_digest: &str, cancel: &CancelFlag) -> usize {
        let digest = file_digest.to_string();
        self.delete_with("per-file", cancel, move |store, cancel| {
            store.delete_by_file_digest(&digest, cancel)
        })
        .await
    }

    async fn clear_all(&self, cancel: &CancelFlag) -> usize {
        self.delete_with("full clear", cancel, |store, cancel| store.clear(cancel))
            .await
    }

    async fn statistics(&self, cancel: &CancelFlag) -> CacheStatistics {
        let unavailable = CacheStatistics {
            enabled: true,
            ..CacheStatistics::default()
        };
        if cancel.is_cancelled() {
            return unavailable;
        }

        self.with_store(|store| store.statistics())
            .await
            .unwrap_or_else(|e| {
                log::warn!("Failed to collect cache statistics: {}", e);
                unavailable
            })
    }

    async fn compact(&self, cancel: &CancelFlag) {
        if cancel.is_cancelled() {
            return;
        }

        match self.with_store(|store| store.compact()).await {
            Ok(()) => log::info!("Compacted analysis cache at {}", self.store_path.display()),
            Err(e) => log::warn!("Cache compaction failed: {}", e),
        }
    }

    fn is_enabled(&self) -> bool {
        true
    }
}
