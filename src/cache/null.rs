//! Disabled cache.
//!
//! [`NullCacheService`] satisfies [`AnalysisCache`] without storing anything,
//! so callers never branch on whether caching is on. Keys are still derived
//! for real: code that logs or displays them behaves the same either way.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Once;

use super::codec::AnalysisArtifact;
use super::entry::{EntryInfo, ResultKind};
use super::error::CacheResult;
use super::key::{self, CacheKey};
use super::service::AnalysisCache;
use super::stats::CacheStatistics;
use crate::cancel::CancelFlag;
use crate::model::{SecurityThreat, VoiceQosResult};

static DISABLED_WARNING: Once = Once::new();

/// Cache that always misses.
#[derive(Debug)]
pub struct NullCacheService {
    _private: (),
}

impl NullCacheService {
    /// Create the disabled cache. The first call in a process logs a warning.
    #[must_use]
    pub fn new() -> Self {
        DISABLED_WARNING.call_once(|| {
            log::warn!("Analysis result caching is disabled; captures will be re-analyzed on every open");
        });
        Self { _private: () }
    }
}

impl Default for NullCacheService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisCache for NullCacheService {
    fn compute_cache_key(&self, path: &Path) -> CacheResult<CacheKey> {
        key::compute_cache_key(path)
    }

    async fn is_cached(&self, _key: &CacheKey, _kind: ResultKind, _cancel: &CancelFlag) -> bool {
        false
    }

    async fn save_threats(&self, _key: &CacheKey, _threats: &[SecurityThreat], _cancel: &CancelFlag) {}

    async fn load_threats(&self, _key: &CacheKey, _cancel: &CancelFlag) -> Option<Vec<SecurityThreat>> {
        None
    }

    async fn save_voice_qos(&self, _key: &CacheKey, _result: &VoiceQosResult, _cancel: &CancelFlag) {}

    async fn load_voice_qos(&self, _key: &CacheKey, _cancel: &CancelFlag) -> Option<VoiceQosResult> {
        None
    }

    async fn load_artifact(
        &self,
        _key: &CacheKey,
        _kind: ResultKind,
        _cancel: &CancelFlag,
    ) -> Option<AnalysisArtifact> {
        None
    }

    async fn entry_info(
        &self,
        _key: &CacheKey,
        _kind: ResultKind,
        _cancel: &CancelFlag,
    ) -> Option<EntryInfo> {
        None
    }

    async fn clear_older_than(&self, _max_age_days: u32, _cancel: &CancelFlag) -> usize {
        0
    }

    async fn delete_for_file(&self, _file_digest: &str, _cancel: &CancelFlag) -> usize {
        0
    }

    async fn clear_all(&self, _cancel: &CancelFlag) -> usize {
        0
    }

    async fn statistics(&self, _cancel: &CancelFlag) -> CacheStatistics {
        CacheStatistics::disabled()
    }

    async fn compact(&self, _cancel: &CancelFlag) {}

    fn is_enabled(&self) -> bool {
        false
    }
}
