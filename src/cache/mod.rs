//! Analysis result caching.
//!
//! Re-analyzing a large capture to recompute security threats and voice QoS
//! metrics takes seconds to minutes. This module persists those results,
//! keyed by the identity of the capture file, so that re-opening an
//! unchanged file is near-instant.
//!
//! # Architecture
//!
//! * [`key`]: derives a stable [`CacheKey`] from path, size and mtime.
//! * [`codec`]: JSON + gzip payload encoding.
//! * [`database`]: SQLite persistence, schema management and maintenance.
//! * [`service`]: the [`AnalysisCache`] contract and [`CacheService`] facade.
//! * [`null`]: [`NullCacheService`], the disabled drop-in.
//!
//! # Invalidation
//!
//! Keys change whenever the file's path, size or modification time changes,
//! and whenever [`ANALYSIS_VERSION`] is bumped. Rows under a stale key are
//! never read again and are removed by the age-based sweep.
//!
//! # Example
//!
//! ```no_run
//! use pcapcache::cache::build_cache;
//! use pcapcache::cancel::CancelFlag;
//! use pcapcache::config::Config;
//! use pcapcache::model::SecurityThreat;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), pcapcache::cache::CacheError> {
//! let cache = build_cache(&Config::load());
//! let cancel = CancelFlag::new();
//!
//! let key = cache.compute_cache_key(Path::new("/captures/office.pcapng"))?;
//! match cache.load_threats(&key, &cancel).await {
//!     Some(threats) => println!("{} cached findings", threats.len()),
//!     None => {
//!         let threats: Vec<SecurityThreat> = Vec::new(); // run the analysis engine here
//!         cache.save_threats(&key, &threats, &cancel).await;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod database;
pub mod entry;
pub mod error;
pub mod key;
pub mod null;
pub mod service;
pub mod stats;

use std::sync::Arc;

use crate::config::Config;

pub use codec::{AnalysisArtifact, CachedArtifact};
pub use database::AnalysisStore;
pub use entry::{CacheEntry, EntryInfo, ResultKind};
pub use error::{CacheError, CacheResult};
pub use key::{compute_cache_key, CacheKey, ANALYSIS_VERSION};
pub use null::NullCacheService;
pub use service::{AnalysisCache, CacheService, DEFAULT_MAX_AGE_DAYS};
pub use stats::CacheStatistics;

/// Build the cache selected by `config.enabled`.
///
/// Falls back to [`NullCacheService`] when caching is disabled or no store
/// location can be determined.
pub fn build_cache(config: &Config) -> Arc<dyn AnalysisCache> {
    if !config.enabled {
        return Arc::new(NullCacheService::new());
    }

    match config.resolved_store_path() {
        Ok(path) => {
            log::debug!("Analysis cache store: {}", path.display());
            Arc::new(CacheService::new(path).with_compact_after_evict(config.compact_after_evict))
        }
        Err(e) => {
            log::warn!("Cannot determine analysis cache location: {:#}", e);
            Arc::new(NullCacheService::new())
        }
    }
}
