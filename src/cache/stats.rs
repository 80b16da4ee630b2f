//! Cache statistics reporting.

use bytesize::ByteSize;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

const MIB: f64 = 1024.0 * 1024.0;

/// Snapshot of what the cache currently holds.
///
/// A disabled cache reports `enabled: false` and zeros everywhere. An
/// enabled cache whose store could not be opened or read reports
/// `available: false`, so it is never mistaken for a healthy empty one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStatistics {
    pub enabled: bool,
    /// The store was opened and read for this snapshot.
    pub available: bool,
    pub total_entries: u64,
    pub threat_entries: u64,
    pub voice_qos_entries: u64,
    /// Sum of compressed payload sizes.
    pub total_payload_bytes: u64,
    /// Store file plus its WAL and shared-memory side files.
    pub store_size_on_disk_bytes: u64,
    pub oldest_access: Option<DateTime<Utc>>,
    pub newest_access: Option<DateTime<Utc>>,
}

impl CacheStatistics {
    /// Statistics of a cache that is switched off.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn total_payload_mib(&self) -> f64 {
        self.total_payload_bytes as f64 / MIB
    }

    #[must_use]
    pub fn store_size_on_disk_mib(&self) -> f64 {
        self.store_size_on_disk_bytes as f64 / MIB
    }
}

impl fmt::Display for CacheStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.enabled {
            return writeln!(f, "Cache: disabled");
        }
        if !self.available {
            return writeln!(f, "Cache: enabled, store unavailable");
        }
        writeln!(f, "Cache: enabled")?;
        writeln!(f, "  Entries:        {}", self.total_entries)?;
        writeln!(f, "    Threats:      {}", self.threat_entries)?;
        writeln!(f, "    VoiceQoS:     {}", self.voice_qos_entries)?;
        writeln!(
            f,
            "  Payload size:   {}",
            ByteSize::b(self.total_payload_bytes)
        )?;
        writeln!(
            f,
            "  Size on disk:   {}",
            ByteSize::b(self.store_size_on_disk_bytes)
        )?;
        if let (Some(oldest), Some(newest)) = (self.oldest_access, self.newest_access) {
            writeln!(f, "  Oldest access:  {}", oldest.format("%Y-%m-%d %H:%M:%S UTC"))?;
            writeln!(f, "  Newest access:  {}", newest.format("%Y-%m-%d %H:%M:%S UTC"))?;
        }
        Ok(())
    }
}
