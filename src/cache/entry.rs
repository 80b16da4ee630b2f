//! Cache entry definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::key::CacheKey;

/// The closed set of cacheable analysis artifacts.
///
/// Each kind has its own target type and its own save/load entry points;
/// both kinds share one physical table and one key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResultKind {
    /// List of security findings.
    Threats,
    /// Voice quality-of-service bundle.
    #[serde(rename = "VoiceQoS")]
    VoiceQos,
}

impl ResultKind {
    /// Every kind, in a stable order.
    pub const ALL: [ResultKind; 2] = [ResultKind::Threats, ResultKind::VoiceQos];

    /// Tag persisted in the `result_kind` column.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Threats => "Threats",
            Self::VoiceQos => "VoiceQoS",
        }
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown result kind tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown result kind '{0}' (expected 'Threats' or 'VoiceQoS')")]
pub struct UnknownResultKind(pub String);

impl FromStr for ResultKind {
    type Err = UnknownResultKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "threats" => Ok(Self::Threats),
            "voiceqos" | "voice-qos" | "voice_qos" => Ok(Self::VoiceQos),
            _ => Err(UnknownResultKind(s.to_string())),
        }
    }
}

/// One row of the analysis cache.
///
/// Identity is `(cache_key, result_kind)`; at most one live entry exists per
/// identity because every write is an upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub cache_key: CacheKey,
    /// Digest of the source file, shared by all kinds and versions of it.
    pub file_digest: String,
    pub result_kind: ResultKind,
    /// Gzip-compressed JSON payload.
    pub payload: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Create an entry stamped with `now` for both timestamps.
    #[must_use]
    pub fn new(
        cache_key: CacheKey,
        result_kind: ResultKind,
        payload: Vec<u8>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            file_digest: cache_key.file_digest().to_string(),
            cache_key,
            result_kind,
            payload,
            created_at: now,
            last_accessed_at: now,
        }
    }

    /// Size of the compressed payload in bytes.
    #[must_use]
    pub fn payload_size(&self) -> u64 {
        self.payload.len() as u64
    }
}

/// Entry metadata without the payload, for inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryInfo {
    pub cache_key: CacheKey,
    pub file_digest: String,
    pub result_kind: ResultKind,
    pub payload_size: u64,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}
