//! Payload encoding: JSON, then gzip at maximum compression.
//!
//! The format is private to the cache. Callers only ever see typed results;
//! bytes never cross the [`AnalysisCache`](super::AnalysisCache) boundary.
//!
//! A payload that fails to decode (truncated gzip stream, CRC mismatch,
//! JSON of the wrong shape) yields [`CacheError::CorruptPayload`], which the
//! service turns into a miss.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};

use super::entry::ResultKind;
use super::error::{CacheError, CacheResult};
use crate::model::{SecurityThreat, VoiceQosResult};

/// A result type that can be stored under a [`ResultKind`].
pub trait CachedArtifact: Serialize + DeserializeOwned + Send + 'static {
    /// The kind tag this type is stored under.
    const KIND: ResultKind;
}

impl CachedArtifact for Vec<SecurityThreat> {
    const KIND: ResultKind = ResultKind::Threats;
}

impl CachedArtifact for VoiceQosResult {
    const KIND: ResultKind = ResultKind::VoiceQos;
}

/// A decoded result whose type was chosen at runtime from its kind.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisArtifact {
    Threats(Vec<SecurityThreat>),
    VoiceQos(VoiceQosResult),
}

impl AnalysisArtifact {
    #[must_use]
    pub fn kind(&self) -> ResultKind {
        match self {
            Self::Threats(_) => ResultKind::Threats,
            Self::VoiceQos(_) => ResultKind::VoiceQos,
        }
    }
}

/// Serialize `value` to compact JSON and gzip it.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> CacheResult<Vec<u8>> {
    let json = serde_json::to_vec(value).map_err(|e| CacheError::Serialization {
        reason: e.to_string(),
    })?;

    let gzip_err = |e: std::io::Error| CacheError::Serialization {
        reason: format!("gzip compression failed: {e}"),
    };

    let mut encoder = GzEncoder::new(Vec::with_capacity(json.len() / 4), Compression::best());
    encoder.write_all(&json).map_err(gzip_err)?;
    encoder.finish().map_err(gzip_err)
}

/// Reverse [`encode`].
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CacheResult<T> {
    let mut json = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut json)
        .map_err(|e| CacheError::CorruptPayload {
            reason: format!("gzip stream invalid: {e}"),
        })?;

    serde_json::from_slice(&json).map_err(|e| CacheError::CorruptPayload {
        reason: format!("payload does not match expected shape: {e}"),
    })
}

/// Decode `bytes` into the result type stored under `kind`.
pub fn decode_artifact(bytes: &[u8], kind: ResultKind) -> CacheResult<AnalysisArtifact> {
    match kind {
        ResultKind::Threats => decode(bytes).map(AnalysisArtifact::Threats),
        ResultKind::VoiceQos => decode(bytes).map(AnalysisArtifact::VoiceQos),
    }
}
