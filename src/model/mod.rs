//! Analysis results that can be cached.
//!
//! These types are produced by the analysis engine and only stored and
//! retrieved by the cache; the cache never computes them.
//!
//! * [`threat`]: security findings ([`SecurityThreat`]).
//! * [`voip`]: voice quality-of-service metrics ([`VoiceQosResult`]).

pub mod threat;
pub mod voip;

pub use threat::{SecurityThreat, ThreatSeverity, ThreatSummary};
pub use voip::{JitterConnection, LatencyConnection, QosFlow, VoiceQosResult};
