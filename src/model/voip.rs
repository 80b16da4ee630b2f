//! Voice quality-of-service results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// A flow carrying QoS-marked (DSCP) voice traffic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QosFlow {
    pub source_address: IpAddr,
    pub destination_address: IpAddr,
    pub protocol: String,
    /// DSCP code point (0-63).
    pub dscp: u8,
    /// Well-known name for the code point, e.g. "EF".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dscp_label: Option<String>,
    pub packet_count: u64,
    pub total_bytes: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// A connection whose measured latency exceeded the analysis threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyConnection {
    pub source_address: IpAddr,
    pub destination_address: IpAddr,
    pub protocol: String,
    pub average_latency_ms: f64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
    pub packet_count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// A connection whose inter-arrival jitter exceeded the analysis threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JitterConnection {
    pub source_address: IpAddr,
    pub destination_address: IpAddr,
    pub protocol: String,
    pub average_jitter_ms: f64,
    pub min_jitter_ms: f64,
    pub max_jitter_ms: f64,
    pub packet_count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Bundle of voice QoS metrics computed for one capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceQosResult {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qos_traffic: Vec<QosFlow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub high_latency_connections: Vec<LatencyConnection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub high_jitter_connections: Vec<JitterConnection>,
    /// Number of packets classified as voice (RTP/SIP) traffic.
    pub total_voice_packets: u64,
    pub analyzed_at: DateTime<Utc>,
}

impl VoiceQosResult {
    /// An empty result for a capture with no voice traffic.
    #[must_use]
    pub fn empty(analyzed_at: DateTime<Utc>) -> Self {
        Self {
            qos_traffic: Vec::new(),
            high_latency_connections: Vec::new(),
            high_jitter_connections: Vec::new(),
            total_voice_packets: 0,
            analyzed_at,
        }
    }

    /// True when no flows or problem connections were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.qos_traffic.is_empty()
            && self.high_latency_connections.is_empty()
            && self.high_jitter_connections.is_empty()
    }
}
