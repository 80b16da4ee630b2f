//! Security findings produced by threat analysis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

/// Severity of a security finding, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ThreatSeverity {
    /// Informational observation, no action required.
    Info,
    /// Low risk.
    Low,
    /// Medium risk.
    Medium,
    /// High risk.
    High,
    /// Critical risk, immediate attention required.
    Critical,
}

impl fmt::Display for ThreatSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// A single security finding detected in a capture.
///
/// Optional and empty fields are omitted when serialized, which keeps
/// cached payloads small for captures with thousands of findings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityThreat {
    /// Detector-defined threat type (e.g. "PortScan", "CleartextCredentials").
    pub threat_type: String,
    /// Severity classification.
    pub severity: ThreatSeverity,
    /// Short human-readable title.
    pub title: String,
    /// Longer description of what was observed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Source endpoint, when the finding is tied to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_address: Option<IpAddr>,
    /// Destination endpoint, when the finding is tied to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_address: Option<IpAddr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_port: Option<u16>,
    /// Protocol name as reported by the dissector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Timestamp of the first packet contributing to the finding.
    pub first_seen: DateTime<Utc>,
    /// Timestamp of the last packet contributing to the finding.
    pub last_seen: DateTime<Utc>,
    /// How many times the pattern was observed.
    pub occurrence_count: u64,
    /// Frame numbers that contributed evidence.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_frames: Vec<u64>,
    /// Free-form key/value evidence.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub evidence: BTreeMap<String, String>,
    /// Suggested mitigations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mitigations: Vec<String>,
    /// Related CVE identifiers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cve_ids: Vec<String>,
}

impl SecurityThreat {
    /// Create a finding with the required fields; everything else starts empty.
    #[must_use]
    pub fn new(
        threat_type: impl Into<String>,
        severity: ThreatSeverity,
        title: impl Into<String>,
        seen_at: DateTime<Utc>,
    ) -> Self {
        Self {
            threat_type: threat_type.into(),
            severity,
            title: title.into(),
            description: String::new(),
            source_address: None,
            destination_address: None,
            source_port: None,
            destination_port: None,
            protocol: None,
            first_seen: seen_at,
            last_seen: seen_at,
            occurrence_count: 1,
            affected_frames: Vec::new(),
            evidence: BTreeMap::new(),
            mitigations: Vec::new(),
            cve_ids: Vec::new(),
        }
    }
}

/// Count of findings per severity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ThreatSummary {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl ThreatSummary {
    /// Aggregate a list of findings.
    #[must_use]
    pub fn from_threats(threats: &[SecurityThreat]) -> Self {
        let mut summary = Self {
            total: threats.len(),
            ..Self::default()
        };
        for threat in threats {
            match threat.severity {
                ThreatSeverity::Critical => summary.critical += 1,
                ThreatSeverity::High => summary.high += 1,
                ThreatSeverity::Medium => summary.medium += 1,
                ThreatSeverity::Low => summary.low += 1,
                ThreatSeverity::Info => summary.info += 1,
            }
        }
        summary
    }
}
