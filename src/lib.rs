//! pcapcache - Analysis Result Cache
//!
//! Persists the expensive results of packet-capture analysis (security threats
//! and voice QoS metrics) in a local SQLite store, keyed by the identity of the
//! capture file, so that re-opening an unchanged capture skips re-analysis.

pub mod app;
pub mod cache;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

pub use app::run_app;
