//! Data layer for placement analytics.
//!
//! Reads placement payloads, normalizes untrusted records into typed items,
//! applies the reporting scope and derives every dashboard view and KPI.

pub mod aggregator;
pub mod analysis;
pub mod kpis;
pub mod normalizer;
pub mod reader;
pub mod scope;

pub use placement_core as core;
