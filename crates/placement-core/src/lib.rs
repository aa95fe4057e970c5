//! Shared types and pure helpers for placement analytics.
//!
//! Holds the strongly-typed placement record and every derived view row,
//! the fixed state/region table, value coercion and date parsing for the
//! untrusted input boundary, calendar and formatting helpers, analytics
//! thresholds and the CLI settings.

pub mod data_processors;
pub mod error;
pub mod formatting;
pub mod models;
pub mod regions;
pub mod settings;
pub mod stats;
pub mod thresholds;
pub mod time_utils;

pub use error::{PlacementError, Result};
