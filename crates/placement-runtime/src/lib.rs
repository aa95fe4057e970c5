//! Runtime layer for placement analytics.
//!
//! Provides the TTL cache with single-flight loading and the data manager
//! that serves cached analytics per placement source and scope.

pub mod cache;
pub mod data_manager;

pub use placement_core as core;
pub use placement_data as data;
