//! Shared types and utilities for the Kubecost exporter
//!
//! This crate contains the allocation data model decoded from the Allocation
//! API together with the pure pieces of the extraction engine: dotted-path
//! resolution, label value canonicalization, and query window calculation.

pub mod types;
pub mod utils;

// Re-export commonly used types
pub use types::{allocation::*, value::*};
