//! Shared domain model.
//!
//! ## Files
//! - `models.rs` — call records, classification results, job reports,
//!   miner aggregates, observer configuration.
//!
//! The merge algebra itself lives in `crate::lattice`; everything here is
//! plain data shared by the observer and the miner.

pub mod models;
