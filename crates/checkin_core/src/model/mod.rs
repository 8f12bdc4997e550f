//! Domain model for check-ins, decisions and tenures.
//!
//! # Responsibility
//! - Define canonical data structures used by the check-in engine.
//! - Keep the side state machine free of storage concerns.
//!
//! # Invariants
//! - Every entity is identified by a stable UUID.
//! - Ratings are closed, per-vocabulary types; no untyped scalars.

pub mod actor;
pub mod rating;
pub mod review;
pub mod snapshot;
pub mod target;
pub mod tenure;
