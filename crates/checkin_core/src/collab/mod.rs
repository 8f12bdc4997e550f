//! Contracts for collaborators owned outside the check-in engine.
//!
//! # Responsibility
//! - Define the seams the engine calls out through: authorization, tenure
//!   succession and notification delivery.
//! - Ship in-process implementations usable by hosts and tests.
//!
//! # Invariants
//! - Authorization is answered before any mutation.
//! - Succession runs on the caller's open transaction so it commits or rolls
//!   back together with finalization.
//! - Notification failures never affect the caller's outcome.

pub mod authorization;
pub mod notification;
pub mod succession;
