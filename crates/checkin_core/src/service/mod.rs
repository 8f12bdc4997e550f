//! Check-in use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls, authorization and the blind perspective
//!   gate into use-case level APIs.
//! - Keep host layers decoupled from storage details.

pub mod acknowledgment_service;
pub mod checkin_service;
pub mod error;
pub mod finalization_service;
