//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Write paths validate records before SQL mutations.
//! - Repository APIs return semantic errors (`ReviewNotFound`,
//!   `DuplicateOpenReview`, ...) in addition to DB transport errors.
//! - Repositories borrow a connection; borrowing a transaction instead makes
//!   their writes part of it.

pub mod review_repo;
pub mod snapshot_repo;
pub mod tenure_repo;
