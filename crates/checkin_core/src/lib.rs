//! Core domain logic for performance-review check-ins.
//! This crate is the single source of truth for review invariants: one open
//! review per subject and target, blind perspectives until both sides are
//! complete, and atomic finalization into decision snapshots.

pub mod clock;
pub mod collab;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod perspective;
pub mod repo;
pub mod service;

pub use clock::{Clock, FixedClock, SystemClock};
pub use collab::authorization::{AuthorizationOracle, ManagerDirectory};
pub use collab::notification::{
    LogNotificationDispatcher, NotificationDispatcher, NotificationEvent, NotifyError,
    RecordingDispatcher,
};
pub use collab::succession::{SuccessionError, SuccessionOutcome, TenureSuccession};
pub use config::{ConfigError, EngineConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, LogLevel, LoggingError};
pub use model::actor::{
    Actor, OrganizationId, PersonId, ReviewId, SnapshotId, TargetId, TenureId,
};
pub use model::rating::{
    CategoricalRating, EnergyAllocation, PersonalAlignment, PositionRating, Rating, RatingError,
};
pub use model::review::{
    CompositeState, OfficialInput, ReviewRecord, ReviewRole, SideInput, SideState,
    TransitionError,
};
pub use model::snapshot::DecisionSnapshot;
pub use model::target::{TargetKind, TargetRef};
pub use model::tenure::EmploymentTenure;
pub use perspective::{project, PerspectiveView, SideAction};
pub use repo::review_repo::{RepoError, RepoResult, ReviewRepository, SqliteReviewRepository};
pub use repo::snapshot_repo::{SnapshotRepository, SqliteSnapshotRepository};
pub use repo::tenure_repo::{SqliteTenureRepository, SqliteTenureSuccession};
pub use service::acknowledgment_service::AcknowledgmentService;
pub use service::checkin_service::CheckInService;
pub use service::error::{CheckInError, CheckInResult};
pub use service::finalization_service::{
    FinalizationCoordinator, FinalizationOutcome, FinalizationSelection, SelectionResult,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
