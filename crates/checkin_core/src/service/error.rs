//! Service-level error taxonomy for the check-in engine.

use crate::model::actor::{PersonId, ReviewId, SnapshotId};
use crate::model::review::{CompositeState, ReviewError, ReviewValidationError, TransitionError};
use crate::model::target::TargetRef;
use crate::repo::review_repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CheckInResult<T> = Result<T, CheckInError>;

/// Errors surfaced by check-in, finalization and acknowledgment services.
#[derive(Debug)]
pub enum CheckInError {
    /// A second open review for (subject, target) was attempted.
    DuplicateOpenReview {
        subject_id: PersonId,
        target: TargetRef,
    },
    /// Mutation of a finalized record, or completion without a rating.
    InvalidTransition(TransitionError),
    /// Finalization selection whose record is not ready.
    NotEligibleForFinalization {
        record_id: ReviewId,
        state: CompositeState,
    },
    /// Actor lacks the capability for this call.
    Forbidden {
        actor_id: PersonId,
        subject_id: PersonId,
    },
    /// Atomic finalization failed and was rolled back.
    SnapshotConsistencyFailure(String),
    /// Input does not fit the target's vocabulary.
    Validation(ReviewValidationError),
    ReviewNotFound(ReviewId),
    SnapshotNotFound(SnapshotId),
    Repo(RepoError),
}

impl CheckInError {
    /// Stable machine-readable code used in logs and host error mapping.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateOpenReview { .. } => "duplicate_open_review",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::NotEligibleForFinalization { .. } => "not_eligible_for_finalization",
            Self::Forbidden { .. } => "forbidden",
            Self::SnapshotConsistencyFailure(_) => "snapshot_consistency_failure",
            Self::Validation(_) => "validation",
            Self::ReviewNotFound(_) => "review_not_found",
            Self::SnapshotNotFound(_) => "snapshot_not_found",
            Self::Repo(_) => "repo",
        }
    }
}

impl Display for CheckInError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateOpenReview { subject_id, target } => write!(
                f,
                "an open review already exists for subject {subject_id} and target {target}"
            ),
            Self::InvalidTransition(err) => write!(f, "invalid transition: {err}"),
            Self::NotEligibleForFinalization { record_id, state } => write!(
                f,
                "review {record_id} is not eligible for finalization (state {})",
                state.as_str()
            ),
            Self::Forbidden {
                actor_id,
                subject_id,
            } => write!(
                f,
                "actor {actor_id} is not allowed to act on reviews of subject {subject_id}"
            ),
            Self::SnapshotConsistencyFailure(reason) => {
                write!(f, "finalization rolled back: {reason}")
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::ReviewNotFound(id) => write!(f, "review not found: {id}"),
            Self::SnapshotNotFound(id) => write!(f, "decision snapshot not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CheckInError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidTransition(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CheckInError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::DuplicateOpenReview { subject_id, target } => {
                Self::DuplicateOpenReview { subject_id, target }
            }
            RepoError::ReviewNotFound(id) => Self::ReviewNotFound(id),
            RepoError::ReviewClosed(id) => {
                Self::InvalidTransition(TransitionError::RecordFinalized(id))
            }
            RepoError::SnapshotNotFound(id) => Self::SnapshotNotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<ReviewError> for CheckInError {
    fn from(value: ReviewError) -> Self {
        match value {
            ReviewError::Validation(err) => Self::Validation(err),
            ReviewError::Transition(TransitionError::NotReady { record_id, state }) => {
                Self::NotEligibleForFinalization { record_id, state }
            }
            ReviewError::Transition(err) => Self::InvalidTransition(err),
        }
    }
}
