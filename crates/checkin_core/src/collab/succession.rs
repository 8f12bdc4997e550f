//! Employment tenure succession contract.

use crate::model::actor::{OrganizationId, PersonId};
use crate::model::rating::PositionRating;
use crate::model::tenure::EmploymentTenure;
use crate::repo::review_repo::RepoError;
use chrono::NaiveDate;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result of one succession: the closed tenure and its replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessionOutcome {
    pub closed: EmploymentTenure,
    pub successor: EmploymentTenure,
}

#[derive(Debug)]
pub enum SuccessionError {
    /// Subject has no active tenure to close.
    NoActiveTenure {
        organization_id: OrganizationId,
        subject_id: PersonId,
    },
    /// Collaborator refused the succession.
    Rejected(String),
    Repo(RepoError),
}

impl Display for SuccessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoActiveTenure {
                organization_id,
                subject_id,
            } => write!(
                f,
                "no active tenure for subject {subject_id} in organization {organization_id}"
            ),
            Self::Rejected(reason) => write!(f, "tenure succession rejected: {reason}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SuccessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for SuccessionError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<rusqlite::Error> for SuccessionError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

/// Closes a subject's active tenure and opens its successor.
///
/// `conn` is the finalization transaction; implementations must not commit
/// or open their own transaction on it.
pub trait TenureSuccession: Send + Sync {
    fn end_and_succeed(
        &self,
        conn: &Connection,
        organization_id: OrganizationId,
        subject_id: PersonId,
        as_of: NaiveDate,
        official_rating: PositionRating,
    ) -> Result<SuccessionOutcome, SuccessionError>;
}
