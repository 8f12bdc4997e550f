//! Identity types for people, organizations and review artifacts.
//!
//! # Responsibility
//! - Give every referenced entity a stable UUID-backed identifier.
//! - Carry the calling person explicitly through engine APIs.
//!
//! # Invariants
//! - Engine calls never resolve "the current person" from ambient state;
//!   the `Actor` argument is the only source of caller identity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a person (subject, manager or any other actor).
pub type PersonId = Uuid;
/// Stable identifier of the organization owning a review.
pub type OrganizationId = Uuid;
/// Stable identifier of one review record instance.
pub type ReviewId = Uuid;
/// Stable identifier of one decision snapshot.
pub type SnapshotId = Uuid;
/// Stable identifier of one employment tenure.
pub type TenureId = Uuid;
/// Stable identifier of a position, assignment or aspiration.
pub type TargetId = Uuid;

/// Person performing an engine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub person_id: PersonId,
}

impl Actor {
    pub fn new(person_id: PersonId) -> Self {
        Self { person_id }
    }

    /// Returns whether this actor is the given person.
    pub fn is(&self, person_id: PersonId) -> bool {
        self.person_id == person_id
    }
}

impl From<PersonId> for Actor {
    fn from(value: PersonId) -> Self {
        Self::new(value)
    }
}
