//! Decision snapshot: the frozen artifact of one finalization action.
//!
//! # Invariants
//! - Created exactly once per finalization action.
//! - `records` is a denormalized copy of every record closed by that action.
//! - Only `acknowledged_at` may change after creation.

use crate::model::actor::{OrganizationId, PersonId, ReviewId, SnapshotId};
use crate::model::review::ReviewRecord;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionSnapshot {
    pub id: SnapshotId,
    pub organization_id: OrganizationId,
    pub subject_id: PersonId,
    pub records: Vec<ReviewRecord>,
    pub finalized_by: PersonId,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds. Set once by the subject's acknowledgment.
    pub acknowledged_at: Option<i64>,
}

impl DecisionSnapshot {
    pub fn new(
        organization_id: OrganizationId,
        subject_id: PersonId,
        records: Vec<ReviewRecord>,
        finalized_by: PersonId,
        created_at: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id,
            subject_id,
            records,
            finalized_by,
            created_at,
            acknowledged_at: None,
        }
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged_at.is_some()
    }

    pub fn record_ids(&self) -> Vec<ReviewId> {
        self.records.iter().map(|record| record.id).collect()
    }
}
