//! Blind perspective gate.
//!
//! # Responsibility
//! - Project a review record into what one viewer role may see.
//! - Report which side actions are currently legal for that role.
//!
//! # Invariants
//! - A viewer always sees their own side content.
//! - A viewer sees only the completion flag of the other side until both
//!   sides are completed; rating, notes and assignment fields are omitted
//!   from the projection, not blanked.
//! - The official side is visible once the record is finalized.
//! - The gate is a pure function of record state; nothing is persisted.

use crate::model::actor::{PersonId, ReviewId};
use crate::model::rating::{EnergyAllocation, PersonalAlignment, Rating};
use crate::model::review::{CompositeState, ReviewRecord, ReviewRole, ReviewSide, SideState};
use crate::model::target::TargetRef;
use chrono::NaiveDate;
use serde::Serialize;

/// Content of one side, exposed only when the viewer may see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SideContent {
    pub rating: Option<Rating>,
    pub private_notes: Option<String>,
    pub energy_allocation: Option<EnergyAllocation>,
    pub personal_alignment: Option<PersonalAlignment>,
    pub completed_at: Option<i64>,
    pub completed_by: Option<PersonId>,
}

impl From<&ReviewSide> for SideContent {
    fn from(side: &ReviewSide) -> Self {
        Self {
            rating: side.rating,
            private_notes: side.private_notes.clone(),
            energy_allocation: side.energy_allocation,
            personal_alignment: side.personal_alignment,
            completed_at: side.completed_at,
            completed_by: side.completed_by,
        }
    }
}

/// The viewer's own side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnSideView {
    pub state: SideState,
    pub content: SideContent,
}

/// The other actor's side as seen by the viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OtherSideView {
    /// "The other party has completed their assessment."
    pub completed: bool,
    /// Present only once both sides are completed.
    pub content: Option<SideContent>,
}

/// Official decision, visible after finalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfficialView {
    pub rating: Option<Rating>,
    pub shared_notes: Option<String>,
    pub energy_allocation: Option<EnergyAllocation>,
    pub completed_at: Option<i64>,
    pub finalized_by: Option<PersonId>,
}

/// Action a viewer may take on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SideAction {
    SaveDraft,
    Complete,
    MakeChanges,
    Finalize,
}

/// Viewer-specific projection of a review record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PerspectiveView {
    pub record_id: ReviewId,
    pub subject_id: PersonId,
    pub target: TargetRef,
    pub opened_on: NaiveDate,
    pub viewer: ReviewRole,
    pub state: CompositeState,
    pub own: OwnSideView,
    pub other: OtherSideView,
    pub official: Option<OfficialView>,
    pub allowed_actions: Vec<SideAction>,
}

/// Returns whether side content may cross between actors.
pub fn other_side_revealed(record: &ReviewRecord) -> bool {
    matches!(
        record.composite_state(),
        CompositeState::ReadyForFinalization | CompositeState::Finalized
    )
}

/// Projects `record` for a viewer acting in `viewer` role.
pub fn project(viewer: ReviewRole, record: &ReviewRecord) -> PerspectiveView {
    let own_side = record.side(viewer);
    let other_side = record.side(viewer.other());
    let state = record.composite_state();

    let other_content = if other_side_revealed(record) {
        Some(SideContent::from(other_side))
    } else {
        None
    };

    let official = if state == CompositeState::Finalized {
        Some(OfficialView {
            rating: record.official.rating,
            shared_notes: record.official.shared_notes.clone(),
            energy_allocation: record.official.energy_allocation,
            completed_at: record.official.completed_at,
            finalized_by: record.official.finalized_by,
        })
    } else {
        None
    };

    PerspectiveView {
        record_id: record.id,
        subject_id: record.subject_id,
        target: record.target,
        opened_on: record.opened_on,
        viewer,
        state,
        own: OwnSideView {
            state: own_side.state(),
            content: SideContent::from(own_side),
        },
        other: OtherSideView {
            completed: other_side.is_completed(),
            content: other_content,
        },
        official,
        allowed_actions: allowed_actions(viewer, record),
    }
}

/// Lists the actions legal for `role` on `record` right now.
pub fn allowed_actions(role: ReviewRole, record: &ReviewRecord) -> Vec<SideAction> {
    let state = record.composite_state();
    if state == CompositeState::Finalized {
        return Vec::new();
    }

    let mut actions = vec![SideAction::SaveDraft, SideAction::Complete];
    if record.side(role).is_completed() {
        actions.push(SideAction::MakeChanges);
    }
    if role == ReviewRole::Manager && state == CompositeState::ReadyForFinalization {
        actions.push(SideAction::Finalize);
    }
    actions
}
