//! Review record domain model and side state machine.
//!
//! # Responsibility
//! - Hold both actors' assessments and the official decision for one
//!   (subject, target) review cycle.
//! - Enforce side transitions: `NotStarted -> Drafted -> Completed`, with
//!   `Completed -> Drafted` allowed ("make changes").
//! - Derive the composite record state from both sides.
//!
//! # Invariants
//! - A side's `completed_at` is set only together with a non-null rating.
//! - Reverting a side to draft clears `completed_at`/`completed_by` and keeps
//!   every entered value.
//! - Once `official.completed_at` is set the record is read-only; a new review
//!   cycle is a new `ReviewRecord`.
//! - Ratings always fit the target kind's vocabulary.

use crate::model::actor::{Actor, OrganizationId, PersonId, ReviewId};
use crate::model::rating::{EnergyAllocation, PersonalAlignment, Rating};
use crate::model::target::{TargetKind, TargetRef};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Which actor owns a side of the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewRole {
    Employee,
    Manager,
}

impl ReviewRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Employee => "employee",
            Self::Manager => "manager",
        }
    }

    pub fn other(self) -> Self {
        match self {
            Self::Employee => Self::Manager,
            Self::Manager => Self::Employee,
        }
    }
}

/// Per-side progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideState {
    NotStarted,
    Drafted,
    Completed,
}

/// Record state derived from both sides and the official side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeState {
    BothPending,
    OneSideReady,
    ReadyForFinalization,
    Finalized,
}

impl CompositeState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BothPending => "both_pending",
            Self::OneSideReady => "one_side_ready",
            Self::ReadyForFinalization => "ready_for_finalization",
            Self::Finalized => "finalized",
        }
    }
}

/// Data-shape violations of a review record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewValidationError {
    /// Rating does not belong to the target kind's vocabulary.
    RatingScaleMismatch { kind: TargetKind, rating: Rating },
    /// Assignment-only field supplied for another target kind.
    AssignmentOnlyField {
        kind: TargetKind,
        field: &'static str,
    },
    /// Side carries `completed_at` without a rating.
    CompletedWithoutRating(ReviewRole),
    /// Official side carries `completed_at` without an official rating.
    FinalizedWithoutRating,
}

impl Display for ReviewValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RatingScaleMismatch { kind, rating } => write!(
                f,
                "rating `{rating}` is not valid for {} reviews",
                kind.as_str()
            ),
            Self::AssignmentOnlyField { kind, field } => write!(
                f,
                "`{field}` is only valid for assignment reviews, not {}",
                kind.as_str()
            ),
            Self::CompletedWithoutRating(role) => {
                write!(f, "{} side is completed without a rating", role.as_str())
            }
            Self::FinalizedWithoutRating => write!(f, "record is finalized without a rating"),
        }
    }
}

impl Error for ReviewValidationError {}

/// Illegal state transitions on a review record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The record is finalized and therefore read-only.
    RecordFinalized(ReviewId),
    /// A side cannot be completed without a rating.
    MissingRating(ReviewRole),
    /// Finalization requires both sides completed.
    NotReady {
        record_id: ReviewId,
        state: CompositeState,
    },
}

impl Display for TransitionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RecordFinalized(id) => write!(f, "review {id} is finalized and read-only"),
            Self::MissingRating(role) => {
                write!(f, "{} side cannot be completed without a rating", role.as_str())
            }
            Self::NotReady { record_id, state } => write!(
                f,
                "review {record_id} is {} and cannot be finalized",
                state.as_str()
            ),
        }
    }
}

impl Error for TransitionError {}

/// Error from review record mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewError {
    Validation(ReviewValidationError),
    Transition(TransitionError),
}

impl Display for ReviewError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Transition(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ReviewError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Transition(err) => Some(err),
        }
    }
}

impl From<ReviewValidationError> for ReviewError {
    fn from(value: ReviewValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<TransitionError> for ReviewError {
    fn from(value: TransitionError) -> Self {
        Self::Transition(value)
    }
}

/// One actor's assessment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSide {
    pub rating: Option<Rating>,
    /// Visible to the other actor only once both sides are completed.
    pub private_notes: Option<String>,
    /// Assignment only.
    pub energy_allocation: Option<EnergyAllocation>,
    /// Assignment only.
    pub personal_alignment: Option<PersonalAlignment>,
    /// Epoch milliseconds.
    pub completed_at: Option<i64>,
    /// Set for the manager side only.
    pub completed_by: Option<PersonId>,
}

impl ReviewSide {
    pub fn state(&self) -> SideState {
        if self.completed_at.is_some() {
            SideState::Completed
        } else if self.has_content() {
            SideState::Drafted
        } else {
            SideState::NotStarted
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    fn has_content(&self) -> bool {
        self.rating.is_some()
            || self.private_notes.is_some()
            || self.energy_allocation.is_some()
            || self.personal_alignment.is_some()
    }

    fn apply(&mut self, input: &SideInput) {
        if let Some(rating) = input.rating {
            self.rating = Some(rating);
        }
        if let Some(notes) = input.private_notes.as_ref() {
            self.private_notes = Some(notes.clone());
        }
        if let Some(energy) = input.energy_allocation {
            self.energy_allocation = Some(energy);
        }
        if let Some(alignment) = input.personal_alignment {
            self.personal_alignment = Some(alignment);
        }
    }

    fn revert_to_draft(&mut self) {
        self.completed_at = None;
        self.completed_by = None;
    }
}

/// The reconciled decision written at finalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficialSide {
    pub rating: Option<Rating>,
    pub shared_notes: Option<String>,
    /// Assignment only.
    pub energy_allocation: Option<EnergyAllocation>,
    /// Epoch milliseconds. Permanent once set.
    pub completed_at: Option<i64>,
    pub finalized_by: Option<PersonId>,
}

/// Partial update to one side. `None` fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SideInput {
    pub rating: Option<Rating>,
    pub private_notes: Option<String>,
    pub energy_allocation: Option<EnergyAllocation>,
    pub personal_alignment: Option<PersonalAlignment>,
}

impl SideInput {
    pub fn rated(rating: impl Into<Rating>) -> Self {
        Self {
            rating: Some(rating.into()),
            ..Self::default()
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.private_notes = Some(notes.into());
        self
    }

    pub fn with_energy(mut self, energy: EnergyAllocation) -> Self {
        self.energy_allocation = Some(energy);
        self
    }

    pub fn with_alignment(mut self, alignment: PersonalAlignment) -> Self {
        self.personal_alignment = Some(alignment);
        self
    }
}

/// Official decision chosen by the manager at finalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfficialInput {
    pub rating: Rating,
    pub shared_notes: Option<String>,
    pub energy_allocation: Option<EnergyAllocation>,
}

/// Check-in record for one (subject, target) review cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: ReviewId,
    pub organization_id: OrganizationId,
    pub subject_id: PersonId,
    pub target: TargetRef,
    pub opened_on: NaiveDate,
    pub employee: ReviewSide,
    pub manager: ReviewSide,
    pub official: OfficialSide,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

impl ReviewRecord {
    /// Creates an open record with empty sides.
    pub fn open(
        organization_id: OrganizationId,
        subject_id: PersonId,
        target: TargetRef,
        opened_on: NaiveDate,
        now_ms: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id,
            subject_id,
            target,
            opened_on,
            employee: ReviewSide::default(),
            manager: ReviewSide::default(),
            official: OfficialSide::default(),
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    pub fn side(&self, role: ReviewRole) -> &ReviewSide {
        match role {
            ReviewRole::Employee => &self.employee,
            ReviewRole::Manager => &self.manager,
        }
    }

    fn side_mut(&mut self, role: ReviewRole) -> &mut ReviewSide {
        match role {
            ReviewRole::Employee => &mut self.employee,
            ReviewRole::Manager => &mut self.manager,
        }
    }

    pub fn side_state(&self, role: ReviewRole) -> SideState {
        self.side(role).state()
    }

    pub fn composite_state(&self) -> CompositeState {
        if self.official.completed_at.is_some() {
            return CompositeState::Finalized;
        }
        match (self.employee.is_completed(), self.manager.is_completed()) {
            (true, true) => CompositeState::ReadyForFinalization,
            (false, false) => CompositeState::BothPending,
            _ => CompositeState::OneSideReady,
        }
    }

    pub fn is_open(&self) -> bool {
        self.official.completed_at.is_none()
    }

    /// Applies a partial update and leaves the side in draft.
    ///
    /// A completed side is reverted to draft; entered values are kept.
    pub fn save_draft(
        &mut self,
        role: ReviewRole,
        input: &SideInput,
        now_ms: i64,
    ) -> Result<(), ReviewError> {
        self.ensure_writable()?;
        self.validate_input(input)?;

        let side = self.side_mut(role);
        side.apply(input);
        side.revert_to_draft();
        self.updated_at = now_ms;
        Ok(())
    }

    /// Applies a partial update and marks the side completed.
    ///
    /// Nothing is changed when the resulting rating would be null.
    pub fn complete(
        &mut self,
        role: ReviewRole,
        actor: &Actor,
        input: &SideInput,
        now_ms: i64,
    ) -> Result<(), ReviewError> {
        self.ensure_writable()?;
        self.validate_input(input)?;
        if input.rating.is_none() && self.side(role).rating.is_none() {
            return Err(TransitionError::MissingRating(role).into());
        }

        let side = self.side_mut(role);
        side.apply(input);
        side.completed_at = Some(now_ms);
        side.completed_by = match role {
            ReviewRole::Manager => Some(actor.person_id),
            ReviewRole::Employee => None,
        };
        self.updated_at = now_ms;
        Ok(())
    }

    /// Reverts a completed side to draft without touching its content.
    ///
    /// A side that is not completed is left as is.
    pub fn make_changes(&mut self, role: ReviewRole, now_ms: i64) -> Result<(), ReviewError> {
        self.ensure_writable()?;
        let side = self.side_mut(role);
        if side.is_completed() {
            side.revert_to_draft();
            self.updated_at = now_ms;
        }
        Ok(())
    }

    /// Writes the official decision and closes the record permanently.
    pub fn finalize(
        &mut self,
        actor: &Actor,
        official: &OfficialInput,
        now_ms: i64,
    ) -> Result<(), ReviewError> {
        let state = self.composite_state();
        if state != CompositeState::ReadyForFinalization {
            return Err(TransitionError::NotReady {
                record_id: self.id,
                state,
            }
            .into());
        }
        self.check_rating(official.rating)?;
        if official.energy_allocation.is_some() {
            self.check_assignment_field("energy_allocation")?;
        }

        self.official = OfficialSide {
            rating: Some(official.rating),
            shared_notes: official.shared_notes.clone(),
            energy_allocation: official.energy_allocation,
            completed_at: Some(now_ms),
            finalized_by: Some(actor.person_id),
        };
        self.updated_at = now_ms;
        Ok(())
    }

    /// Validates persisted shape invariants.
    pub fn validate(&self) -> Result<(), ReviewValidationError> {
        for role in [ReviewRole::Employee, ReviewRole::Manager] {
            let side = self.side(role);
            if side.is_completed() && side.rating.is_none() {
                return Err(ReviewValidationError::CompletedWithoutRating(role));
            }
            if let Some(rating) = side.rating {
                self.check_rating(rating)?;
            }
            if side.energy_allocation.is_some() {
                self.check_assignment_field("energy_allocation")?;
            }
            if side.personal_alignment.is_some() {
                self.check_assignment_field("personal_alignment")?;
            }
        }

        if self.official.completed_at.is_some() && self.official.rating.is_none() {
            return Err(ReviewValidationError::FinalizedWithoutRating);
        }
        if let Some(rating) = self.official.rating {
            self.check_rating(rating)?;
        }
        if self.official.energy_allocation.is_some() {
            self.check_assignment_field("energy_allocation")?;
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<(), TransitionError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(TransitionError::RecordFinalized(self.id))
        }
    }

    fn validate_input(&self, input: &SideInput) -> Result<(), ReviewValidationError> {
        if let Some(rating) = input.rating {
            self.check_rating(rating)?;
        }
        if input.energy_allocation.is_some() {
            self.check_assignment_field("energy_allocation")?;
        }
        if input.personal_alignment.is_some() {
            self.check_assignment_field("personal_alignment")?;
        }
        Ok(())
    }

    fn check_rating(&self, rating: Rating) -> Result<(), ReviewValidationError> {
        if rating.fits(self.target.kind) {
            Ok(())
        } else {
            Err(ReviewValidationError::RatingScaleMismatch {
                kind: self.target.kind,
                rating,
            })
        }
    }

    fn check_assignment_field(&self, field: &'static str) -> Result<(), ReviewValidationError> {
        if self.target.kind.has_assignment_fields() {
            Ok(())
        } else {
            Err(ReviewValidationError::AssignmentOnlyField {
                kind: self.target.kind,
                field,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CompositeState, OfficialInput, ReviewError, ReviewRecord, ReviewRole,
        ReviewValidationError, SideInput, SideState, TransitionError,
    };
    use crate::model::actor::Actor;
    use crate::model::rating::{
        CategoricalRating, EnergyAllocation, PersonalAlignment, PositionRating, Rating,
    };
    use crate::model::target::TargetRef;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn record(target: TargetRef) -> ReviewRecord {
        ReviewRecord::open(
            Uuid::new_v4(),
            Uuid::new_v4(),
            target,
            NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date"),
            1_000,
        )
    }

    fn manager() -> Actor {
        Actor::new(Uuid::new_v4())
    }

    #[test]
    fn new_record_is_both_pending() {
        let record = record(TargetRef::assignment(Uuid::new_v4()));
        assert_eq!(record.composite_state(), CompositeState::BothPending);
        assert_eq!(record.side_state(ReviewRole::Employee), SideState::NotStarted);
        assert_eq!(record.side_state(ReviewRole::Manager), SideState::NotStarted);
        assert!(record.is_open());
    }

    #[test]
    fn composite_state_follows_both_sides() {
        let mut record = record(TargetRef::assignment(Uuid::new_v4()));
        let employee = Actor::new(record.subject_id);
        let manager = manager();

        record
            .complete(
                ReviewRole::Employee,
                &employee,
                &SideInput::rated(CategoricalRating::Meeting),
                2_000,
            )
            .expect("employee completes");
        assert_eq!(record.composite_state(), CompositeState::OneSideReady);

        record
            .complete(
                ReviewRole::Manager,
                &manager,
                &SideInput::rated(CategoricalRating::Exceeding),
                3_000,
            )
            .expect("manager completes");
        assert_eq!(
            record.composite_state(),
            CompositeState::ReadyForFinalization
        );
        assert_eq!(record.manager.completed_by, Some(manager.person_id));
        assert_eq!(record.employee.completed_by, None);
    }

    #[test]
    fn complete_requires_rating() {
        let mut record = record(TargetRef::aspiration(Uuid::new_v4()));
        let employee = Actor::new(record.subject_id);
        let err = record
            .complete(
                ReviewRole::Employee,
                &employee,
                &SideInput::default().with_notes("thoughts"),
                2_000,
            )
            .expect_err("completion without rating must fail");
        assert_eq!(
            err,
            ReviewError::Transition(TransitionError::MissingRating(ReviewRole::Employee))
        );
        assert_eq!(record.employee.private_notes, None);
        assert_eq!(record.side_state(ReviewRole::Employee), SideState::NotStarted);
    }

    #[test]
    fn draft_after_complete_keeps_values_and_clears_completion() {
        let mut record = record(TargetRef::position(Uuid::new_v4()));
        let manager = manager();
        let rating = Rating::Position(PositionRating::new(3).expect("valid"));

        record
            .complete(
                ReviewRole::Manager,
                &manager,
                &SideInput::rated(rating).with_notes("solid"),
                2_000,
            )
            .expect("manager completes");
        record
            .make_changes(ReviewRole::Manager, 3_000)
            .expect("make changes");

        assert_eq!(record.side_state(ReviewRole::Manager), SideState::Drafted);
        assert_eq!(record.manager.rating, Some(rating));
        assert_eq!(record.manager.private_notes.as_deref(), Some("solid"));
        assert_eq!(record.manager.completed_at, None);
        assert_eq!(record.manager.completed_by, None);
    }

    #[test]
    fn rejects_rating_from_other_vocabulary() {
        let mut record = record(TargetRef::position(Uuid::new_v4()));
        let err = record
            .save_draft(
                ReviewRole::Employee,
                &SideInput::rated(CategoricalRating::Meeting),
                2_000,
            )
            .expect_err("categorical rating on position must fail");
        assert!(matches!(
            err,
            ReviewError::Validation(ReviewValidationError::RatingScaleMismatch { .. })
        ));
    }

    #[test]
    fn assignment_fields_only_on_assignments() {
        let mut aspiration = record(TargetRef::aspiration(Uuid::new_v4()));
        let input = SideInput::default().with_energy(EnergyAllocation::new(40).expect("valid"));
        let err = aspiration
            .save_draft(ReviewRole::Employee, &input, 2_000)
            .expect_err("energy on aspiration must fail");
        assert!(matches!(
            err,
            ReviewError::Validation(ReviewValidationError::AssignmentOnlyField {
                field: "energy_allocation",
                ..
            })
        ));

        let mut assignment = record(TargetRef::assignment(Uuid::new_v4()));
        assignment
            .save_draft(
                ReviewRole::Employee,
                &input.with_alignment(PersonalAlignment::Love),
                2_000,
            )
            .expect("assignment accepts extras");
        assert_eq!(
            assignment.side_state(ReviewRole::Employee),
            SideState::Drafted
        );
    }

    #[test]
    fn finalize_requires_ready_state_and_locks_record() {
        let mut record = record(TargetRef::assignment(Uuid::new_v4()));
        let employee = Actor::new(record.subject_id);
        let manager = manager();
        let official = OfficialInput {
            rating: Rating::Categorical(CategoricalRating::Meeting),
            shared_notes: Some("agreed".to_string()),
            energy_allocation: None,
        };

        let err = record
            .finalize(&manager, &official, 2_000)
            .expect_err("not ready yet");
        assert!(matches!(
            err,
            ReviewError::Transition(TransitionError::NotReady {
                state: CompositeState::BothPending,
                ..
            })
        ));

        for (role, actor) in [(ReviewRole::Employee, employee), (ReviewRole::Manager, manager)] {
            record
                .complete(
                    role,
                    &actor,
                    &SideInput::rated(CategoricalRating::Meeting),
                    3_000,
                )
                .expect("side completes");
        }
        record
            .finalize(&manager, &official, 4_000)
            .expect("ready record finalizes");
        assert_eq!(record.composite_state(), CompositeState::Finalized);
        assert_eq!(record.official.finalized_by, Some(manager.person_id));

        let err = record
            .save_draft(ReviewRole::Employee, &SideInput::default(), 5_000)
            .expect_err("finalized record is read-only");
        assert_eq!(
            err,
            ReviewError::Transition(TransitionError::RecordFinalized(record.id))
        );
        assert!(record.make_changes(ReviewRole::Manager, 5_000).is_err());
    }

    #[test]
    fn validate_flags_completed_side_without_rating() {
        let mut record = record(TargetRef::assignment(Uuid::new_v4()));
        record.employee.completed_at = Some(2_000);
        assert_eq!(
            record.validate(),
            Err(ReviewValidationError::CompletedWithoutRating(
                ReviewRole::Employee
            ))
        );
    }
}
