//! Check-in use-case service.
//!
//! # Responsibility
//! - Open reviews through the single-open registry.
//! - Apply draft/complete/make-changes transitions to one actor's side.
//! - Serve record reads filtered through the blind perspective gate.
//!
//! # Invariants
//! - Employee-side writes require the actor to be the subject.
//! - Manager-side writes require `AuthorizationOracle::can_manage`.
//! - Every read returns a `PerspectiveView`; raw records never leave the
//!   service, so in-progress content cannot leak to the other actor.

use crate::clock::Clock;
use crate::collab::authorization::AuthorizationOracle;
use crate::model::actor::{Actor, OrganizationId, PersonId, ReviewId};
use crate::model::review::{ReviewError, ReviewRecord, ReviewRole, SideInput};
use crate::model::target::TargetRef;
use crate::perspective::{project, PerspectiveView};
use crate::repo::review_repo::ReviewRepository;
use crate::service::error::{CheckInError, CheckInResult};
use log::{info, warn};
use std::sync::Arc;

/// Check-in service facade over a review repository.
pub struct CheckInService<R: ReviewRepository> {
    repo: R,
    oracle: Arc<dyn AuthorizationOracle>,
    clock: Arc<dyn Clock>,
}

impl<R: ReviewRepository> CheckInService<R> {
    pub fn new(repo: R, oracle: Arc<dyn AuthorizationOracle>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            oracle,
            clock,
        }
    }

    /// Returns the open review for (subject, target), opening one dated today
    /// if none exists.
    ///
    /// Either the subject or one of their managers may open a review.
    pub fn open_review(
        &self,
        actor: &Actor,
        organization_id: OrganizationId,
        subject_id: PersonId,
        target: TargetRef,
    ) -> CheckInResult<PerspectiveView> {
        let role = self.resolve_role(actor, subject_id)?;
        let record = self.repo.open_or_create(
            organization_id,
            subject_id,
            target,
            self.clock.today(),
            self.clock.now_ms(),
        )?;
        Ok(project(role, &record))
    }

    /// Saves a partial update to the actor's side as draft.
    ///
    /// Saving over a completed side reverts it to draft.
    pub fn save_draft(
        &self,
        actor: &Actor,
        role: ReviewRole,
        record_id: ReviewId,
        input: &SideInput,
    ) -> CheckInResult<PerspectiveView> {
        self.write_side(actor, role, record_id, "checkin_draft", |record, now_ms| {
            record.save_draft(role, input, now_ms)
        })
    }

    /// Saves a partial update and marks the actor's side completed.
    pub fn complete(
        &self,
        actor: &Actor,
        role: ReviewRole,
        record_id: ReviewId,
        input: &SideInput,
    ) -> CheckInResult<PerspectiveView> {
        self.write_side(actor, role, record_id, "checkin_complete", |record, now_ms| {
            record.complete(role, actor, input, now_ms)
        })
    }

    /// Reverts the actor's completed side to draft, keeping its content.
    pub fn make_changes(
        &self,
        actor: &Actor,
        role: ReviewRole,
        record_id: ReviewId,
    ) -> CheckInResult<PerspectiveView> {
        self.write_side(actor, role, record_id, "checkin_make_changes", |record, now_ms| {
            record.make_changes(role, now_ms)
        })
    }

    /// Reads one record from the actor's perspective.
    pub fn view(&self, actor: &Actor, record_id: ReviewId) -> CheckInResult<PerspectiveView> {
        let record = self.load(record_id)?;
        let role = self.resolve_role(actor, record.subject_id)?;
        Ok(project(role, &record))
    }

    /// Lists the subject's open reviews from the actor's perspective.
    pub fn list_open(
        &self,
        actor: &Actor,
        subject_id: PersonId,
    ) -> CheckInResult<Vec<PerspectiveView>> {
        let role = self.resolve_role(actor, subject_id)?;
        let records = self.repo.list_open_for_subject(subject_id)?;
        Ok(records.iter().map(|record| project(role, record)).collect())
    }

    /// Most recent finalized review for (subject, target), if any.
    pub fn latest_official(
        &self,
        actor: &Actor,
        subject_id: PersonId,
        target: TargetRef,
    ) -> CheckInResult<Option<PerspectiveView>> {
        let role = self.resolve_role(actor, subject_id)?;
        Ok(self
            .repo
            .latest_finalized(subject_id, target)?
            .map(|record| project(role, &record)))
    }

    fn write_side(
        &self,
        actor: &Actor,
        role: ReviewRole,
        record_id: ReviewId,
        event: &'static str,
        apply: impl FnOnce(&mut ReviewRecord, i64) -> Result<(), ReviewError>,
    ) -> CheckInResult<PerspectiveView> {
        let mut record = self.load(record_id)?;
        self.authorize(actor, role, record.subject_id)?;

        if let Err(err) = apply(&mut record, self.clock.now_ms()) {
            let err = CheckInError::from(err);
            warn!(
                "event={event} module=service status=error review_id={record_id} role={} error_code={}",
                role.as_str(),
                err.code()
            );
            return Err(err);
        }
        self.repo.save_side(&record, role)?;

        info!(
            "event={event} module=service status=ok review_id={record_id} role={} state={}",
            role.as_str(),
            record.composite_state().as_str()
        );
        Ok(project(role, &record))
    }

    fn load(&self, record_id: ReviewId) -> CheckInResult<ReviewRecord> {
        self.repo
            .get_review(record_id)?
            .ok_or(CheckInError::ReviewNotFound(record_id))
    }

    fn authorize(
        &self,
        actor: &Actor,
        role: ReviewRole,
        subject_id: PersonId,
    ) -> CheckInResult<()> {
        let allowed = match role {
            ReviewRole::Employee => actor.is(subject_id),
            ReviewRole::Manager => {
                !actor.is(subject_id) && self.oracle.can_manage(actor, subject_id)
            }
        };
        if allowed {
            Ok(())
        } else {
            Err(CheckInError::Forbidden {
                actor_id: actor.person_id,
                subject_id,
            })
        }
    }

    fn resolve_role(&self, actor: &Actor, subject_id: PersonId) -> CheckInResult<ReviewRole> {
        if actor.is(subject_id) {
            return Ok(ReviewRole::Employee);
        }
        if self.oracle.can_manage(actor, subject_id) {
            return Ok(ReviewRole::Manager);
        }
        Err(CheckInError::Forbidden {
            actor_id: actor.person_id,
            subject_id,
        })
    }
}
