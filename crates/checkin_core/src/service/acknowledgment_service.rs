//! Decision snapshot acknowledgment and history.
//!
//! # Invariants
//! - Only the snapshot's subject may acknowledge it.
//! - Acknowledgment is idempotent: the first timestamp wins and later calls
//!   return the snapshot unchanged.
//! - The acknowledged notification fires once, on the first write.

use crate::clock::Clock;
use crate::collab::authorization::AuthorizationOracle;
use crate::collab::notification::{
    dispatch_best_effort, NotificationDispatcher, NotificationEvent,
};
use crate::model::actor::{Actor, PersonId, SnapshotId};
use crate::model::snapshot::DecisionSnapshot;
use crate::repo::snapshot_repo::SnapshotRepository;
use crate::service::error::{CheckInError, CheckInResult};
use log::{info, warn};
use std::sync::Arc;

/// Acknowledgment service facade over a snapshot repository.
pub struct AcknowledgmentService<S: SnapshotRepository> {
    repo: S,
    oracle: Arc<dyn AuthorizationOracle>,
    notifier: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
}

impl<S: SnapshotRepository> AcknowledgmentService<S> {
    pub fn new(
        repo: S,
        oracle: Arc<dyn AuthorizationOracle>,
        notifier: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            oracle,
            notifier,
            clock,
        }
    }

    /// Records that the subject has seen the snapshot.
    ///
    /// Calling again after the first acknowledgment is a no-op that returns
    /// the stored snapshot.
    pub fn acknowledge(
        &self,
        actor: &Actor,
        snapshot_id: SnapshotId,
    ) -> CheckInResult<DecisionSnapshot> {
        let snapshot = self.load(snapshot_id)?;
        if !actor.is(snapshot.subject_id) {
            warn!(
                "event=snapshot_acknowledge module=service status=error error_code=forbidden snapshot_id={snapshot_id} actor_id={}",
                actor.person_id
            );
            return Err(CheckInError::Forbidden {
                actor_id: actor.person_id,
                subject_id: snapshot.subject_id,
            });
        }
        if snapshot.is_acknowledged() {
            info!(
                "event=snapshot_acknowledge module=service status=noop snapshot_id={snapshot_id}"
            );
            return Ok(snapshot);
        }

        let written = self.repo.mark_acknowledged(snapshot_id, self.clock.now_ms())?;
        let snapshot = self.load(snapshot_id)?;
        if written {
            info!("event=snapshot_acknowledge module=service status=ok snapshot_id={snapshot_id}");
            dispatch_best_effort(
                self.notifier.as_ref(),
                snapshot.subject_id,
                &NotificationEvent::Acknowledged { snapshot_id },
            );
        }
        Ok(snapshot)
    }

    /// Snapshot history of one subject, newest first.
    ///
    /// Readable by the subject and by their managers.
    pub fn snapshot_history(
        &self,
        actor: &Actor,
        subject_id: PersonId,
    ) -> CheckInResult<Vec<DecisionSnapshot>> {
        self.authorize_read(actor, subject_id)?;
        Ok(self.repo.list_for_subject(subject_id)?)
    }

    /// The actor's own snapshots awaiting acknowledgment, oldest first.
    pub fn pending_acknowledgments(&self, actor: &Actor) -> CheckInResult<Vec<DecisionSnapshot>> {
        Ok(self.repo.list_unacknowledged(actor.person_id)?)
    }

    pub fn get_snapshot(
        &self,
        actor: &Actor,
        snapshot_id: SnapshotId,
    ) -> CheckInResult<DecisionSnapshot> {
        let snapshot = self.load(snapshot_id)?;
        self.authorize_read(actor, snapshot.subject_id)?;
        Ok(snapshot)
    }

    fn load(&self, snapshot_id: SnapshotId) -> CheckInResult<DecisionSnapshot> {
        self.repo
            .get_snapshot(snapshot_id)?
            .ok_or(CheckInError::SnapshotNotFound(snapshot_id))
    }

    fn authorize_read(&self, actor: &Actor, subject_id: PersonId) -> CheckInResult<()> {
        if actor.is(subject_id) || self.oracle.can_manage(actor, subject_id) {
            return Ok(());
        }
        Err(CheckInError::Forbidden {
            actor_id: actor.person_id,
            subject_id,
        })
    }
}
