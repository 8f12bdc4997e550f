//! Finalization coordinator.
//!
//! # Responsibility
//! - Reconcile a manager-selected batch of ready reviews into official
//!   decisions plus one decision snapshot.
//! - Trigger tenure succession when a position review is finalized.
//! - Report per-selection results precisely.
//!
//! # Invariants
//! - Authorization is checked before the transaction opens; a forbidden call
//!   writes nothing.
//! - Ineligible selections are skipped individually and leave their records
//!   untouched.
//! - Record closure, succession and snapshot insert share one immediate
//!   transaction; any failure among them rolls back the whole batch.
//! - Notification happens after commit and never changes the outcome.

use crate::clock::Clock;
use crate::collab::authorization::AuthorizationOracle;
use crate::collab::notification::{
    dispatch_best_effort, NotificationDispatcher, NotificationEvent,
};
use crate::collab::succession::{SuccessionOutcome, TenureSuccession};
use crate::model::actor::{Actor, PersonId, ReviewId};
use crate::model::rating::{EnergyAllocation, Rating};
use crate::model::review::{CompositeState, OfficialInput, ReviewRecord};
use crate::model::snapshot::DecisionSnapshot;
use crate::model::target::TargetKind;
use crate::repo::review_repo::{ReviewRepository, SqliteReviewRepository};
use crate::repo::snapshot_repo::{SnapshotRepository, SqliteSnapshotRepository};
use crate::service::error::{CheckInError, CheckInResult};
use log::{error, info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::sync::Arc;

/// One record chosen for finalization with its official decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizationSelection {
    pub record_id: ReviewId,
    pub official_rating: Rating,
    pub shared_notes: Option<String>,
    /// Assignment only.
    pub energy_allocation: Option<EnergyAllocation>,
}

impl FinalizationSelection {
    pub fn new(record_id: ReviewId, official_rating: impl Into<Rating>) -> Self {
        Self {
            record_id,
            official_rating: official_rating.into(),
            shared_notes: None,
            energy_allocation: None,
        }
    }

    pub fn with_shared_notes(mut self, notes: impl Into<String>) -> Self {
        self.shared_notes = Some(notes.into());
        self
    }

    pub fn with_energy(mut self, energy: EnergyAllocation) -> Self {
        self.energy_allocation = Some(energy);
        self
    }

    fn official_input(&self) -> OfficialInput {
        OfficialInput {
            rating: self.official_rating,
            shared_notes: self.shared_notes.clone(),
            energy_allocation: self.energy_allocation,
        }
    }
}

/// Per-selection result of one finalize call.
#[derive(Debug)]
pub enum SelectionResult {
    Finalized { record_id: ReviewId },
    Skipped {
        record_id: ReviewId,
        reason: CheckInError,
    },
}

impl SelectionResult {
    pub fn record_id(&self) -> ReviewId {
        match self {
            Self::Finalized { record_id } | Self::Skipped { record_id, .. } => *record_id,
        }
    }
}

/// Outcome of one finalize call.
#[derive(Debug)]
pub struct FinalizationOutcome {
    /// `None` when no selection was accepted.
    pub snapshot: Option<DecisionSnapshot>,
    /// One entry per selection, in input order.
    pub results: Vec<SelectionResult>,
    pub succession: Option<SuccessionOutcome>,
}

impl FinalizationOutcome {
    pub fn finalized_ids(&self) -> Vec<ReviewId> {
        self.results
            .iter()
            .filter_map(|result| match result {
                SelectionResult::Finalized { record_id } => Some(*record_id),
                SelectionResult::Skipped { .. } => None,
            })
            .collect()
    }

    pub fn skipped(&self) -> Vec<(ReviewId, &CheckInError)> {
        self.results
            .iter()
            .filter_map(|result| match result {
                SelectionResult::Skipped { record_id, reason } => Some((*record_id, reason)),
                SelectionResult::Finalized { .. } => None,
            })
            .collect()
    }

    /// `true` when every selection was finalized.
    pub fn is_complete_success(&self) -> bool {
        !self.results.is_empty()
            && self
                .results
                .iter()
                .all(|result| matches!(result, SelectionResult::Finalized { .. }))
    }
}

/// Batch finalization over one SQLite connection.
pub struct FinalizationCoordinator<'conn> {
    conn: &'conn Connection,
    oracle: Arc<dyn AuthorizationOracle>,
    succession: Arc<dyn TenureSuccession>,
    notifier: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
}

impl<'conn> FinalizationCoordinator<'conn> {
    pub fn new(
        conn: &'conn Connection,
        oracle: Arc<dyn AuthorizationOracle>,
        succession: Arc<dyn TenureSuccession>,
        notifier: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            conn,
            oracle,
            succession,
            notifier,
            clock,
        }
    }

    /// Lists the subject's reviews currently ready for finalization.
    ///
    /// Managers see both sides in full here, since both are completed.
    pub fn ready_for_finalization(
        &self,
        actor: &Actor,
        subject_id: PersonId,
    ) -> CheckInResult<Vec<ReviewRecord>> {
        self.authorize(actor, subject_id)?;
        let records = SqliteReviewRepository::new(self.conn).list_open_for_subject(subject_id)?;
        Ok(records
            .into_iter()
            .filter(|record| record.composite_state() == CompositeState::ReadyForFinalization)
            .collect())
    }

    /// Finalizes the accepted subset of `selections` atomically.
    ///
    /// # Errors
    /// - `Forbidden` when the actor cannot manage the subject; nothing written.
    /// - `SnapshotConsistencyFailure` when closure, succession or snapshot
    ///   writing fails; the whole batch is rolled back.
    ///
    /// Ineligible selections are not errors; they are reported as
    /// `SelectionResult::Skipped` in the outcome.
    pub fn finalize(
        &self,
        actor: &Actor,
        subject_id: PersonId,
        selections: &[FinalizationSelection],
    ) -> CheckInResult<FinalizationOutcome> {
        self.authorize(actor, subject_id)?;

        let now_ms = self.clock.now_ms();
        let today = self.clock.today();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(|err| consistency_failure("begin", err))?;
        let reviews = SqliteReviewRepository::new(&tx);

        let mut results = Vec::with_capacity(selections.len());
        let mut closed: Vec<ReviewRecord> = Vec::new();

        for selection in selections {
            let record_id = selection.record_id;
            // Re-read inside the transaction: a record already closed by an
            // earlier selection of this batch reports its finalized state.
            let mut record = match reviews.get_review(record_id) {
                Ok(Some(record)) => record,
                Ok(None) => {
                    results.push(skip(record_id, CheckInError::ReviewNotFound(record_id)));
                    continue;
                }
                Err(err) => return Err(consistency_failure("load_review", err)),
            };

            if let Some(reason) = self.selection_conflict(actor, subject_id, &record, &closed) {
                results.push(skip(record_id, reason));
                continue;
            }

            if let Err(err) = record.finalize(actor, &selection.official_input(), now_ms) {
                results.push(skip(record_id, err.into()));
                continue;
            }
            if let Err(err) = reviews.write_official(&record) {
                return Err(consistency_failure("write_official", err));
            }
            results.push(SelectionResult::Finalized { record_id });
            closed.push(record);
        }

        let Some(first) = closed.first() else {
            info!(
                "event=finalize module=service status=skipped subject_id={subject_id} selections={} finalized=0",
                selections.len()
            );
            return Ok(FinalizationOutcome {
                snapshot: None,
                results,
                succession: None,
            });
        };
        let organization_id = first.organization_id;

        let position_rating = closed
            .iter()
            .filter(|record| record.target.kind == TargetKind::Position)
            .find_map(|record| record.official.rating.and_then(Rating::as_position));
        let succession = match position_rating {
            Some(rating) => Some(
                self.succession
                    .end_and_succeed(&tx, organization_id, subject_id, today, rating)
                    .map_err(|err| consistency_failure("tenure_succession", err))?,
            ),
            None => None,
        };

        let snapshot = DecisionSnapshot::new(
            organization_id,
            subject_id,
            closed,
            actor.person_id,
            now_ms,
        );
        SqliteSnapshotRepository::new(&tx)
            .insert_snapshot(&snapshot)
            .map_err(|err| consistency_failure("insert_snapshot", err))?;
        tx.commit()
            .map_err(|err| consistency_failure("commit", err))?;

        let outcome = FinalizationOutcome {
            snapshot: Some(snapshot),
            results,
            succession,
        };
        if let Some(snapshot) = outcome.snapshot.as_ref() {
            info!(
                "event=finalize module=service status=ok subject_id={subject_id} snapshot_id={} selections={} finalized={} succession={}",
                snapshot.id,
                selections.len(),
                snapshot.records.len(),
                outcome.succession.is_some()
            );
            dispatch_best_effort(
                self.notifier.as_ref(),
                subject_id,
                &NotificationEvent::Finalized {
                    snapshot_id: snapshot.id,
                    record_count: snapshot.records.len(),
                },
            );
        }
        Ok(outcome)
    }

    fn authorize(&self, actor: &Actor, subject_id: PersonId) -> CheckInResult<()> {
        if !actor.is(subject_id) && self.oracle.can_manage(actor, subject_id) {
            return Ok(());
        }
        warn!(
            "event=finalize module=service status=error error_code=forbidden actor_id={} subject_id={subject_id}",
            actor.person_id
        );
        Err(CheckInError::Forbidden {
            actor_id: actor.person_id,
            subject_id,
        })
    }

    /// Rejects records that cannot join this batch regardless of state.
    fn selection_conflict(
        &self,
        actor: &Actor,
        subject_id: PersonId,
        record: &ReviewRecord,
        closed: &[ReviewRecord],
    ) -> Option<CheckInError> {
        let foreign_org = closed
            .first()
            .is_some_and(|first| first.organization_id != record.organization_id);
        if record.subject_id != subject_id || foreign_org {
            return Some(CheckInError::Forbidden {
                actor_id: actor.person_id,
                subject_id: record.subject_id,
            });
        }
        None
    }
}

fn skip(record_id: ReviewId, reason: CheckInError) -> SelectionResult {
    warn!(
        "event=finalize_selection module=service status=skipped review_id={record_id} error_code={}",
        reason.code()
    );
    SelectionResult::Skipped { record_id, reason }
}

fn consistency_failure(stage: &'static str, err: impl std::fmt::Display) -> CheckInError {
    error!(
        "event=finalize module=service status=error error_code=snapshot_consistency_failure stage={stage} error={err}"
    );
    CheckInError::SnapshotConsistencyFailure(format!("{stage}: {err}"))
}
