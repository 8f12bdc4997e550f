mod common;

use checkin_core::{
    Actor, CategoricalRating, CheckInError, CompositeState, EnergyAllocation,
    FinalizationSelection, NotificationEvent, OrganizationId, PersonId, PositionRating,
    Rating, RecordingDispatcher, ReviewRole, SelectionResult, SideInput, SnapshotRepository,
    SqliteSnapshotRepository, SqliteTenureRepository, SuccessionError, SuccessionOutcome,
    TargetRef, TenureSuccession,
};
use chrono::NaiveDate;
use common::{today, Harness};
use rusqlite::Connection;
use std::sync::Arc;
use uuid::Uuid;

struct RejectingSuccession;

impl TenureSuccession for RejectingSuccession {
    fn end_and_succeed(
        &self,
        _conn: &Connection,
        _organization_id: OrganizationId,
        _subject_id: PersonId,
        _as_of: NaiveDate,
        _official_rating: PositionRating,
    ) -> Result<SuccessionOutcome, SuccessionError> {
        Err(SuccessionError::Rejected("tenure service offline".to_string()))
    }
}

fn rating(value: i64) -> PositionRating {
    PositionRating::new(value).unwrap()
}

fn start_tenure(harness: &Harness, position_id: Uuid) -> Uuid {
    SqliteTenureRepository::new(&harness.conn)
        .start_tenure(
            harness.org,
            harness.subject(),
            position_id,
            NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
        )
        .unwrap()
        .id
}

fn state_of(harness: &Harness, record_id: Uuid) -> CompositeState {
    harness
        .checkin()
        .view(&harness.manager, record_id)
        .unwrap()
        .state
}

#[test]
fn position_finalization_succeeds_tenure_as_of_today() {
    let harness = Harness::new();
    let position_id = Uuid::new_v4();
    let tenure_id = start_tenure(&harness, position_id);
    let record_id = harness.ready_review(
        TargetRef::position(position_id),
        &SideInput::rated(rating(3)),
    );

    let outcome = harness
        .coordinator()
        .finalize(
            &harness.manager,
            harness.subject(),
            &[FinalizationSelection::new(record_id, rating(3))],
        )
        .unwrap();

    assert!(outcome.is_complete_success());
    assert_eq!(outcome.finalized_ids(), vec![record_id]);

    let succession = outcome.succession.as_ref().unwrap();
    assert_eq!(succession.closed.id, tenure_id);
    assert_eq!(succession.closed.ended_on, Some(today()));
    assert_eq!(succession.closed.official_rating, Some(rating(3)));
    assert_eq!(succession.successor.started_on, today());
    assert_eq!(succession.successor.position_id, position_id);
    assert_eq!(succession.successor.official_rating, None);

    let tenures = SqliteTenureRepository::new(&harness.conn);
    let stored = tenures.get_tenure(tenure_id).unwrap().unwrap();
    assert_eq!(stored.ended_on, Some(today()));
    let active = tenures
        .active_tenure(harness.org, harness.subject())
        .unwrap()
        .unwrap();
    assert_eq!(active.id, succession.successor.id);
    assert!(active.is_active());
    assert_eq!(
        tenures.list_tenures(harness.org, harness.subject()).unwrap().len(),
        2
    );

    let snapshot = outcome.snapshot.as_ref().unwrap();
    assert_eq!(snapshot.record_ids(), vec![record_id]);
    assert_eq!(snapshot.finalized_by, harness.manager.person_id);
    assert_eq!(state_of(&harness, record_id), CompositeState::Finalized);
}

#[test]
fn only_selected_records_join_the_snapshot() {
    let harness = Harness::new();
    let input = SideInput::rated(CategoricalRating::Meeting);
    let selected = harness.ready_review(TargetRef::assignment(Uuid::new_v4()), &input);
    let left_out = harness.ready_review(TargetRef::assignment(Uuid::new_v4()), &input);

    let coordinator = harness.coordinator();
    let ready = coordinator
        .ready_for_finalization(&harness.manager, harness.subject())
        .unwrap();
    assert_eq!(ready.len(), 2);

    let outcome = coordinator
        .finalize(
            &harness.manager,
            harness.subject(),
            &[FinalizationSelection::new(selected, CategoricalRating::Exceeding)
                .with_energy(EnergyAllocation::new(40).unwrap())],
        )
        .unwrap();

    let snapshot = outcome.snapshot.unwrap();
    assert_eq!(snapshot.record_ids(), vec![selected]);
    assert!(outcome.succession.is_none());
    assert_eq!(harness.count("decision_snapshots"), 1);
    assert_eq!(state_of(&harness, left_out), CompositeState::ReadyForFinalization);

    let remaining = coordinator
        .ready_for_finalization(&harness.manager, harness.subject())
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, left_out);
}

#[test]
fn mixed_selection_finalizes_eligible_and_reports_the_rest() {
    let harness = Harness::new();
    let ready = harness.ready_review(
        TargetRef::aspiration(Uuid::new_v4()),
        &SideInput::rated(CategoricalRating::Meeting),
    );

    let service = harness.checkin();
    let pending = service
        .open_review(
            &harness.employee,
            harness.org,
            harness.subject(),
            TargetRef::aspiration(Uuid::new_v4()),
        )
        .unwrap()
        .record_id;
    service
        .complete(
            &harness.employee,
            ReviewRole::Employee,
            pending,
            &SideInput::rated(CategoricalRating::Meeting),
        )
        .unwrap();

    let other_employee = Actor::new(Uuid::new_v4());
    harness
        .directory
        .assign(harness.manager.person_id, other_employee.person_id);
    let foreign = service
        .open_review(
            &other_employee,
            harness.org,
            other_employee.person_id,
            TargetRef::aspiration(Uuid::new_v4()),
        )
        .unwrap()
        .record_id;
    let missing = Uuid::new_v4();

    let outcome = harness
        .coordinator()
        .finalize(
            &harness.manager,
            harness.subject(),
            &[
                FinalizationSelection::new(pending, CategoricalRating::Meeting),
                FinalizationSelection::new(ready, CategoricalRating::Meeting),
                FinalizationSelection::new(ready, CategoricalRating::Exceeding),
                FinalizationSelection::new(missing, CategoricalRating::Meeting),
                FinalizationSelection::new(foreign, CategoricalRating::Meeting),
            ],
        )
        .unwrap();

    assert!(!outcome.is_complete_success());
    assert_eq!(outcome.finalized_ids(), vec![ready]);
    assert_eq!(outcome.results.len(), 5);
    let order: Vec<_> = outcome.results.iter().map(SelectionResult::record_id).collect();
    assert_eq!(order, vec![pending, ready, ready, missing, foreign]);

    let skipped = outcome.skipped();
    assert_eq!(skipped.len(), 4);
    assert!(matches!(
        skipped[0],
        (id, CheckInError::NotEligibleForFinalization { state: CompositeState::OneSideReady, .. })
            if id == pending
    ));
    assert!(matches!(
        skipped[1].1,
        CheckInError::NotEligibleForFinalization { state: CompositeState::Finalized, .. }
    ));
    assert!(matches!(skipped[2].1, CheckInError::ReviewNotFound(id) if *id == missing));
    assert!(matches!(skipped[3].1, CheckInError::Forbidden { .. }));

    let snapshot = outcome.snapshot.unwrap();
    assert_eq!(snapshot.record_ids(), vec![ready]);
    assert_eq!(
        snapshot.records[0].official.rating,
        Some(Rating::Categorical(CategoricalRating::Meeting))
    );
    assert_eq!(state_of(&harness, pending), CompositeState::OneSideReady);
    let foreign_view = service.view(&harness.manager, foreign).unwrap();
    assert_eq!(foreign_view.state, CompositeState::BothPending);
}

#[test]
fn official_rating_outside_target_vocabulary_is_skipped() {
    let harness = Harness::new();
    let record_id = harness.ready_review(
        TargetRef::assignment(Uuid::new_v4()),
        &SideInput::rated(CategoricalRating::Meeting),
    );

    let outcome = harness
        .coordinator()
        .finalize(
            &harness.manager,
            harness.subject(),
            &[FinalizationSelection::new(record_id, rating(2))],
        )
        .unwrap();

    assert!(outcome.snapshot.is_none());
    assert!(matches!(
        outcome.skipped()[0].1,
        CheckInError::Validation(_)
    ));
    assert_eq!(harness.count("decision_snapshots"), 0);
    assert_eq!(state_of(&harness, record_id), CompositeState::ReadyForFinalization);
    assert!(harness.notifier.events().is_empty());
}

#[test]
fn succession_failure_rolls_back_the_whole_batch() {
    let harness = Harness::new();
    let position_id = Uuid::new_v4();
    start_tenure(&harness, position_id);
    let position = harness.ready_review(
        TargetRef::position(position_id),
        &SideInput::rated(rating(4)),
    );
    let assignment = harness.ready_review(
        TargetRef::assignment(Uuid::new_v4()),
        &SideInput::rated(CategoricalRating::Exceeding),
    );

    let err = harness
        .coordinator_with(Arc::new(RejectingSuccession))
        .finalize(
            &harness.manager,
            harness.subject(),
            &[
                FinalizationSelection::new(assignment, CategoricalRating::Exceeding),
                FinalizationSelection::new(position, rating(4)),
            ],
        )
        .unwrap_err();

    assert!(matches!(err, CheckInError::SnapshotConsistencyFailure(_)));
    assert_eq!(state_of(&harness, position), CompositeState::ReadyForFinalization);
    assert_eq!(state_of(&harness, assignment), CompositeState::ReadyForFinalization);
    assert_eq!(harness.count("decision_snapshots"), 0);
    assert_eq!(harness.count("decision_snapshot_records"), 0);
    assert!(harness.notifier.events().is_empty());
}

#[test]
fn missing_active_tenure_fails_position_finalization() {
    let harness = Harness::new();
    let record_id = harness.ready_review(
        TargetRef::position(Uuid::new_v4()),
        &SideInput::rated(rating(3)),
    );

    let err = harness
        .coordinator()
        .finalize(
            &harness.manager,
            harness.subject(),
            &[FinalizationSelection::new(record_id, rating(3))],
        )
        .unwrap_err();

    assert!(matches!(err, CheckInError::SnapshotConsistencyFailure(_)));
    assert_eq!(state_of(&harness, record_id), CompositeState::ReadyForFinalization);
}

#[test]
fn snapshot_write_failure_rolls_back_records_and_succession() {
    let harness = Harness::new();
    let position_id = Uuid::new_v4();
    let tenure_id = start_tenure(&harness, position_id);
    let record_id = harness.ready_review(
        TargetRef::position(position_id),
        &SideInput::rated(rating(3)),
    );
    harness
        .conn
        .execute_batch(
            "CREATE TRIGGER trg_test_snapshot_store_offline
             BEFORE INSERT ON decision_snapshots
             BEGIN
                 SELECT RAISE(ABORT, 'snapshot store offline');
             END;",
        )
        .unwrap();

    let err = harness
        .coordinator()
        .finalize(
            &harness.manager,
            harness.subject(),
            &[FinalizationSelection::new(record_id, rating(3))],
        )
        .unwrap_err();

    assert!(matches!(err, CheckInError::SnapshotConsistencyFailure(_)));
    assert_eq!(state_of(&harness, record_id), CompositeState::ReadyForFinalization);
    let tenures = SqliteTenureRepository::new(&harness.conn);
    let active = tenures
        .active_tenure(harness.org, harness.subject())
        .unwrap()
        .unwrap();
    assert_eq!(active.id, tenure_id);
    assert_eq!(active.official_rating, None);
    assert_eq!(harness.count("employment_tenures"), 1);
}

#[test]
fn unauthorized_finalize_writes_nothing() {
    let harness = Harness::new();
    let record_id = harness.ready_review(
        TargetRef::aspiration(Uuid::new_v4()),
        &SideInput::rated(CategoricalRating::Meeting),
    );
    let selection = [FinalizationSelection::new(record_id, CategoricalRating::Meeting)];

    for actor in [&harness.outsider, &harness.employee] {
        let err = harness
            .coordinator()
            .finalize(actor, harness.subject(), &selection)
            .unwrap_err();
        assert!(matches!(err, CheckInError::Forbidden { .. }));
    }
    let listing = harness
        .coordinator()
        .ready_for_finalization(&harness.outsider, harness.subject());
    assert!(matches!(listing, Err(CheckInError::Forbidden { .. })));

    assert_eq!(state_of(&harness, record_id), CompositeState::ReadyForFinalization);
    assert_eq!(harness.count("decision_snapshots"), 0);
    assert!(harness.notifier.events().is_empty());
}

#[test]
fn notifier_failure_does_not_change_the_outcome() {
    let harness = Harness::with_notifier(RecordingDispatcher::failing());
    let record_id = harness.ready_review(
        TargetRef::assignment(Uuid::new_v4()),
        &SideInput::rated(CategoricalRating::Meeting),
    );

    let outcome = harness
        .coordinator()
        .finalize(
            &harness.manager,
            harness.subject(),
            &[FinalizationSelection::new(record_id, CategoricalRating::Meeting)],
        )
        .unwrap();

    let snapshot = outcome.snapshot.unwrap();
    let stored = SqliteSnapshotRepository::new(&harness.conn)
        .get_snapshot(snapshot.id)
        .unwrap()
        .unwrap();
    assert_eq!(stored, snapshot);
    assert_eq!(
        harness.notifier.events(),
        vec![(
            harness.subject(),
            NotificationEvent::Finalized {
                snapshot_id: snapshot.id,
                record_count: 1,
            }
        )]
    );
}

#[test]
fn empty_selection_writes_no_snapshot() {
    let harness = Harness::new();
    let outcome = harness
        .coordinator()
        .finalize(&harness.manager, harness.subject(), &[])
        .unwrap();

    assert!(outcome.snapshot.is_none());
    assert!(outcome.results.is_empty());
    assert!(!outcome.is_complete_success());
    assert_eq!(harness.count("decision_snapshots"), 0);
}

#[test]
fn rejected_selection_does_not_block_a_corrected_repeat() {
    let harness = Harness::new();
    let record_id = harness.ready_review(
        TargetRef::assignment(Uuid::new_v4()),
        &SideInput::rated(CategoricalRating::Meeting),
    );

    let outcome = harness
        .coordinator()
        .finalize(
            &harness.manager,
            harness.subject(),
            &[
                FinalizationSelection::new(record_id, rating(3)),
                FinalizationSelection::new(record_id, CategoricalRating::Meeting),
                FinalizationSelection::new(record_id, CategoricalRating::Exceeding),
            ],
        )
        .unwrap();

    assert!(matches!(
        outcome.results[0],
        SelectionResult::Skipped {
            reason: CheckInError::Validation(_),
            ..
        }
    ));
    assert!(matches!(
        outcome.results[1],
        SelectionResult::Finalized { record_id: id } if id == record_id
    ));
    assert!(matches!(
        outcome.results[2],
        SelectionResult::Skipped {
            reason: CheckInError::NotEligibleForFinalization {
                state: CompositeState::Finalized,
                ..
            },
            ..
        }
    ));

    let snapshot = outcome.snapshot.unwrap();
    assert_eq!(snapshot.record_ids(), vec![record_id]);
    assert_eq!(
        snapshot.records[0].official.rating,
        Some(Rating::Categorical(CategoricalRating::Meeting))
    );
    assert_eq!(state_of(&harness, record_id), CompositeState::Finalized);
}

#[test]
fn several_position_records_trigger_one_succession_with_first_rating() {
    let harness = Harness::new();
    let current_position = Uuid::new_v4();
    let tenure_id = start_tenure(&harness, current_position);
    let first = harness.ready_review(
        TargetRef::position(current_position),
        &SideInput::rated(rating(2)),
    );
    let second = harness.ready_review(
        TargetRef::position(Uuid::new_v4()),
        &SideInput::rated(rating(4)),
    );

    let outcome = harness
        .coordinator()
        .finalize(
            &harness.manager,
            harness.subject(),
            &[
                FinalizationSelection::new(first, rating(2)),
                FinalizationSelection::new(second, rating(4)),
            ],
        )
        .unwrap();

    assert!(outcome.is_complete_success());
    let succession = outcome.succession.unwrap();
    assert_eq!(succession.closed.id, tenure_id);
    assert_eq!(succession.closed.official_rating, Some(rating(2)));
    assert_eq!(succession.successor.position_id, current_position);

    let tenures = SqliteTenureRepository::new(&harness.conn)
        .list_tenures(harness.org, harness.subject())
        .unwrap();
    assert_eq!(tenures.len(), 2);
    assert_eq!(tenures.iter().filter(|tenure| tenure.is_active()).count(), 1);
    assert_eq!(outcome.snapshot.unwrap().record_ids(), vec![first, second]);
}
