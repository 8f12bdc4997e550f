mod common;

use checkin_core::{
    CategoricalRating, CheckInError, DecisionSnapshot, FinalizationSelection, NotificationEvent,
    SideInput, TargetRef,
};
use chrono::Duration;
use common::Harness;
use uuid::Uuid;

fn finalized_snapshot(harness: &Harness) -> DecisionSnapshot {
    let record_id = harness.ready_review(
        TargetRef::assignment(Uuid::new_v4()),
        &SideInput::rated(CategoricalRating::Meeting),
    );
    harness
        .coordinator()
        .finalize(
            &harness.manager,
            harness.subject(),
            &[FinalizationSelection::new(record_id, CategoricalRating::Meeting)],
        )
        .unwrap()
        .snapshot
        .unwrap()
}

#[test]
fn acknowledge_is_idempotent_and_keeps_first_timestamp() {
    let harness = Harness::new();
    let snapshot = finalized_snapshot(&harness);
    let service = harness.acknowledgments();

    let first = service.acknowledge(&harness.employee, snapshot.id).unwrap();
    let first_at = first.acknowledged_at.unwrap();

    harness.clock.advance(Duration::hours(2));
    let second = service.acknowledge(&harness.employee, snapshot.id).unwrap();
    assert_eq!(second.acknowledged_at, Some(first_at));
    assert_eq!(second.records, snapshot.records);

    let acknowledged: Vec<_> = harness
        .notifier
        .events()
        .into_iter()
        .filter(|(_, event)| matches!(event, NotificationEvent::Acknowledged { .. }))
        .collect();
    assert_eq!(
        acknowledged,
        vec![(
            harness.subject(),
            NotificationEvent::Acknowledged {
                snapshot_id: snapshot.id
            }
        )]
    );
}

#[test]
fn only_the_subject_may_acknowledge() {
    let harness = Harness::new();
    let snapshot = finalized_snapshot(&harness);
    let service = harness.acknowledgments();

    for actor in [&harness.manager, &harness.outsider] {
        let err = service.acknowledge(actor, snapshot.id).unwrap_err();
        assert!(matches!(err, CheckInError::Forbidden { .. }));
    }
    let stored = service.get_snapshot(&harness.manager, snapshot.id).unwrap();
    assert_eq!(stored.acknowledged_at, None);

    let missing = Uuid::new_v4();
    let err = service.acknowledge(&harness.employee, missing).unwrap_err();
    assert!(matches!(err, CheckInError::SnapshotNotFound(id) if id == missing));
}

#[test]
fn pending_and_history_track_acknowledgment() {
    let harness = Harness::new();
    let older = finalized_snapshot(&harness);
    harness.clock.advance(Duration::days(1));
    let newer = finalized_snapshot(&harness);
    let service = harness.acknowledgments();

    let pending = service.pending_acknowledgments(&harness.employee).unwrap();
    let pending_ids: Vec<_> = pending.iter().map(|snapshot| snapshot.id).collect();
    assert_eq!(pending_ids, vec![older.id, newer.id]);

    service.acknowledge(&harness.employee, older.id).unwrap();
    let pending = service.pending_acknowledgments(&harness.employee).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, newer.id);

    let history = service
        .snapshot_history(&harness.manager, harness.subject())
        .unwrap();
    let history_ids: Vec<_> = history.iter().map(|snapshot| snapshot.id).collect();
    assert_eq!(history_ids, vec![newer.id, older.id]);
    assert!(history[1].is_acknowledged());

    let err = service
        .snapshot_history(&harness.outsider, harness.subject())
        .unwrap_err();
    assert!(matches!(err, CheckInError::Forbidden { .. }));
}

#[test]
fn snapshot_content_is_immutable_in_storage() {
    let harness = Harness::new();
    let snapshot = finalized_snapshot(&harness);
    let id = snapshot.id.to_string();

    let update = harness.conn.execute(
        "UPDATE decision_snapshots SET records_json = '[]' WHERE id = ?1;",
        [&id],
    );
    assert!(update.is_err());
    let delete = harness
        .conn
        .execute("DELETE FROM decision_snapshots WHERE id = ?1;", [&id]);
    assert!(delete.is_err());

    let record_id = snapshot.records[0].id.to_string();
    let reopen = harness.conn.execute(
        "UPDATE review_records SET official_completed_at = NULL WHERE id = ?1;",
        [&record_id],
    );
    assert!(reopen.is_err());

    let stored = harness
        .acknowledgments()
        .get_snapshot(&harness.employee, snapshot.id)
        .unwrap();
    assert_eq!(stored, snapshot);
}
