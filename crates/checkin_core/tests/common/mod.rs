#![allow(dead_code)]

use checkin_core::{
    open_db_in_memory, AcknowledgmentService, Actor, CheckInService, FinalizationCoordinator,
    FixedClock, ManagerDirectory, NotificationDispatcher, OrganizationId, PersonId,
    RecordingDispatcher, ReviewId, ReviewRole, SideInput, SqliteReviewRepository,
    SqliteSnapshotRepository, SqliteTenureSuccession, TargetRef, TenureSuccession,
};
use chrono::NaiveDate;
use rusqlite::Connection;
use std::sync::Arc;
use uuid::Uuid;

/// One organization with an employee, their manager and an outsider.
pub struct Harness {
    pub conn: Connection,
    pub org: OrganizationId,
    pub employee: Actor,
    pub manager: Actor,
    pub outsider: Actor,
    pub directory: Arc<ManagerDirectory>,
    pub clock: Arc<FixedClock>,
    pub notifier: Arc<RecordingDispatcher>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_notifier(RecordingDispatcher::new())
    }

    pub fn with_notifier(notifier: RecordingDispatcher) -> Self {
        let conn = open_db_in_memory().unwrap();
        let employee = Actor::new(Uuid::new_v4());
        let manager = Actor::new(Uuid::new_v4());
        let directory = Arc::new(ManagerDirectory::new());
        directory.assign(manager.person_id, employee.person_id);

        Self {
            conn,
            org: Uuid::new_v4(),
            employee,
            manager,
            outsider: Actor::new(Uuid::new_v4()),
            directory,
            clock: Arc::new(FixedClock::on(today())),
            notifier: Arc::new(notifier),
        }
    }

    pub fn subject(&self) -> PersonId {
        self.employee.person_id
    }

    pub fn checkin(&self) -> CheckInService<SqliteReviewRepository<'_>> {
        CheckInService::new(
            SqliteReviewRepository::new(&self.conn),
            self.directory.clone(),
            self.clock.clone(),
        )
    }

    pub fn coordinator(&self) -> FinalizationCoordinator<'_> {
        self.coordinator_with(Arc::new(SqliteTenureSuccession))
    }

    pub fn coordinator_with(
        &self,
        succession: Arc<dyn TenureSuccession>,
    ) -> FinalizationCoordinator<'_> {
        let notifier: Arc<dyn NotificationDispatcher> = self.notifier.clone();
        FinalizationCoordinator::new(
            &self.conn,
            self.directory.clone(),
            succession,
            notifier,
            self.clock.clone(),
        )
    }

    pub fn acknowledgments(&self) -> AcknowledgmentService<SqliteSnapshotRepository<'_>> {
        AcknowledgmentService::new(
            SqliteSnapshotRepository::new(&self.conn),
            self.directory.clone(),
            self.notifier.clone(),
            self.clock.clone(),
        )
    }

    /// Opens a review for `target` and completes both sides with `input`.
    pub fn ready_review(&self, target: TargetRef, input: &SideInput) -> ReviewId {
        let service = self.checkin();
        let view = service
            .open_review(&self.employee, self.org, self.subject(), target)
            .unwrap();
        service
            .complete(&self.employee, ReviewRole::Employee, view.record_id, input)
            .unwrap();
        service
            .complete(&self.manager, ReviewRole::Manager, view.record_id, input)
            .unwrap();
        view.record_id
    }

    pub fn count(&self, table: &str) -> i64 {
        self.conn
            .query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| row.get(0))
            .unwrap()
    }
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 16).unwrap()
}
