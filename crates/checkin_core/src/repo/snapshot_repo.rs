//! Decision snapshot repository.
//!
//! # Responsibility
//! - Append decision snapshots and their review membership rows.
//! - Serve snapshot history per subject.
//! - Record the one-time employee acknowledgment.
//!
//! # Invariants
//! - Snapshots are append-only; storage triggers reject content updates and
//!   deletes.
//! - A review id appears in at most one snapshot.
//! - `mark_acknowledged` only ever writes a null `employee_acknowledged_at`.

use crate::model::actor::{PersonId, SnapshotId};
use crate::model::review::ReviewRecord;
use crate::model::snapshot::DecisionSnapshot;
use crate::repo::review_repo::{parse_uuid_column, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const SNAPSHOT_SELECT_SQL: &str = "SELECT
    id,
    organization_id,
    subject_id,
    records_json,
    finalized_by,
    created_at,
    employee_acknowledged_at
FROM decision_snapshots";

/// Repository interface for decision snapshots.
pub trait SnapshotRepository {
    fn insert_snapshot(&self, snapshot: &DecisionSnapshot) -> RepoResult<()>;
    fn get_snapshot(&self, id: SnapshotId) -> RepoResult<Option<DecisionSnapshot>>;
    /// Snapshots of one subject, newest first.
    fn list_for_subject(&self, subject_id: PersonId) -> RepoResult<Vec<DecisionSnapshot>>;
    /// Unacknowledged snapshots of one subject, oldest first.
    fn list_unacknowledged(&self, subject_id: PersonId) -> RepoResult<Vec<DecisionSnapshot>>;
    /// Sets the acknowledgment timestamp if still unset.
    ///
    /// Returns `true` when this call wrote it.
    fn mark_acknowledged(&self, id: SnapshotId, acknowledged_at: i64) -> RepoResult<bool>;
}

/// SQLite-backed snapshot repository.
pub struct SqliteSnapshotRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSnapshotRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_many(&self, sql: &str, subject_id: PersonId) -> RepoResult<Vec<DecisionSnapshot>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([subject_id.to_string()])?;
        let mut snapshots = Vec::new();
        while let Some(row) = rows.next()? {
            snapshots.push(parse_snapshot_row(row)?);
        }
        Ok(snapshots)
    }
}

impl SnapshotRepository for SqliteSnapshotRepository<'_> {
    fn insert_snapshot(&self, snapshot: &DecisionSnapshot) -> RepoResult<()> {
        if snapshot.records.is_empty() {
            return Err(RepoError::InvalidData(format!(
                "decision snapshot {} has no records",
                snapshot.id
            )));
        }
        if let Some(foreign) = snapshot
            .records
            .iter()
            .find(|record| record.subject_id != snapshot.subject_id || record.is_open())
        {
            return Err(RepoError::InvalidData(format!(
                "review {} is open or belongs to another subject than snapshot {}",
                foreign.id, snapshot.id
            )));
        }

        let records_json = serde_json::to_string(&snapshot.records).map_err(|err| {
            RepoError::InvalidData(format!("cannot encode snapshot records: {err}"))
        })?;

        self.conn.execute(
            "INSERT INTO decision_snapshots (
                id,
                organization_id,
                subject_id,
                records_json,
                finalized_by,
                created_at,
                employee_acknowledged_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                snapshot.id.to_string(),
                snapshot.organization_id.to_string(),
                snapshot.subject_id.to_string(),
                records_json,
                snapshot.finalized_by.to_string(),
                snapshot.created_at,
                snapshot.acknowledged_at,
            ],
        )?;

        for record in &snapshot.records {
            self.conn.execute(
                "INSERT INTO decision_snapshot_records (snapshot_id, review_id)
                 VALUES (?1, ?2);",
                params![snapshot.id.to_string(), record.id.to_string()],
            )?;
        }
        Ok(())
    }

    fn get_snapshot(&self, id: SnapshotId) -> RepoResult<Option<DecisionSnapshot>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SNAPSHOT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_snapshot_row(row)?));
        }
        Ok(None)
    }

    fn list_for_subject(&self, subject_id: PersonId) -> RepoResult<Vec<DecisionSnapshot>> {
        self.query_many(
            &format!(
                "{SNAPSHOT_SELECT_SQL}
                 WHERE subject_id = ?1
                 ORDER BY created_at DESC, id ASC;"
            ),
            subject_id,
        )
    }

    fn list_unacknowledged(&self, subject_id: PersonId) -> RepoResult<Vec<DecisionSnapshot>> {
        self.query_many(
            &format!(
                "{SNAPSHOT_SELECT_SQL}
                 WHERE subject_id = ?1
                   AND employee_acknowledged_at IS NULL
                 ORDER BY created_at ASC, id ASC;"
            ),
            subject_id,
        )
    }

    fn mark_acknowledged(&self, id: SnapshotId, acknowledged_at: i64) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE decision_snapshots
             SET employee_acknowledged_at = ?2
             WHERE id = ?1
               AND employee_acknowledged_at IS NULL;",
            params![id.to_string(), acknowledged_at],
        )?;
        if changed == 1 {
            return Ok(true);
        }

        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM decision_snapshots WHERE id = ?1;",
                [id.to_string()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        match exists {
            Some(_) => Ok(false),
            None => Err(RepoError::SnapshotNotFound(id)),
        }
    }
}

fn parse_snapshot_row(row: &Row<'_>) -> RepoResult<DecisionSnapshot> {
    let id = parse_uuid_column(row, "id")?;
    let records_json: String = row.get("records_json")?;
    let records: Vec<ReviewRecord> = serde_json::from_str(&records_json).map_err(|err| {
        RepoError::InvalidData(format!(
            "invalid records_json in decision snapshot {id}: {err}"
        ))
    })?;
    for record in &records {
        record.validate()?;
    }

    Ok(DecisionSnapshot {
        id,
        organization_id: parse_uuid_column(row, "organization_id")?,
        subject_id: parse_uuid_column(row, "subject_id")?,
        records,
        finalized_by: parse_uuid_column(row, "finalized_by")?,
        created_at: row.get("created_at")?,
        acknowledged_at: row.get("employee_acknowledged_at")?,
    })
}
