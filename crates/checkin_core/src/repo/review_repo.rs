//! Review record repository and open-review registry.
//!
//! # Responsibility
//! - Persist review records and serve typed reads over `review_records`.
//! - Uphold "at most one open review per (subject, target)" on every insert.
//! - Write each actor's side through its own column subset.
//!
//! # Invariants
//! - Create-if-absent runs in an immediate transaction; the partial unique
//!   index `ux_review_records_open` backs it at the storage level.
//! - Side writes never touch the other side's or the official columns.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::actor::{OrganizationId, PersonId, ReviewId};
use crate::model::rating::{EnergyAllocation, PersonalAlignment, Rating};
use crate::model::review::{
    OfficialSide, ReviewRecord, ReviewRole, ReviewSide, ReviewValidationError,
};
use crate::model::target::{TargetKind, TargetRef};
use chrono::NaiveDate;
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const REVIEW_SELECT_SQL: &str = "SELECT
    id,
    organization_id,
    subject_id,
    target_kind,
    target_id,
    opened_on,
    employee_rating,
    employee_private_notes,
    employee_energy_allocation,
    employee_personal_alignment,
    employee_completed_at,
    manager_rating,
    manager_private_notes,
    manager_energy_allocation,
    manager_personal_alignment,
    manager_completed_at,
    manager_completed_by,
    official_rating,
    official_shared_notes,
    official_energy_allocation,
    official_completed_at,
    finalized_by,
    created_at,
    updated_at
FROM review_records";

const DATE_FORMAT: &str = "%Y-%m-%d";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by review, snapshot and tenure persistence.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    Validation(ReviewValidationError),
    /// A second open review for the same (subject, target) was attempted.
    DuplicateOpenReview {
        subject_id: PersonId,
        target: TargetRef,
    },
    ReviewNotFound(ReviewId),
    /// The review was finalized before the write landed.
    ReviewClosed(ReviewId),
    SnapshotNotFound(Uuid),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::DuplicateOpenReview { subject_id, target } => write!(
                f,
                "an open review already exists for subject {subject_id} and target {target}"
            ),
            Self::ReviewNotFound(id) => write!(f, "review not found: {id}"),
            Self::ReviewClosed(id) => write!(f, "review is finalized: {id}"),
            Self::SnapshotNotFound(id) => write!(f, "decision snapshot not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ReviewValidationError> for RepoError {
    fn from(value: ReviewValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Repository interface for review records.
pub trait ReviewRepository {
    /// Returns the open review for (subject, target), creating it if absent.
    fn open_or_create(
        &self,
        organization_id: OrganizationId,
        subject_id: PersonId,
        target: TargetRef,
        opened_on: NaiveDate,
        now_ms: i64,
    ) -> RepoResult<ReviewRecord>;
    /// Fails with `DuplicateOpenReview` when (subject, target) has an open review.
    fn assert_single_open(&self, subject_id: PersonId, target: TargetRef) -> RepoResult<()>;
    /// Inserts a new open record after `assert_single_open`.
    fn create_open(&self, record: &ReviewRecord) -> RepoResult<()>;
    fn get_review(&self, id: ReviewId) -> RepoResult<Option<ReviewRecord>>;
    fn find_open(&self, subject_id: PersonId, target: TargetRef)
        -> RepoResult<Option<ReviewRecord>>;
    /// Open reviews of one subject, ordered by target kind then opened date.
    fn list_open_for_subject(&self, subject_id: PersonId) -> RepoResult<Vec<ReviewRecord>>;
    /// Most recently finalized review for (subject, target).
    fn latest_finalized(
        &self,
        subject_id: PersonId,
        target: TargetRef,
    ) -> RepoResult<Option<ReviewRecord>>;
    /// Persists one side of an open record.
    fn save_side(&self, record: &ReviewRecord, role: ReviewRole) -> RepoResult<()>;
    /// Persists the official side, closing the record.
    fn write_official(&self, record: &ReviewRecord) -> RepoResult<()>;
}

/// SQLite-backed review repository.
///
/// Borrowing a `Transaction` (through deref) makes every call part of it.
pub struct SqliteReviewRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteReviewRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ReviewRepository for SqliteReviewRepository<'_> {
    fn open_or_create(
        &self,
        organization_id: OrganizationId,
        subject_id: PersonId,
        target: TargetRef,
        opened_on: NaiveDate,
        now_ms: i64,
    ) -> RepoResult<ReviewRecord> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if let Some(existing) = query_open(&tx, subject_id, target)? {
            debug!(
                "event=review_open module=repo status=existing review_id={} target_kind={}",
                existing.id,
                target.kind.as_str()
            );
            return Ok(existing);
        }

        let record = ReviewRecord::open(organization_id, subject_id, target, opened_on, now_ms);
        insert_record(&tx, &record)?;
        tx.commit()?;

        info!(
            "event=review_open module=repo status=created review_id={} target_kind={}",
            record.id,
            target.kind.as_str()
        );
        Ok(record)
    }

    fn assert_single_open(&self, subject_id: PersonId, target: TargetRef) -> RepoResult<()> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM review_records
                WHERE subject_id = ?1
                  AND target_kind = ?2
                  AND target_id = ?3
                  AND official_completed_at IS NULL
            );",
            params![
                subject_id.to_string(),
                target.kind.as_str(),
                target.id.to_string()
            ],
            |row| row.get(0),
        )?;
        if exists == 1 {
            return Err(RepoError::DuplicateOpenReview { subject_id, target });
        }
        Ok(())
    }

    fn create_open(&self, record: &ReviewRecord) -> RepoResult<()> {
        if !record.is_open() {
            return Err(RepoError::InvalidData(format!(
                "review {} is finalized and cannot be inserted as open",
                record.id
            )));
        }
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        SqliteReviewRepository::new(&tx).assert_single_open(record.subject_id, record.target)?;
        insert_record(&tx, record)?;
        tx.commit()?;
        Ok(())
    }

    fn get_review(&self, id: ReviewId) -> RepoResult<Option<ReviewRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{REVIEW_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_review_row(row)?));
        }
        Ok(None)
    }

    fn find_open(
        &self,
        subject_id: PersonId,
        target: TargetRef,
    ) -> RepoResult<Option<ReviewRecord>> {
        query_open(self.conn, subject_id, target)
    }

    fn list_open_for_subject(&self, subject_id: PersonId) -> RepoResult<Vec<ReviewRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{REVIEW_SELECT_SQL}
             WHERE subject_id = ?1
               AND official_completed_at IS NULL
             ORDER BY target_kind ASC, opened_on ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([subject_id.to_string()])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_review_row(row)?);
        }
        Ok(records)
    }

    fn latest_finalized(
        &self,
        subject_id: PersonId,
        target: TargetRef,
    ) -> RepoResult<Option<ReviewRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{REVIEW_SELECT_SQL}
             WHERE subject_id = ?1
               AND target_kind = ?2
               AND target_id = ?3
               AND official_completed_at IS NOT NULL
             ORDER BY official_completed_at DESC, id ASC
             LIMIT 1;"
        ))?;
        let mut rows = stmt.query(params![
            subject_id.to_string(),
            target.kind.as_str(),
            target.id.to_string()
        ])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_review_row(row)?));
        }
        Ok(None)
    }

    fn save_side(&self, record: &ReviewRecord, role: ReviewRole) -> RepoResult<()> {
        record.validate()?;
        let side = record.side(role);
        let sql = match role {
            ReviewRole::Employee => {
                "UPDATE review_records
                 SET
                    employee_rating = ?2,
                    employee_private_notes = ?3,
                    employee_energy_allocation = ?4,
                    employee_personal_alignment = ?5,
                    employee_completed_at = ?6,
                    updated_at = ?8
                 WHERE id = ?1
                   AND official_completed_at IS NULL;"
            }
            ReviewRole::Manager => {
                "UPDATE review_records
                 SET
                    manager_rating = ?2,
                    manager_private_notes = ?3,
                    manager_energy_allocation = ?4,
                    manager_personal_alignment = ?5,
                    manager_completed_at = ?6,
                    manager_completed_by = ?7,
                    updated_at = ?8
                 WHERE id = ?1
                   AND official_completed_at IS NULL;"
            }
        };

        let changed = self.conn.execute(
            sql,
            params![
                record.id.to_string(),
                side.rating.map(Rating::to_db),
                side.private_notes.as_deref(),
                side.energy_allocation.map(|value| i64::from(value.percent())),
                side.personal_alignment.map(PersonalAlignment::as_str),
                side.completed_at,
                side.completed_by.map(|value| value.to_string()),
                record.updated_at,
            ],
        )?;

        if changed == 0 {
            return Err(missing_or_closed(self.conn, record.id)?);
        }
        Ok(())
    }

    fn write_official(&self, record: &ReviewRecord) -> RepoResult<()> {
        record.validate()?;
        let official = &record.official;
        if official.completed_at.is_none() {
            return Err(RepoError::InvalidData(format!(
                "review {} has no official completion to write",
                record.id
            )));
        }

        let changed = self.conn.execute(
            "UPDATE review_records
             SET
                official_rating = ?2,
                official_shared_notes = ?3,
                official_energy_allocation = ?4,
                official_completed_at = ?5,
                finalized_by = ?6,
                updated_at = ?7
             WHERE id = ?1
               AND official_completed_at IS NULL
               AND employee_completed_at IS NOT NULL
               AND manager_completed_at IS NOT NULL;",
            params![
                record.id.to_string(),
                official.rating.map(Rating::to_db),
                official.shared_notes.as_deref(),
                official
                    .energy_allocation
                    .map(|value| i64::from(value.percent())),
                official.completed_at,
                official.finalized_by.map(|value| value.to_string()),
                record.updated_at,
            ],
        )?;

        if changed == 0 {
            return Err(missing_or_closed(self.conn, record.id)?);
        }
        Ok(())
    }
}

fn query_open(
    conn: &Connection,
    subject_id: PersonId,
    target: TargetRef,
) -> RepoResult<Option<ReviewRecord>> {
    let mut stmt = conn.prepare(&format!(
        "{REVIEW_SELECT_SQL}
         WHERE subject_id = ?1
           AND target_kind = ?2
           AND target_id = ?3
           AND official_completed_at IS NULL;"
    ))?;
    let mut rows = stmt.query(params![
        subject_id.to_string(),
        target.kind.as_str(),
        target.id.to_string()
    ])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_review_row(row)?));
    }
    Ok(None)
}

fn insert_record(conn: &Connection, record: &ReviewRecord) -> RepoResult<()> {
    record.validate()?;
    let employee = &record.employee;
    let manager = &record.manager;

    let result = conn.execute(
        "INSERT INTO review_records (
            id,
            organization_id,
            subject_id,
            target_kind,
            target_id,
            opened_on,
            employee_rating,
            employee_private_notes,
            employee_energy_allocation,
            employee_personal_alignment,
            employee_completed_at,
            manager_rating,
            manager_private_notes,
            manager_energy_allocation,
            manager_personal_alignment,
            manager_completed_at,
            manager_completed_by,
            created_at,
            updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19);",
        params![
            record.id.to_string(),
            record.organization_id.to_string(),
            record.subject_id.to_string(),
            record.target.kind.as_str(),
            record.target.id.to_string(),
            format_date(record.opened_on),
            employee.rating.map(Rating::to_db),
            employee.private_notes.as_deref(),
            employee.energy_allocation.map(|value| i64::from(value.percent())),
            employee.personal_alignment.map(PersonalAlignment::as_str),
            employee.completed_at,
            manager.rating.map(Rating::to_db),
            manager.private_notes.as_deref(),
            manager.energy_allocation.map(|value| i64::from(value.percent())),
            manager.personal_alignment.map(PersonalAlignment::as_str),
            manager.completed_at,
            manager.completed_by.map(|value| value.to_string()),
            record.created_at,
            record.updated_at,
        ],
    );

    match result {
        Ok(_) => Ok(()),
        Err(err) => {
            let err = DbError::from(err);
            if err.is_constraint_violation()
                && query_open(conn, record.subject_id, record.target)?.is_some()
            {
                return Err(RepoError::DuplicateOpenReview {
                    subject_id: record.subject_id,
                    target: record.target,
                });
            }
            Err(err.into())
        }
    }
}

fn missing_or_closed(conn: &Connection, id: ReviewId) -> RepoResult<RepoError> {
    let closed: Option<bool> = conn
        .query_row(
            "SELECT official_completed_at IS NOT NULL FROM review_records WHERE id = ?1;",
            [id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(match closed {
        Some(true) => RepoError::ReviewClosed(id),
        Some(false) => RepoError::InvalidData(format!(
            "review {id} is not writable in its current state"
        )),
        None => RepoError::ReviewNotFound(id),
    })
}

fn parse_review_row(row: &Row<'_>) -> RepoResult<ReviewRecord> {
    let kind_text: String = row.get("target_kind")?;
    let kind = TargetKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid target kind `{kind_text}` in review_records.target_kind"
        ))
    })?;

    let record = ReviewRecord {
        id: parse_uuid_column(row, "id")?,
        organization_id: parse_uuid_column(row, "organization_id")?,
        subject_id: parse_uuid_column(row, "subject_id")?,
        target: TargetRef::new(kind, parse_uuid_column(row, "target_id")?),
        opened_on: parse_date_column(row, "opened_on")?,
        employee: ReviewSide {
            rating: parse_rating_column(row, kind, "employee_rating")?,
            private_notes: row.get("employee_private_notes")?,
            energy_allocation: parse_energy_column(row, "employee_energy_allocation")?,
            personal_alignment: parse_alignment_column(row, "employee_personal_alignment")?,
            completed_at: row.get("employee_completed_at")?,
            completed_by: None,
        },
        manager: ReviewSide {
            rating: parse_rating_column(row, kind, "manager_rating")?,
            private_notes: row.get("manager_private_notes")?,
            energy_allocation: parse_energy_column(row, "manager_energy_allocation")?,
            personal_alignment: parse_alignment_column(row, "manager_personal_alignment")?,
            completed_at: row.get("manager_completed_at")?,
            completed_by: parse_optional_uuid_column(row, "manager_completed_by")?,
        },
        official: OfficialSide {
            rating: parse_rating_column(row, kind, "official_rating")?,
            shared_notes: row.get("official_shared_notes")?,
            energy_allocation: parse_energy_column(row, "official_energy_allocation")?,
            completed_at: row.get("official_completed_at")?,
            finalized_by: parse_optional_uuid_column(row, "finalized_by")?,
        },
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    record.validate()?;
    Ok(record)
}

pub(crate) fn parse_uuid_column(row: &Row<'_>, column: &str) -> RepoResult<Uuid> {
    let text: String = row.get(column)?;
    Uuid::parse_str(&text)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{text}` in {column}")))
}

pub(crate) fn parse_optional_uuid_column(row: &Row<'_>, column: &str) -> RepoResult<Option<Uuid>> {
    match row.get::<_, Option<String>>(column)? {
        Some(text) => Uuid::parse_str(&text).map(Some).map_err(|_| {
            RepoError::InvalidData(format!("invalid uuid value `{text}` in {column}"))
        }),
        None => Ok(None),
    }
}

pub(crate) fn parse_date_column(row: &Row<'_>, column: &str) -> RepoResult<NaiveDate> {
    let text: String = row.get(column)?;
    parse_date(&text, column)
}

pub(crate) fn parse_optional_date_column(
    row: &Row<'_>,
    column: &str,
) -> RepoResult<Option<NaiveDate>> {
    match row.get::<_, Option<String>>(column)? {
        Some(text) => parse_date(&text, column).map(Some),
        None => Ok(None),
    }
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(text: &str, column: &str) -> RepoResult<NaiveDate> {
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map_err(|_| RepoError::InvalidData(format!("invalid date value `{text}` in {column}")))
}

fn parse_rating_column(
    row: &Row<'_>,
    kind: TargetKind,
    column: &str,
) -> RepoResult<Option<Rating>> {
    match row.get::<_, Option<String>>(column)? {
        Some(text) => Rating::parse_for(kind, &text).map(Some).map_err(|err| {
            RepoError::InvalidData(format!(
                "{err} in {column} for {} review",
                kind.as_str()
            ))
        }),
        None => Ok(None),
    }
}

fn parse_energy_column(row: &Row<'_>, column: &str) -> RepoResult<Option<EnergyAllocation>> {
    match row.get::<_, Option<i64>>(column)? {
        Some(value) => EnergyAllocation::new(value)
            .map(Some)
            .map_err(|err| RepoError::InvalidData(format!("{err} in {column}"))),
        None => Ok(None),
    }
}

fn parse_alignment_column(row: &Row<'_>, column: &str) -> RepoResult<Option<PersonalAlignment>> {
    match row.get::<_, Option<String>>(column)? {
        Some(text) => PersonalAlignment::parse(&text)
            .map(Some)
            .map_err(|err| RepoError::InvalidData(format!("{err} in {column}"))),
        None => Ok(None),
    }
}
