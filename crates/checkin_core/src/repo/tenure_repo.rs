//! Employment tenure repository and SQLite tenure succession.
//!
//! # Invariants
//! - At most one active (`ended_on IS NULL`) tenure per subject within an
//!   organization, backed by `ux_employment_tenures_active`.
//! - Succession closes the active tenure before inserting its successor, on
//!   the caller's connection, so both writes share the caller's transaction.

use crate::collab::succession::{SuccessionError, SuccessionOutcome, TenureSuccession};
use crate::model::actor::{OrganizationId, PersonId, TargetId, TenureId};
use crate::model::rating::PositionRating;
use crate::model::tenure::EmploymentTenure;
use crate::repo::review_repo::{
    format_date, parse_date_column, parse_optional_date_column, parse_uuid_column, RepoError,
    RepoResult,
};
use chrono::NaiveDate;
use log::info;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const TENURE_SELECT_SQL: &str = "SELECT
    id,
    organization_id,
    subject_id,
    position_id,
    started_on,
    ended_on,
    official_rating
FROM employment_tenures";

/// SQLite-backed tenure repository.
pub struct SqliteTenureRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTenureRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Starts a new active tenure with no rating.
    pub fn start_tenure(
        &self,
        organization_id: OrganizationId,
        subject_id: PersonId,
        position_id: TargetId,
        started_on: NaiveDate,
    ) -> RepoResult<EmploymentTenure> {
        let tenure = EmploymentTenure {
            id: Uuid::new_v4(),
            organization_id,
            subject_id,
            position_id,
            started_on,
            ended_on: None,
            official_rating: None,
        };
        self.conn.execute(
            "INSERT INTO employment_tenures (
                id,
                organization_id,
                subject_id,
                position_id,
                started_on,
                ended_on,
                official_rating
            ) VALUES (?1, ?2, ?3, ?4, ?5, NULL, NULL);",
            params![
                tenure.id.to_string(),
                organization_id.to_string(),
                subject_id.to_string(),
                position_id.to_string(),
                format_date(started_on),
            ],
        )?;
        Ok(tenure)
    }

    pub fn active_tenure(
        &self,
        organization_id: OrganizationId,
        subject_id: PersonId,
    ) -> RepoResult<Option<EmploymentTenure>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TENURE_SELECT_SQL}
             WHERE organization_id = ?1
               AND subject_id = ?2
               AND ended_on IS NULL;"
        ))?;
        let mut rows = stmt.query(params![organization_id.to_string(), subject_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_tenure_row(row)?));
        }
        Ok(None)
    }

    pub fn get_tenure(&self, id: TenureId) -> RepoResult<Option<EmploymentTenure>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TENURE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_tenure_row(row)?));
        }
        Ok(None)
    }

    /// All tenures of one subject, oldest first. Active tenure sorts last.
    pub fn list_tenures(
        &self,
        organization_id: OrganizationId,
        subject_id: PersonId,
    ) -> RepoResult<Vec<EmploymentTenure>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TENURE_SELECT_SQL}
             WHERE organization_id = ?1
               AND subject_id = ?2
             ORDER BY started_on ASC, ended_on IS NULL ASC, created_at ASC, id ASC;"
        ))?;
        let mut rows = stmt.query(params![organization_id.to_string(), subject_id.to_string()])?;
        let mut tenures = Vec::new();
        while let Some(row) = rows.next()? {
            tenures.push(parse_tenure_row(row)?);
        }
        Ok(tenures)
    }

    fn close_tenure(
        &self,
        id: TenureId,
        ended_on: NaiveDate,
        official_rating: PositionRating,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE employment_tenures
             SET ended_on = ?2,
                 official_rating = ?3
             WHERE id = ?1
               AND ended_on IS NULL;",
            params![
                id.to_string(),
                format_date(ended_on),
                i64::from(official_rating.value())
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::InvalidData(format!(
                "tenure {id} is not active and cannot be closed"
            )));
        }
        Ok(())
    }
}

/// Tenure succession over the `employment_tenures` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteTenureSuccession;

impl TenureSuccession for SqliteTenureSuccession {
    fn end_and_succeed(
        &self,
        conn: &Connection,
        organization_id: OrganizationId,
        subject_id: PersonId,
        as_of: NaiveDate,
        official_rating: PositionRating,
    ) -> Result<SuccessionOutcome, SuccessionError> {
        let repo = SqliteTenureRepository::new(conn);
        let active = repo.active_tenure(organization_id, subject_id)?.ok_or(
            SuccessionError::NoActiveTenure {
                organization_id,
                subject_id,
            },
        )?;
        if as_of < active.started_on {
            return Err(SuccessionError::Rejected(format!(
                "tenure {} starts on {} after succession date {as_of}",
                active.id, active.started_on
            )));
        }

        repo.close_tenure(active.id, as_of, official_rating)?;
        let successor =
            repo.start_tenure(organization_id, subject_id, active.position_id, as_of)?;
        let closed = EmploymentTenure {
            ended_on: Some(as_of),
            official_rating: Some(official_rating),
            ..active
        };

        info!(
            "event=tenure_succession module=repo status=ok closed_tenure_id={} successor_tenure_id={}",
            closed.id, successor.id
        );
        Ok(SuccessionOutcome { closed, successor })
    }
}

fn parse_tenure_row(row: &Row<'_>) -> RepoResult<EmploymentTenure> {
    let official_rating = match row.get::<_, Option<i64>>("official_rating")? {
        Some(value) => Some(PositionRating::new(value).map_err(|err| {
            RepoError::InvalidData(format!("{err} in employment_tenures.official_rating"))
        })?),
        None => None,
    };

    Ok(EmploymentTenure {
        id: parse_uuid_column(row, "id")?,
        organization_id: parse_uuid_column(row, "organization_id")?,
        subject_id: parse_uuid_column(row, "subject_id")?,
        position_id: parse_uuid_column(row, "position_id")?,
        started_on: parse_date_column(row, "started_on")?,
        ended_on: parse_optional_date_column(row, "ended_on")?,
        official_rating,
    })
}
