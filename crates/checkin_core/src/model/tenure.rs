//! Employment tenure read model.
//!
//! A tenure is one continuous stint of a subject in a position. Position
//! finalization closes the active tenure with the official rating and opens
//! its successor.

use crate::model::actor::{OrganizationId, PersonId, TargetId, TenureId};
use crate::model::rating::PositionRating;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmploymentTenure {
    pub id: TenureId,
    pub organization_id: OrganizationId,
    pub subject_id: PersonId,
    pub position_id: TargetId,
    pub started_on: NaiveDate,
    /// `None` while the tenure is active.
    pub ended_on: Option<NaiveDate>,
    /// Official position rating carried onto the closed tenure.
    pub official_rating: Option<PositionRating>,
}

impl EmploymentTenure {
    pub fn is_active(&self) -> bool {
        self.ended_on.is_none()
    }
}
