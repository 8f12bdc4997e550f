//! Review targets: the position, assignment or aspiration being assessed.

use crate::model::actor::TargetId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Target kind tag. Selects the rating vocabulary for a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Position,
    Assignment,
    Aspiration,
}

impl TargetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Assignment => "assignment",
            Self::Aspiration => "aspiration",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "position" => Some(Self::Position),
            "assignment" => Some(Self::Assignment),
            "aspiration" => Some(Self::Aspiration),
            _ => None,
        }
    }

    /// Energy allocation and personal alignment exist only on assignments.
    pub fn has_assignment_fields(self) -> bool {
        self == Self::Assignment
    }
}

/// Reference to one externally owned target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TargetRef {
    pub kind: TargetKind,
    pub id: TargetId,
}

impl TargetRef {
    pub fn new(kind: TargetKind, id: TargetId) -> Self {
        Self { kind, id }
    }

    pub fn position(id: TargetId) -> Self {
        Self::new(TargetKind::Position, id)
    }

    pub fn assignment(id: TargetId) -> Self {
        Self::new(TargetKind::Assignment, id)
    }

    pub fn aspiration(id: TargetId) -> Self {
        Self::new(TargetKind::Aspiration, id)
    }
}

impl Display for TargetRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}
