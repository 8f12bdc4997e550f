//! Rating vocabularies for every target kind.
//!
//! # Responsibility
//! - Model each rating scale as a closed type instead of a shared scalar.
//! - Own the storage encoding of ratings and assignment-only fields.
//!
//! # Invariants
//! - Position ratings are integers in `1..=4`.
//! - Assignment/aspiration ratings are `working_to_meet < meeting < exceeding`.
//! - Energy allocation is an integer percentage in `0..=100`.
//! - A stored rating is only decoded against the scale of its target kind.

use crate::model::target::TargetKind;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

const POSITION_RATING_MIN: u8 = 1;
const POSITION_RATING_MAX: u8 = 4;
const ENERGY_ALLOCATION_MAX: u8 = 100;

/// Errors for rating and assignment field parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RatingError {
    PositionOutOfRange(i64),
    UnknownCategory(String),
    UnknownAlignment(String),
    EnergyOutOfRange(i64),
}

impl Display for RatingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PositionOutOfRange(value) => write!(
                f,
                "position rating must be in {POSITION_RATING_MIN}..={POSITION_RATING_MAX}, got {value}"
            ),
            Self::UnknownCategory(value) => write!(f, "unknown rating category `{value}`"),
            Self::UnknownAlignment(value) => write!(f, "unknown personal alignment `{value}`"),
            Self::EnergyOutOfRange(value) => write!(
                f,
                "energy allocation must be in 0..={ENERGY_ALLOCATION_MAX}, got {value}"
            ),
        }
    }
}

impl Error for RatingError {}

/// Four-point position rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PositionRating(u8);

impl PositionRating {
    pub fn new(value: i64) -> Result<Self, RatingError> {
        let in_range = (i64::from(POSITION_RATING_MIN)..=i64::from(POSITION_RATING_MAX))
            .contains(&value);
        if !in_range {
            return Err(RatingError::PositionOutOfRange(value));
        }
        // Range-checked above.
        Ok(Self(value as u8))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for PositionRating {
    type Error = RatingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(i64::from(value))
    }
}

impl From<PositionRating> for u8 {
    fn from(value: PositionRating) -> Self {
        value.0
    }
}

/// Ordered categorical rating used by assignments and aspirations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalRating {
    WorkingToMeet,
    Meeting,
    Exceeding,
}

impl CategoricalRating {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WorkingToMeet => "working_to_meet",
            Self::Meeting => "meeting",
            Self::Exceeding => "exceeding",
        }
    }

    pub fn parse(value: &str) -> Result<Self, RatingError> {
        match value.trim() {
            "working_to_meet" => Ok(Self::WorkingToMeet),
            "meeting" => Ok(Self::Meeting),
            "exceeding" => Ok(Self::Exceeding),
            other => Err(RatingError::UnknownCategory(other.to_string())),
        }
    }
}

/// A rating on exactly one scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scale", content = "value", rename_all = "snake_case")]
pub enum Rating {
    Position(PositionRating),
    Categorical(CategoricalRating),
}

impl Rating {
    /// Returns whether this rating belongs to the vocabulary of `kind`.
    pub fn fits(self, kind: TargetKind) -> bool {
        matches!(
            (self, kind),
            (Self::Position(_), TargetKind::Position)
                | (Self::Categorical(_), TargetKind::Assignment)
                | (Self::Categorical(_), TargetKind::Aspiration)
        )
    }

    /// Returns the position rating, when this is one.
    pub fn as_position(self) -> Option<PositionRating> {
        match self {
            Self::Position(value) => Some(value),
            Self::Categorical(_) => None,
        }
    }

    /// Parses raw form/storage input against the scale of `kind`.
    ///
    /// Position input accepts the decimal digits `1..=4` only, so a
    /// categorical value can never be mistaken for a position rating.
    pub fn parse_for(kind: TargetKind, value: &str) -> Result<Self, RatingError> {
        match kind {
            TargetKind::Position => {
                let trimmed = value.trim();
                let parsed = trimmed
                    .parse::<i64>()
                    .map_err(|_| RatingError::UnknownCategory(trimmed.to_string()))?;
                Ok(Self::Position(PositionRating::new(parsed)?))
            }
            TargetKind::Assignment | TargetKind::Aspiration => {
                Ok(Self::Categorical(CategoricalRating::parse(value)?))
            }
        }
    }

    /// Storage text for the `*_rating` columns.
    pub fn to_db(self) -> String {
        match self {
            Self::Position(value) => value.value().to_string(),
            Self::Categorical(value) => value.as_str().to_string(),
        }
    }
}

impl Display for Rating {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Position(value) => write!(f, "{}", value.value()),
            Self::Categorical(value) => write!(f, "{}", value.as_str()),
        }
    }
}

impl From<PositionRating> for Rating {
    fn from(value: PositionRating) -> Self {
        Self::Position(value)
    }
}

impl From<CategoricalRating> for Rating {
    fn from(value: CategoricalRating) -> Self {
        Self::Categorical(value)
    }
}

/// Share of working energy an assignment takes, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct EnergyAllocation(u8);

impl EnergyAllocation {
    pub fn new(value: i64) -> Result<Self, RatingError> {
        if !(0..=i64::from(ENERGY_ALLOCATION_MAX)).contains(&value) {
            return Err(RatingError::EnergyOutOfRange(value));
        }
        Ok(Self(value as u8))
    }

    pub fn percent(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for EnergyAllocation {
    type Error = RatingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(i64::from(value))
    }
}

impl From<EnergyAllocation> for u8 {
    fn from(value: EnergyAllocation) -> Self {
        value.0
    }
}

/// How the subject feels about an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonalAlignment {
    Love,
    Like,
    Neutral,
    PreferNot,
    OnlyIfNecessary,
}

impl PersonalAlignment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Love => "love",
            Self::Like => "like",
            Self::Neutral => "neutral",
            Self::PreferNot => "prefer_not",
            Self::OnlyIfNecessary => "only_if_necessary",
        }
    }

    pub fn parse(value: &str) -> Result<Self, RatingError> {
        match value.trim() {
            "love" => Ok(Self::Love),
            "like" => Ok(Self::Like),
            "neutral" => Ok(Self::Neutral),
            "prefer_not" => Ok(Self::PreferNot),
            "only_if_necessary" => Ok(Self::OnlyIfNecessary),
            other => Err(RatingError::UnknownAlignment(other.to_string())),
        }
    }
}
