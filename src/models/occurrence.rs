//! Security occurrence (incident log) model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::restriction::RestrictionSeverity;

/// Colour-coded occurrence severity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "occurrence_severity", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OccurrenceSeverity {
    Gray,
    Green,
    Amber,
    Red,
}

impl From<RestrictionSeverity> for OccurrenceSeverity {
    fn from(severity: RestrictionSeverity) -> Self {
        match severity {
            RestrictionSeverity::None => Self::Gray,
            RestrictionSeverity::Low => Self::Green,
            RestrictionSeverity::Medium => Self::Amber,
            RestrictionSeverity::High => Self::Red,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Occurrence {
    pub id: i64,
    pub description: String,
    pub severity: OccurrenceSeverity,
    pub occurrence_datetime: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub is_editable: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restriction_severity_maps_to_colour() {
        assert_eq!(
            OccurrenceSeverity::from(RestrictionSeverity::None),
            OccurrenceSeverity::Gray
        );
        assert_eq!(
            OccurrenceSeverity::from(RestrictionSeverity::Low),
            OccurrenceSeverity::Green
        );
        assert_eq!(
            OccurrenceSeverity::from(RestrictionSeverity::Medium),
            OccurrenceSeverity::Amber
        );
        assert_eq!(
            OccurrenceSeverity::from(RestrictionSeverity::High),
            OccurrenceSeverity::Red
        );
    }
}
