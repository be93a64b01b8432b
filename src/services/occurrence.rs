//! Automatic occurrences for authorized entries of restricted visitors.
//!
//! When an operator lets a visitor in despite matching restrictions, every
//! match flagged `auto_occurrence` is written into a single non-editable
//! occurrence, coloured by the most severe of those matches.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::occurrence::{Occurrence, OccurrenceSeverity};
use crate::models::restriction::RestrictionSeverity;
use crate::services::restriction_matcher::{RestrictionMatch, VisitorCandidate};

/// Severity groups in description order.
const SEVERITY_ORDER: [RestrictionSeverity; 4] = [
    RestrictionSeverity::High,
    RestrictionSeverity::Medium,
    RestrictionSeverity::Low,
    RestrictionSeverity::None,
];

const NOT_INFORMED: &str = "Not informed";

/// Operator who authorized the entry.
#[derive(Debug, Clone, Serialize)]
pub struct Authorizer {
    pub id: Uuid,
    pub name: String,
}

/// Occurrence ready to be persisted.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OccurrenceDraft {
    pub description: String,
    pub severity: OccurrenceSeverity,
    pub occurrence_datetime: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub visitor_id: Option<i64>,
    pub destination_id: Option<i64>,
    pub restriction_ids: Vec<i64>,
}

/// Most severe restriction severity among `matches`.
pub fn highest_severity(matches: &[RestrictionMatch]) -> Option<RestrictionSeverity> {
    matches.iter().map(|m| m.severity).max_by_key(|s| s.rank())
}

/// Build the occurrence for an authorized entry.
///
/// Returns `None` when no match has `auto_occurrence` set.
pub fn draft_for_authorization(
    candidate: &VisitorCandidate,
    visitor_id: Option<i64>,
    matches: &[RestrictionMatch],
    authorizer: &Authorizer,
    now: DateTime<Utc>,
) -> Option<OccurrenceDraft> {
    let flagged: Vec<&RestrictionMatch> = matches.iter().filter(|m| m.auto_occurrence).collect();
    if flagged.is_empty() {
        tracing::info!(
            matches = matches.len(),
            "No auto-occurrence restriction among matches, nothing to record"
        );
        return None;
    }

    let severity = flagged
        .iter()
        .map(|m| m.severity)
        .max_by_key(|s| s.rank())
        .unwrap_or(RestrictionSeverity::None);

    Some(OccurrenceDraft {
        description: describe_authorization(candidate, &flagged, authorizer),
        severity: severity.into(),
        occurrence_datetime: now,
        created_by: Some(authorizer.id),
        visitor_id,
        destination_id: candidate.destination_id,
        restriction_ids: flagged.iter().map(|m| m.restriction_id).collect(),
    })
}

fn describe_authorization(
    candidate: &VisitorCandidate,
    flagged: &[&RestrictionMatch],
    authorizer: &Authorizer,
) -> String {
    let phone = candidate
        .phone
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or("N/A");
    let destination = candidate
        .destination_id
        .map(|id| format!("#{id}"))
        .unwrap_or_else(|| NOT_INFORMED.to_string());
    let name = non_blank(&candidate.name).unwrap_or(NOT_INFORMED);
    let document = non_blank(&candidate.document_number).unwrap_or(NOT_INFORMED);

    let mut description = format!(
        "Visitor entry authorized with access restrictions:\n\
         \n\
         Visitor data:\n\
         Name: {name}\n\
         Document: {document} (type #{doc_type})\n\
         Phone: {phone}\n\
         Destination: {destination}\n\
         \n\
         Authorized restrictions ({count}):",
        doc_type = candidate.document_type_id,
        count = flagged.len(),
    );

    for severity in SEVERITY_ORDER {
        let group: Vec<&&RestrictionMatch> =
            flagged.iter().filter(|m| m.severity == severity).collect();
        if group.is_empty() {
            continue;
        }
        description.push_str(&format!(
            "\n\nSeverity {}:",
            severity.label().to_uppercase()
        ));
        for m in group {
            description.push_str(&format!("\n- {}", m.reason));
            if let Some(expires_at) = m.expires_at {
                description.push_str(&format!(" (Expires on: {})", expires_at.format("%d/%m/%Y")));
            }
        }
    }

    description.push_str(&format!("\n\nAuthorized by: {}", authorizer.name));
    description.push_str("\nNOTE: Occurrence generated automatically by visitor monitoring.");
    description
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Insert the occurrence and link its visitor and destination.
pub async fn record(pool: &PgPool, draft: &OccurrenceDraft) -> Result<Occurrence, AppError> {
    let mut tx = pool.begin().await?;

    let occurrence = sqlx::query_as::<_, Occurrence>(
        r#"
        INSERT INTO occurrences (description, severity, occurrence_datetime, created_by, is_editable)
        VALUES ($1, $2, $3, $4, false)
        RETURNING *
        "#,
    )
    .bind(&draft.description)
    .bind(draft.severity)
    .bind(draft.occurrence_datetime)
    .bind(draft.created_by)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(visitor_id) = draft.visitor_id {
        sqlx::query("INSERT INTO occurrence_visitors (occurrence_id, visitor_id) VALUES ($1, $2)")
            .bind(occurrence.id)
            .bind(visitor_id)
            .execute(&mut *tx)
            .await?;
    }

    if let Some(destination_id) = draft.destination_id {
        sqlx::query(
            "INSERT INTO occurrence_destinations (occurrence_id, destination_id) VALUES ($1, $2)",
        )
        .bind(occurrence.id)
        .bind(destination_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        occurrence_id = occurrence.id,
        severity = ?occurrence.severity,
        visitor_id = ?draft.visitor_id,
        restriction_ids = ?draft.restriction_ids,
        "Automatic occurrence recorded for authorized entry"
    );

    Ok(occurrence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::models::restriction::RestrictionKind;

    fn make_match(id: i64, severity: RestrictionSeverity, auto: bool, reason: &str) -> RestrictionMatch {
        RestrictionMatch {
            restriction_id: id,
            kind: RestrictionKind::Predictive,
            reason: reason.to_string(),
            severity,
            expires_at: None,
            auto_occurrence: auto,
            description: String::new(),
        }
    }

    fn candidate() -> VisitorCandidate {
        VisitorCandidate {
            name: "JOHN SMITH".to_string(),
            document_number: "12345".to_string(),
            document_type_id: 1,
            phone: None,
            destination_id: Some(7),
        }
    }

    fn authorizer() -> Authorizer {
        Authorizer {
            id: Uuid::nil(),
            name: "operator".to_string(),
        }
    }

    #[test]
    fn highest_severity_uses_rank() {
        let matches = vec![
            make_match(1, RestrictionSeverity::Low, false, "a"),
            make_match(2, RestrictionSeverity::High, false, "b"),
            make_match(3, RestrictionSeverity::Medium, false, "c"),
        ];
        assert_eq!(highest_severity(&matches), Some(RestrictionSeverity::High));
        assert_eq!(highest_severity(&[]), None);
    }

    #[test]
    fn no_draft_without_auto_occurrence() {
        let matches = vec![make_match(1, RestrictionSeverity::High, false, "a")];
        let draft = draft_for_authorization(&candidate(), None, &matches, &authorizer(), Utc::now());
        assert!(draft.is_none());
    }

    #[test]
    fn severity_comes_from_flagged_matches_only() {
        let matches = vec![
            make_match(1, RestrictionSeverity::High, false, "not flagged"),
            make_match(2, RestrictionSeverity::Low, true, "flagged"),
        ];
        let draft =
            draft_for_authorization(&candidate(), Some(3), &matches, &authorizer(), Utc::now())
                .unwrap();
        assert_eq!(draft.severity, OccurrenceSeverity::Green);
        assert_eq!(draft.restriction_ids, vec![2]);
        assert_eq!(draft.visitor_id, Some(3));
        assert_eq!(draft.destination_id, Some(7));
        assert_eq!(draft.created_by, Some(Uuid::nil()));
        assert!(!draft.description.contains("not flagged"));
    }

    #[test]
    fn description_groups_high_first_with_expiry() {
        let mut medium = make_match(1, RestrictionSeverity::Medium, true, "Unpaid debts");
        medium.expires_at = Some(Utc.with_ymd_and_hms(2025, 3, 9, 12, 0, 0).unwrap());
        let high = make_match(2, RestrictionSeverity::High, true, "Threatened staff");

        let draft = draft_for_authorization(
            &candidate(),
            None,
            &[medium, high],
            &authorizer(),
            Utc::now(),
        )
        .unwrap();

        let d = &draft.description;
        assert_eq!(draft.severity, OccurrenceSeverity::Red);
        assert!(d.contains("Name: JOHN SMITH"));
        assert!(d.contains("Phone: N/A"));
        assert!(d.contains("Destination: #7"));
        assert!(d.contains("Authorized restrictions (2):"));
        assert!(d.contains("- Unpaid debts (Expires on: 09/03/2025)"));
        assert!(d.contains("Authorized by: operator"));

        let high_at = d.find("Severity HIGH:").unwrap();
        let medium_at = d.find("Severity MEDIUM:").unwrap();
        assert!(high_at < medium_at);
        assert!(!d.contains("Severity LOW:"));
    }
}
