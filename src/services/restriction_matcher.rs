//! Restriction matching engine.
//!
//! Evaluates a visitor candidate against a set of restriction rules and
//! returns every rule that applies. A rule applies when it is active, not
//! expired, and every field it specifies agrees with the candidate; fields
//! left empty are "don't care".
//!
//! This module contains no database access. The caller fetches the rules
//! and decides what to do with the matches (block entry, warn, or record
//! an occurrence for `auto_occurrence` rules).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::restriction::{specified, Restriction, RestrictionKind, RestrictionSeverity};
use crate::services::wildcard::{self, AnchorMode};

/// Visitor attributes checked against restriction rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitorCandidate {
    pub name: String,
    pub document_number: String,
    pub document_type_id: i64,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub destination_id: Option<i64>,
}

/// A rule that applies to the candidate.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RestrictionMatch {
    pub restriction_id: i64,
    pub kind: RestrictionKind,
    pub reason: String,
    pub severity: RestrictionSeverity,
    pub expires_at: Option<DateTime<Utc>>,
    pub auto_occurrence: bool,
    pub description: String,
}

impl RestrictionMatch {
    fn from_rule(rule: &Restriction) -> Self {
        Self {
            restriction_id: rule.id,
            kind: rule.kind,
            reason: rule.reason.clone(),
            severity: rule.severity,
            expires_at: rule.expires_at,
            auto_occurrence: rule.auto_occurrence,
            description: rule.describe(),
        }
    }
}

/// Match a candidate against `rules`, evaluated at `now`.
///
/// Results keep the order of `rules`.
pub fn match_restrictions(
    candidate: &VisitorCandidate,
    rules: &[Restriction],
    now: DateTime<Utc>,
) -> Vec<RestrictionMatch> {
    let matches: Vec<RestrictionMatch> = rules
        .iter()
        .filter(|rule| rule.is_eligible(now))
        .filter(|rule| rule_applies(rule, candidate))
        .map(|rule| {
            tracing::info!(
                restriction_id = rule.id,
                kind = ?rule.kind,
                severity = ?rule.severity,
                reason = %rule.reason,
                "Restriction matched visitor"
            );
            RestrictionMatch::from_rule(rule)
        })
        .collect();

    tracing::debug!(
        candidate_name = %candidate.name,
        candidate_document = %candidate.document_number,
        rules_evaluated = rules.len(),
        matches = matches.len(),
        "Restriction check completed"
    );

    matches
}

/// Field checks for a single rule (eligibility is checked separately).
fn rule_applies(rule: &Restriction, candidate: &VisitorCandidate) -> bool {
    let mode = rule.kind.anchor_mode();

    document_type_agrees(rule, candidate)
        && pattern_agrees(&rule.pattern_name, &candidate.name, mode)
        && pattern_agrees(&rule.pattern_document, &candidate.document_number, mode)
        && phone_agrees(&rule.pattern_phone, candidate.phone.as_deref(), mode)
        && destination_agrees(rule, candidate)
}

fn document_type_agrees(rule: &Restriction, candidate: &VisitorCandidate) -> bool {
    rule.document_type_id
        .map_or(true, |id| id == candidate.document_type_id)
}

/// An unset pattern never causes a non-match. The candidate value is
/// matched as given, so a blank value fails any non-wildcard pattern.
fn pattern_agrees(pattern: &Option<String>, value: &str, mode: AnchorMode) -> bool {
    specified(pattern).map_or(true, |pattern| wildcard::matches(pattern, value, mode))
}

/// Phone is only checked when the candidate supplied one.
fn phone_agrees(pattern: &Option<String>, phone: Option<&str>, mode: AnchorMode) -> bool {
    match phone.filter(|p| !p.trim().is_empty()) {
        Some(phone) => pattern_agrees(pattern, phone, mode),
        None => true,
    }
}

fn destination_agrees(rule: &Restriction, candidate: &VisitorCandidate) -> bool {
    match candidate.destination_id {
        Some(destination) if !rule.destination_ids.is_empty() => {
            rule.destination_ids.contains(&destination)
        }
        _ => true,
    }
}
