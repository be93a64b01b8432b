//! Restriction ("persona non grata") rule model and DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::services::wildcard::AnchorMode;

// -- Enums matching PostgreSQL --

/// Provenance of a restriction rule.
///
/// `Exact` rules are registered against a known visitor; `Predictive` rules
/// are free-standing patterns checked before a visitor record exists.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "restriction_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RestrictionKind {
    Exact,
    Predictive,
}

impl RestrictionKind {
    /// Anchoring policy used when matching this kind's wildcard fields.
    pub fn anchor_mode(self) -> AnchorMode {
        match self {
            Self::Exact => AnchorMode::Strict,
            Self::Predictive => AnchorMode::Conditional,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Exact => "Restriction",
            Self::Predictive => "Predictive restriction",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "restriction_severity", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RestrictionSeverity {
    None,
    Low,
    Medium,
    High,
}

impl RestrictionSeverity {
    /// Ordering weight, `None` lowest.
    pub fn rank(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    /// Display label shown to operators.
    pub fn label(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

// -- Restriction row --

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Restriction {
    pub id: i64,
    pub kind: RestrictionKind,
    pub visitor_id: Option<i64>,
    pub pattern_name: Option<String>,
    pub pattern_document: Option<String>,
    pub document_type_id: Option<i64>,
    pub pattern_phone: Option<String>,
    pub destination_ids: Vec<i64>,
    pub reason: String,
    pub severity: RestrictionSeverity,
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub auto_occurrence: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Restriction {
    /// Whether the rule is active and not yet expired at `now`.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.active && !self.is_expired(now)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }

    /// True when no pattern, document type or destination scope is set.
    ///
    /// Such a rule matches every visitor.
    pub fn is_unscoped(&self) -> bool {
        specified(&self.pattern_name).is_none()
            && specified(&self.pattern_document).is_none()
            && specified(&self.pattern_phone).is_none()
            && self.document_type_id.is_none()
            && self.destination_ids.is_empty()
    }

    /// Short description used in match results and occurrence text.
    pub fn describe(&self) -> String {
        let mut desc = self.kind.label().to_string();

        if let Some(name) = specified(&self.pattern_name) {
            desc.push_str(&format!(" - Name: {name}"));
        }
        if self.document_type_id.is_some() {
            desc.push_str(" - Specific document type");
        }
        if let Some(doc) = specified(&self.pattern_document) {
            desc.push_str(&format!(" - Doc #: {doc}"));
        }
        if let Some(phone) = specified(&self.pattern_phone) {
            desc.push_str(&format!(" - Phone: {phone}"));
        }
        if !self.destination_ids.is_empty() {
            desc.push_str(" - Specific destinations");
        }

        desc
    }
}

/// Treat `None`, empty and whitespace-only values as "not specified".
pub fn specified(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

// -- DTOs --

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRestriction {
    pub kind: RestrictionKind,
    pub visitor_id: Option<i64>,
    #[validate(length(max = 255))]
    pub pattern_name: Option<String>,
    #[validate(length(max = 100))]
    pub pattern_document: Option<String>,
    pub document_type_id: Option<i64>,
    #[validate(length(max = 50))]
    pub pattern_phone: Option<String>,
    #[serde(default)]
    pub destination_ids: Vec<i64>,
    #[validate(length(min = 1, max = 2000))]
    pub reason: String,
    pub severity: RestrictionSeverity,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub auto_occurrence: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateRestriction {
    #[validate(length(max = 255))]
    pub pattern_name: Option<String>,
    #[validate(length(max = 100))]
    pub pattern_document: Option<String>,
    pub document_type_id: Option<i64>,
    #[validate(length(max = 50))]
    pub pattern_phone: Option<String>,
    pub destination_ids: Option<Vec<i64>>,
    #[validate(length(min = 1, max = 2000))]
    pub reason: Option<String>,
    pub severity: Option<RestrictionSeverity>,
    pub expires_at: Option<DateTime<Utc>>,
    pub auto_occurrence: Option<bool>,
}
