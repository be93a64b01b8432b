//! Restriction service: persistence, lifecycle, and candidate checks.
//!
//! Writes that can change whether a visitor is restricted also refresh the
//! visitor's `has_restrictions` flag inside the same transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;
use crate::models::pagination::{PagedResult, Pagination};
use crate::models::restriction::{
    CreateRestriction, Restriction, RestrictionKind, RestrictionSeverity, UpdateRestriction,
};
use crate::services::restriction_matcher::{self, RestrictionMatch, VisitorCandidate};

/// Filters for listing restrictions.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RestrictionFilters {
    pub kind: Option<RestrictionKind>,
    pub severity: Option<RestrictionSeverity>,
    pub active: Option<bool>,
    pub visitor_id: Option<i64>,
    pub search: Option<String>,
}

/// Outcome of checking a candidate.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub restricted: bool,
    pub highest_severity: Option<RestrictionSeverity>,
    pub matches: Vec<RestrictionMatch>,
}

impl CheckResult {
    pub fn new(matches: Vec<RestrictionMatch>) -> Self {
        Self {
            restricted: !matches.is_empty(),
            highest_severity: crate::services::occurrence::highest_severity(&matches),
            matches,
        }
    }
}

fn validation_error(e: validator::ValidationErrors) -> AppError {
    AppError::Validation(e.to_string())
}

/// Reject inputs that are inconsistent with the restriction kind.
fn check_kind_consistency(input: &CreateRestriction) -> Result<(), AppError> {
    match input.kind {
        RestrictionKind::Exact if input.visitor_id.is_none() => Err(AppError::Validation(
            "Exact restrictions must reference a visitor".to_string(),
        )),
        RestrictionKind::Predictive if input.visitor_id.is_some() => Err(AppError::Validation(
            "Predictive restrictions cannot reference a visitor".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Create a restriction.
pub async fn create_restriction(
    pool: &PgPool,
    input: &CreateRestriction,
    created_by: Option<Uuid>,
) -> Result<Restriction, AppError> {
    input.validate().map_err(validation_error)?;
    check_kind_consistency(input)?;

    let mut tx = pool.begin().await?;

    let restriction = sqlx::query_as::<_, Restriction>(
        r#"
        INSERT INTO restrictions (kind, visitor_id, pattern_name, pattern_document,
            document_type_id, pattern_phone, destination_ids, reason, severity,
            active, expires_at, created_by, auto_occurrence)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, true, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(input.kind)
    .bind(input.visitor_id)
    .bind(&input.pattern_name)
    .bind(&input.pattern_document)
    .bind(input.document_type_id)
    .bind(&input.pattern_phone)
    .bind(&input.destination_ids)
    .bind(&input.reason)
    .bind(input.severity)
    .bind(input.expires_at)
    .bind(created_by)
    .bind(input.auto_occurrence)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(visitor_id) = restriction.visitor_id {
        refresh_visitor_flag(&mut tx, visitor_id).await?;
    }

    tx.commit().await?;

    if restriction.is_unscoped() {
        tracing::warn!(
            restriction_id = restriction.id,
            "Restriction has no pattern fields and will match every visitor"
        );
    }

    tracing::info!(
        restriction_id = restriction.id,
        kind = ?restriction.kind,
        severity = ?restriction.severity,
        "Restriction created"
    );

    Ok(restriction)
}

/// Find a restriction by ID.
pub async fn get_restriction(pool: &PgPool, id: i64) -> Result<Restriction, AppError> {
    sqlx::query_as::<_, Restriction>("SELECT * FROM restrictions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Restriction not found".to_string()))
}

/// List restrictions with filters and pagination, newest first.
pub async fn list_restrictions(
    pool: &PgPool,
    filters: &RestrictionFilters,
    pagination: &Pagination,
) -> Result<PagedResult<Restriction>, AppError> {
    let mut conditions: Vec<String> = Vec::new();
    let mut param_index = 0u32;

    if filters.kind.is_some() {
        param_index += 1;
        conditions.push(format!("kind = ${param_index}"));
    }
    if filters.severity.is_some() {
        param_index += 1;
        conditions.push(format!("severity = ${param_index}"));
    }
    if filters.active.is_some() {
        param_index += 1;
        conditions.push(format!("active = ${param_index}"));
    }
    if filters.visitor_id.is_some() {
        param_index += 1;
        conditions.push(format!("visitor_id = ${param_index}"));
    }
    if filters.search.is_some() {
        param_index += 1;
        conditions.push(format!(
            "(reason ILIKE ${param_index} OR pattern_name ILIKE ${param_index} \
             OR pattern_document ILIKE ${param_index})"
        ));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM restrictions {where_clause}");
    let data_sql = format!(
        "SELECT * FROM restrictions {where_clause} ORDER BY created_at DESC, id DESC LIMIT {} OFFSET {}",
        pagination.limit(),
        pagination.offset()
    );

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    let mut data_query = sqlx::query_as::<_, Restriction>(&data_sql);

    macro_rules! bind_both {
        ($val:expr) => {
            count_query = count_query.bind($val);
            data_query = data_query.bind($val);
        };
    }

    if let Some(kind) = filters.kind {
        bind_both!(kind);
    }
    if let Some(severity) = filters.severity {
        bind_both!(severity);
    }
    if let Some(active) = filters.active {
        bind_both!(active);
    }
    if let Some(visitor_id) = filters.visitor_id {
        bind_both!(visitor_id);
    }
    if let Some(ref search) = filters.search {
        let pattern = format!("%{search}%");
        count_query = count_query.bind(pattern.clone());
        data_query = data_query.bind(pattern);
    }

    let total = count_query.fetch_one(pool).await?;
    let items = data_query.fetch_all(pool).await?;

    Ok(PagedResult::new(items, total, pagination))
}

/// Update a restriction's patterns, scope, or metadata.
pub async fn update_restriction(
    pool: &PgPool,
    id: i64,
    input: &UpdateRestriction,
) -> Result<Restriction, AppError> {
    input.validate().map_err(validation_error)?;

    let mut tx = pool.begin().await?;

    let restriction = sqlx::query_as::<_, Restriction>(
        r#"
        UPDATE restrictions SET
            pattern_name = COALESCE($2, pattern_name),
            pattern_document = COALESCE($3, pattern_document),
            document_type_id = COALESCE($4, document_type_id),
            pattern_phone = COALESCE($5, pattern_phone),
            destination_ids = COALESCE($6, destination_ids),
            reason = COALESCE($7, reason),
            severity = COALESCE($8, severity),
            expires_at = COALESCE($9, expires_at),
            auto_occurrence = COALESCE($10, auto_occurrence),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&input.pattern_name)
    .bind(&input.pattern_document)
    .bind(input.document_type_id)
    .bind(&input.pattern_phone)
    .bind(&input.destination_ids)
    .bind(&input.reason)
    .bind(input.severity)
    .bind(input.expires_at)
    .bind(input.auto_occurrence)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Restriction not found".to_string()))?;

    if let Some(visitor_id) = restriction.visitor_id {
        refresh_visitor_flag(&mut tx, visitor_id).await?;
    }

    tx.commit().await?;

    tracing::info!(restriction_id = id, "Restriction updated");

    Ok(restriction)
}

/// Soft-deactivate a restriction. Expiry is left untouched.
pub async fn deactivate_restriction(pool: &PgPool, id: i64) -> Result<Restriction, AppError> {
    let mut tx = pool.begin().await?;

    let restriction = sqlx::query_as::<_, Restriction>(
        "UPDATE restrictions SET active = false, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Restriction not found".to_string()))?;

    if let Some(visitor_id) = restriction.visitor_id {
        refresh_visitor_flag(&mut tx, visitor_id).await?;
    }

    tx.commit().await?;

    tracing::info!(restriction_id = id, "Restriction deactivated");

    Ok(restriction)
}

/// Recompute `visitors.has_restrictions` from the visitor's active exact restrictions.
async fn refresh_visitor_flag(
    tx: &mut Transaction<'_, Postgres>,
    visitor_id: i64,
) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"
        UPDATE visitors SET has_restrictions = EXISTS (
            SELECT 1 FROM restrictions
            WHERE visitor_id = $1 AND active = true
              AND (expires_at IS NULL OR expires_at > NOW())
        ), updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(visitor_id)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        tracing::warn!(visitor_id, "Restriction references unknown visitor");
    }

    Ok(())
}

/// Snapshot of restrictions eligible at `now`.
pub async fn fetch_active(pool: &PgPool, now: DateTime<Utc>) -> Result<Vec<Restriction>, AppError> {
    let rules = sqlx::query_as::<_, Restriction>(
        r#"
        SELECT * FROM restrictions
        WHERE active = true AND (expires_at IS NULL OR expires_at > $1)
        ORDER BY id ASC
        "#,
    )
    .bind(now)
    .fetch_all(pool)
    .await?;

    Ok(rules)
}

/// Check a candidate against all active restrictions.
///
/// A failed read is reported as `RestrictionsUnavailable`, never as an
/// empty match list.
pub async fn check_candidate(
    pool: &PgPool,
    candidate: &VisitorCandidate,
) -> Result<CheckResult, AppError> {
    let now = Utc::now();
    let rules = fetch_active(pool, now).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to load restrictions for check");
        AppError::RestrictionsUnavailable
    })?;

    let matches = restriction_matcher::match_restrictions(candidate, &rules, now);
    Ok(CheckResult::new(matches))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_input(kind: RestrictionKind, visitor_id: Option<i64>) -> CreateRestriction {
        CreateRestriction {
            kind,
            visitor_id,
            pattern_name: Some("*SMITH".to_string()),
            pattern_document: None,
            document_type_id: None,
            pattern_phone: None,
            destination_ids: vec![],
            reason: "Flagged".to_string(),
            severity: RestrictionSeverity::High,
            expires_at: None,
            auto_occurrence: false,
        }
    }

    #[test]
    fn exact_requires_visitor() {
        assert!(check_kind_consistency(&create_input(RestrictionKind::Exact, None)).is_err());
        assert!(check_kind_consistency(&create_input(RestrictionKind::Exact, Some(1))).is_ok());
    }

    #[test]
    fn predictive_rejects_visitor() {
        assert!(check_kind_consistency(&create_input(RestrictionKind::Predictive, Some(1))).is_err());
        assert!(check_kind_consistency(&create_input(RestrictionKind::Predictive, None)).is_ok());
    }

    #[test]
    fn check_result_reports_highest_severity() {
        let empty = CheckResult::new(vec![]);
        assert!(!empty.restricted);
        assert!(empty.highest_severity.is_none());

        let result = CheckResult::new(vec![RestrictionMatch {
            restriction_id: 1,
            kind: RestrictionKind::Predictive,
            reason: "r".to_string(),
            severity: RestrictionSeverity::Medium,
            expires_at: None,
            auto_occurrence: false,
            description: String::new(),
        }]);
        assert!(result.restricted);
        assert_eq!(result.highest_severity, Some(RestrictionSeverity::Medium));
    }
}
