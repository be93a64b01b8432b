//! Restriction routes: checks at the gate and restriction management.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::{ApiResponse, AppError};
use crate::middleware::auth::CurrentUser;
use crate::models::occurrence::Occurrence;
use crate::models::pagination::{PagedResult, Pagination};
use crate::models::restriction::{CreateRestriction, Restriction, UpdateRestriction};
use crate::services::occurrence as occurrence_service;
use crate::services::restriction::{self as restriction_service, CheckResult, RestrictionFilters};
use crate::services::restriction_matcher::VisitorCandidate;
use crate::AppState;

/// Entry authorization request for a visitor who matched restrictions.
#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    #[serde(flatten)]
    pub candidate: VisitorCandidate,
    /// Existing visitor record, when already registered.
    pub visitor_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub check: CheckResult,
    pub occurrence: Option<Occurrence>,
}

/// POST /api/v1/restrictions/check: match a visitor against active restrictions.
pub async fn check(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(candidate): Json<VisitorCandidate>,
) -> Result<Json<ApiResponse<CheckResult>>, AppError> {
    let result = restriction_service::check_candidate(&state.db, &candidate).await?;
    Ok(ApiResponse::success(result))
}

/// POST /api/v1/restrictions/authorize: operator lets a restricted visitor in.
///
/// Matches flagged `auto_occurrence` are recorded as one occurrence.
pub async fn authorize(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(body): Json<AuthorizeRequest>,
) -> Result<Json<ApiResponse<AuthorizeResponse>>, AppError> {
    let check = restriction_service::check_candidate(&state.db, &body.candidate).await?;

    let draft = occurrence_service::draft_for_authorization(
        &body.candidate,
        body.visitor_id,
        &check.matches,
        &current_user.authorizer(),
        Utc::now(),
    );

    let occurrence = match draft {
        Some(draft) => Some(occurrence_service::record(&state.db, &draft).await?),
        None => None,
    };

    tracing::info!(
        operator = %current_user.username,
        matches = check.matches.len(),
        occurrence_recorded = occurrence.is_some(),
        "Restricted entry authorized"
    );

    Ok(ApiResponse::success(AuthorizeResponse { check, occurrence }))
}

/// GET /api/v1/restrictions: list restrictions with filters and pagination.
pub async fn list(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(pagination): Query<Pagination>,
    Query(filters): Query<RestrictionFilters>,
) -> Result<Json<ApiResponse<PagedResult<Restriction>>>, AppError> {
    let result = restriction_service::list_restrictions(&state.db, &filters, &pagination).await?;
    Ok(ApiResponse::success(result))
}

/// POST /api/v1/restrictions: create a restriction.
pub async fn create(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(body): Json<CreateRestriction>,
) -> Result<Json<ApiResponse<Restriction>>, AppError> {
    let restriction =
        restriction_service::create_restriction(&state.db, &body, Some(current_user.id)).await?;
    Ok(ApiResponse::success(restriction))
}

/// GET /api/v1/restrictions/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Restriction>>, AppError> {
    let restriction = restriction_service::get_restriction(&state.db, id).await?;
    Ok(ApiResponse::success(restriction))
}

/// PUT /api/v1/restrictions/{id}
pub async fn update(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateRestriction>,
) -> Result<Json<ApiResponse<Restriction>>, AppError> {
    let restriction = restriction_service::update_restriction(&state.db, id, &body).await?;
    Ok(ApiResponse::success(restriction))
}

/// POST /api/v1/restrictions/{id}/deactivate
pub async fn deactivate(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Restriction>>, AppError> {
    let restriction = restriction_service::deactivate_restriction(&state.db, id).await?;
    tracing::info!(restriction_id = id, operator = %current_user.username, "Deactivated by operator");
    Ok(ApiResponse::success(restriction))
}
