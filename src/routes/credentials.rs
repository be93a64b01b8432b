//! Credential rendering for registered visitors.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::errors::{ApiResponse, AppError};
use crate::middleware::auth::CurrentUser;
use crate::models::visitor::Visitor;
use crate::services::credential::{self as credential_service, RenderedCredential};
use crate::services::storage;
use crate::services::weekday as weekday_service;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CredentialRequest {
    /// Template reference, e.g. `visitor.html`.
    pub template: String,
    pub date: Option<NaiveDate>,
}

/// POST /api/v1/credentials/{visitor_id}/render
pub async fn render(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(visitor_id): Path<i64>,
    Json(body): Json<CredentialRequest>,
) -> Result<Json<ApiResponse<RenderedCredential>>, AppError> {
    let visitor = sqlx::query_as::<_, Visitor>("SELECT * FROM visitors WHERE id = $1")
        .bind(visitor_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Visitor not found".to_string()))?;

    let visitor_json = serde_json::to_value(&visitor)
        .map_err(|e| AppError::Internal(format!("Visitor serialization failed: {e}")))?;

    let date = body.date.unwrap_or_else(|| Utc::now().date_naive());
    let record = weekday_service::find_active_for_date(&state.db, date).await?;
    let visitor_context = credential_service::visitor_context(&visitor_json);
    let base_url = state.config.public_base_url.clone();
    let template = body.template;

    let rendered = storage::with_store(state.storage.clone(), move |store| {
        let weekday = weekday_service::resolve_markers(date, record.as_ref(), store, &base_url);
        credential_service::render_credential(
            store,
            &template,
            visitor_context,
            weekday.into_context(),
            &base_url,
        )
    })
    .await??;

    tracing::info!(
        visitor_id,
        operator = %current_user.username,
        template = %rendered.template,
        "Credential rendered for visitor"
    );

    Ok(ApiResponse::success(rendered))
}
