//! Template rendering routes.

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::errors::{ApiResponse, AppError};
use crate::middleware::auth::CurrentUser;
use crate::services::storage;
use crate::services::template::{RenderReport, TemplateContext, TemplateRenderer};
use crate::services::weekday as weekday_service;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RenderRequest {
    pub template: String,
    #[serde(default)]
    pub values: BTreeMap<String, String>,
    /// Resolve weekday markers for this date (defaults to today).
    pub date: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub include_weekday: bool,
}

fn default_true() -> bool {
    true
}

/// POST /api/v1/templates/render: substitute markers in an ad-hoc template.
pub async fn render(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(body): Json<RenderRequest>,
) -> Result<Json<ApiResponse<RenderReport>>, AppError> {
    let mut context = TemplateContext::new();

    if body.include_weekday {
        let date = body.date.unwrap_or_else(|| Utc::now().date_naive());
        let record = weekday_service::find_active_for_date(&state.db, date).await?;
        let base_url = state.config.public_base_url.clone();
        let markers = storage::with_store(state.storage.clone(), move |store| {
            weekday_service::resolve_markers(date, record.as_ref(), store, &base_url)
        })
        .await?;
        context.extend(markers.into_context());
    }

    // Explicit values override weekday markers.
    context.extend(body.values.into_iter().collect());

    let report = TemplateRenderer::new()
        .with_base_url(state.config.public_base_url.as_str())
        .render_with_report(&body.template, &context);

    Ok(ApiResponse::success(report))
}
