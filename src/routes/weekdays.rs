//! Weekday text lookup.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ApiResponse, AppError};
use crate::middleware::auth::CurrentUser;
use crate::services::weekday as weekday_service;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WeekdayQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct WeekdayText {
    pub date: NaiveDate,
    pub text: String,
    /// `<img>` tag for the day's image; empty when the day has none.
    pub image_html: String,
}

/// GET /api/v1/weekdays/text?date=YYYY-MM-DD
pub async fn text(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<WeekdayQuery>,
) -> Result<Json<ApiResponse<WeekdayText>>, AppError> {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let (text, image_html) =
        weekday_service::display_for_date(&state.db, date, &state.config.public_base_url).await?;
    Ok(ApiResponse::success(WeekdayText {
        date,
        text,
        image_html,
    }))
}
