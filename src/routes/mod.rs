//! Route definitions for the Guardian API.

pub mod credentials;
pub mod health;
pub mod restrictions;
pub mod templates;
pub mod weekdays;

use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Request body cap. Templates are posted inline.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let restriction_routes = Router::new()
        .route("/restrictions/check", post(restrictions::check))
        .route("/restrictions/authorize", post(restrictions::authorize))
        .route(
            "/restrictions",
            get(restrictions::list).post(restrictions::create),
        )
        .route(
            "/restrictions/{id}",
            get(restrictions::get_by_id).put(restrictions::update),
        )
        .route(
            "/restrictions/{id}/deactivate",
            post(restrictions::deactivate),
        );

    let template_routes = Router::new()
        .route("/templates/render", post(templates::render))
        .route("/weekdays/text", get(weekdays::text))
        .route(
            "/credentials/{visitor_id}/render",
            post(credentials::render),
        );

    let api = Router::new()
        .merge(restriction_routes)
        .merge(template_routes);

    Router::new()
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}
