use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    db::Store,
    middleware::request_id::{make_span_with_request_id, request_id_middleware},
    services::recommendations::Recommender,
};

pub mod genres;
pub mod movies;
pub mod rankings;
pub mod users;

/// Shared state handed to every handler
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub recommender: Recommender,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, recommender: Recommender) -> Self {
        Self { store, recommender }
    }
}

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(request_id_middleware))
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/users", users::router())
        .nest("/genres", genres::router())
        .nest("/movies", movies::router())
        .nest("/rankings", rankings::router())
}

async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Trims a required text field, rejecting blank input
pub(crate) fn required_text(value: &str, field: &str) -> crate::error::AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(crate::error::AppError::InvalidInput(format!(
            "{} must not be blank",
            field
        )));
    }
    Ok(trimmed.to_string())
}

/// 200 with the items, or 204 when a filter matched nothing
pub(crate) fn listing_or_no_content<T: Serialize>(items: Vec<T>) -> Response {
    if items.is_empty() {
        StatusCode::NO_CONTENT.into_response()
    } else {
        Json(items).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        let state = AppState::new(Arc::new(MemoryStore::new()), Recommender::default());
        create_router(Arc::new(state))
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_response_carries_request_id() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("x-request-id", "0b6a1f3e-8c1d-4f57-9a43-2f1b7c0d9e11")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get("x-request-id").unwrap(),
            "0b6a1f3e-8c1d-4f57-9a43-2f1b7c0d9e11"
        );
    }

    #[test]
    fn test_required_text_rejects_blank() {
        assert!(required_text("   ", "username").is_err());
        assert_eq!(required_text(" bob ", "username").unwrap(), "bob");
    }
}
