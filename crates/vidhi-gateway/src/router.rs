use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{chat_handler, health_handler, root_handler};
use super::server::AppState;

/// `GET /`, `GET /health` and `POST /api/chat` with permissive CORS, a body
/// size limit on chat and request tracing.
pub fn build_router(state: AppState, max_body_size: usize) -> Router {
    let api = Router::new()
        .route("/api/chat", post(chat_handler))
        .layer(RequestBodyLimitLayer::new(max_body_size));

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .merge(api)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
