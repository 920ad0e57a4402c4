use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use vidhi_index::{MetadataFilter, RecordMetadata};

use super::error::ApiError;
use super::server::AppState;

#[derive(serde::Deserialize)]
pub(crate) struct ChatRequest {
    pub query: String,
    #[serde(default)]
    pub metadata_filter: Option<MetadataFilter>,
}

#[derive(serde::Serialize)]
pub(crate) struct ChatResponse {
    pub answer: String,
    pub sources: Vec<RecordMetadata>,
}

#[derive(serde::Serialize)]
struct StatusResponse {
    status: &'static str,
    message: String,
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    ready: bool,
    uptime_secs: u64,
}

pub(crate) async fn root_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusResponse {
        status: "ok",
        message: format!("{} Running", state.service_name),
    })
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        ready: state.slot.is_ready(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

pub(crate) async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        let status = match &rejection {
            JsonRejection::JsonSyntaxError(_) | JsonRejection::JsonDataError(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            other => other.status(),
        };
        ApiError::new(status, rejection.body_text())
    })?;

    if request.query.trim().is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "query must not be empty",
        ));
    }

    let service = state.slot.get_or_init().await.map_err(|e| {
        tracing::error!("answer service unavailable: {e}");
        ApiError::internal(format!("Service not initialized: {e}"))
    })?;

    let answer = service
        .answer(&request.query, request.metadata_filter.as_ref())
        .await
        .map_err(|e| {
            tracing::error!("chat request failed: {e}");
            ApiError::internal(e.to_string())
        })?;

    tracing::info!(sources = answer.sources.len(), "chat answered");
    Ok(Json(ChatResponse {
        answer: answer.text,
        sources: answer.sources,
    }))
}
