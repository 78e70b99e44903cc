//! Errors surfaced by the HTTP layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use crate::constants::CHAT_APOLOGY;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("Language model call failed: {0:#}")]
    Llm(#[from] anyhow::Error),

    #[error("Chat task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Details stay in the log; the caller only ever sees the apology.
        error!("Error: {}", self);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": CHAT_APOLOGY })),
        )
            .into_response()
    }
}
