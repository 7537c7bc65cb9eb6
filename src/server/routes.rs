use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::{error, info};

use crate::inference::QaEngine;
use super::types::{ApiResponse, Query, StatusResponse};

/// Returns a service status summary so callers can see which model is
/// serving and since when.
pub async fn service_status(State(engine): State<Arc<QaEngine>>) -> impl IntoResponse {
    Json(StatusResponse {
        status: "Model API is running".to_string(),
        model: engine.model_name().to_string(),
        loaded_at: engine.loaded_at(),
    })
}

/// Handles the predict endpoint.
///
/// The forward pass is synchronous, so it runs on the blocking pool rather
/// than inline on the async workers.
pub async fn predict(
    State(engine): State<Arc<QaEngine>>,
    Json(query): Json<Query>,
) -> impl IntoResponse {
    info!(
        "Received query: story length={}, question: '{}'",
        query.story.len(),
        query.question
    );

    let result =
        tokio::task::spawn_blocking(move || engine.predict(&query.story, &query.question)).await;

    match result {
        Ok(Ok(prediction)) => {
            info!(
                "Prediction complete: answer={}, confidence_yes={:.4}",
                prediction.answer, prediction.confidence_yes
            );
            (StatusCode::OK, Json(prediction)).into_response()
        }
        Ok(Err(e)) => {
            error!("Prediction failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()> {
                    status: "error".to_string(),
                    data: None,
                    message: Some(format!("Prediction failed: {}", e)),
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Prediction task was cancelled or panicked: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()> {
                    status: "error".to_string(),
                    data: None,
                    message: Some("Prediction task failed".to_string()),
                }),
            )
                .into_response()
        }
    }
}
