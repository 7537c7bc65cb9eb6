use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request body for a prediction
#[derive(Deserialize, Serialize, Clone)]
pub struct Query {
    pub story: String,
    pub question: String,
}

/// Generic API response wrapper used for error envelopes
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub data: Option<T>,
    pub message: Option<String>,
}

/// Response for the service status route
#[derive(Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub model: String,
    pub loaded_at: DateTime<Utc>,
}
