use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::middleware::RequestId;
use crate::models::{FeedResponse, Interaction};

use super::AppState;

/// Largest feed a single request may ask for
pub const MAX_FEED_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct InteractionAccepted {
    pub user_id: String,
    pub content_id: String,
}

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Generate a personalized feed for a user
pub async fn get_feed(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<FeedQuery>,
    request_id: Option<Extension<RequestId>>,
) -> AppResult<Json<FeedResponse>> {
    let limit = query
        .limit
        .unwrap_or(state.engine.settings().default_feed_length);
    if limit == 0 || limit > MAX_FEED_LIMIT {
        return Err(AppError::InvalidInput(format!(
            "limit must be between 1 and {}",
            MAX_FEED_LIMIT
        )));
    }

    tracing::debug!(
        user_id = %user_id,
        limit,
        request_id = %request_id.as_ref().map(|Extension(id)| id.as_str()).unwrap_or("unknown"),
        "Feed requested"
    );

    let response = state.engine.generate_feed(&user_id, limit).await?;
    Ok(Json(response))
}

/// Record a user interaction
pub async fn create_interaction(
    State(state): State<AppState>,
    Json(interaction): Json<Interaction>,
) -> AppResult<(StatusCode, Json<InteractionAccepted>)> {
    let accepted = InteractionAccepted {
        user_id: interaction.user_id.clone(),
        content_id: interaction.content_id.clone(),
    };

    state.engine.record_interaction(interaction).await?;

    Ok((StatusCode::CREATED, Json(accepted)))
}
