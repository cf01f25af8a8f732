use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;

use crate::errors::AppError;
use crate::models::token::{IssueRequest, IssuedUrl};
use crate::AppState;

/// POST /api/v1/urls — mint a single-use signed URL.
///
/// The response is only produced after the token record is durable in the
/// store; a signed URL is never disclosed for a record that failed to write.
pub async fn create_url(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IssueRequest>,
) -> Result<(StatusCode, Json<IssuedUrl>), AppError> {
    let now = Utc::now().timestamp();
    let issued = state.issuer.issue(&req, now).await?;
    Ok((StatusCode::CREATED, Json(issued)))
}
