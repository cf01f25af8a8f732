use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use chrono::Utc;

use crate::redeemer::{token_id_from_query, Redemption};
use crate::AppState;

pub mod handlers;

/// Management API router. The caller mounts this under `/api/v1`.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/urls", post(handlers::create_url))
        .fallback(fallback_404)
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Redemption gate: intercepts every content request, extracts the token id
/// from the raw query string, and consumes it. On `Allowed` the original
/// request is forwarded unmodified downstream; both rejection outcomes
/// redirect to the re-auth fallback with an identical payload, so the
/// response does not reveal whether a token was consumed, expired, or never
/// existed.
pub async fn redeem_gate(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let query = req.uri().query().unwrap_or("");
    let Some(token_id) = token_id_from_query(query) else {
        // Malformed input is a direct client error — no store call was made,
        // so there is nothing to redirect away from.
        return Err(crate::errors::AppError::MissingToken.into_response());
    };

    let now = Utc::now().timestamp();
    match state.redeemer.redeem(&token_id, now).await {
        Ok(Redemption::Allowed(_)) => Ok(next.run(req).await),
        Ok(Redemption::Expired) | Ok(Redemption::NotFound) => Err(reauth_redirect(&state)),
        Err(e) => Err(e.into_response()),
    }
}

/// 302 to the fallback page, with an opaque error indicator.
fn reauth_redirect(state: &AppState) -> Response {
    let location = format!("{}?err=denied", state.config.reauth_url());
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}
