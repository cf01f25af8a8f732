use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::signer::SignError;
use crate::store::StoreError;

/// Failure taxonomy for issuance and redemption.
///
/// Rejection outcomes (token absent/expired) are NOT errors — they are
/// ordinary results of the redemption state machine and are handled by the
/// redemption gate as redirects. This enum covers genuine failures, split so
/// that client mistakes, collaborator failures, and store failures surface
/// with distinct status categories: a transient store outage must never look
/// like "token already used" to the caller.
#[derive(Debug, Error)]
pub enum AppError {
    /// Redemption request without a usable `id` query parameter.
    #[error("missing or empty token id")]
    MissingToken,

    /// Issuance request with a malformed parameter.
    #[error("invalid parameter: {0}")]
    InvalidParam(&'static str),

    /// Signing collaborator failed; issuance aborts with no record written.
    #[error("signing failed: {0}")]
    Signing(#[from] SignError),

    /// Token store unreachable or failed mid-operation.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Content origin fetch failed for an allowed request.
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match &self {
            AppError::MissingToken => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "missing_token",
                "missing or empty token id".to_string(),
            ),
            AppError::InvalidParam(name) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "invalid_parameter",
                format!("invalid parameter: {name}"),
            ),
            AppError::Signing(e) => {
                tracing::error!("signing failed: {}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    "upstream_error",
                    "signing_failed",
                    "failed to sign URL".to_string(),
                )
            }
            AppError::Store(e) => {
                tracing::error!("store error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "store_error",
                    "internal server error".to_string(),
                )
            }
            AppError::Upstream(e) => (
                StatusCode::BAD_GATEWAY,
                "upstream_error",
                "origin_failed",
                e.clone(),
            ),
            AppError::Internal(e) => {
                tracing::error!("internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}
