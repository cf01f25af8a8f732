//! Content origin forwarding.
//!
//! Requests that clear the redemption gate are forwarded to the configured
//! origin and the response streamed back. The gate has already consumed the
//! token by the time this runs; an origin failure here is a 502, not a
//! reason to re-admit the token.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header;
use axum::response::Response;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};

use crate::errors::AppError;
use crate::AppState;

pub struct UpstreamClient {
    client: ClientWithMiddleware,
    origin_url: String,
}

impl UpstreamClient {
    pub fn new(origin_url: &str) -> Self {
        let reqwest_client = reqwest::Client::builder()
            .use_rustls_tls()
            .pool_max_idle_per_host(32)
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("failed to build HTTP client");

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = ClientBuilder::new(reqwest_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Self {
            client,
            origin_url: origin_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn fetch(&self, path_and_query: &str) -> Result<reqwest::Response, AppError> {
        let url = format!("{}/{}", self.origin_url, path_and_query.trim_start_matches('/'));
        self.client.get(&url).send().await.map_err(|e| {
            tracing::warn!("origin request failed after retries: {}", e);
            AppError::Upstream(e.to_string())
        })
    }
}

/// Content fallback handler: fetch the requested path from the origin and
/// stream the body back.
pub async fn forward_origin(
    State(state): State<Arc<AppState>>,
    req: Request,
) -> Result<Response, AppError> {
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let origin_resp = state.upstream.fetch(path_and_query).await?;

    let mut builder = Response::builder().status(origin_resp.status());
    for name in [header::CONTENT_TYPE, header::CONTENT_LENGTH] {
        if let Some(value) = origin_resp.headers().get(&name) {
            builder = builder.header(name, value.clone());
        }
    }

    builder
        .body(Body::from_stream(origin_resp.bytes_stream()))
        .map_err(|e| AppError::Internal(e.into()))
}
