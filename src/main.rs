use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::Method;
use axum::routing::{any, get};
use chrono::Utc;
use clap::Parser;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use onceurl::api;
use onceurl::cli::{Cli, Commands};
use onceurl::config::{self, Config, StoreBackend};
use onceurl::issuer::Issuer;
use onceurl::jobs;
use onceurl::models::token::IssueRequest;
use onceurl::proxy::upstream::{forward_origin, UpstreamClient};
use onceurl::redeemer::Redeemer;
use onceurl::signer::HmacSigner;
use onceurl::store::memory::MemoryStore;
use onceurl::store::postgres::PgStore;
use onceurl::store::redis::RedisStore;
use onceurl::store::TokenStore;
use onceurl::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "onceurl=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = Cli::parse();

    let result = match args.command {
        Some(Commands::Serve { port }) => run_server(cfg, port).await,
        Some(Commands::Issue { resource, lifetime }) => issue_once(cfg, resource, lifetime).await,
        Some(Commands::Reap) => reap_once(cfg).await,
        None => run_server(cfg, None).await,
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn build_store(cfg: &Config) -> anyhow::Result<Arc<dyn TokenStore>> {
    Ok(match cfg.store_backend {
        StoreBackend::Postgres => {
            tracing::info!("connecting to postgres token store...");
            let store = PgStore::connect(&cfg.database_url).await?;
            tracing::info!("running migrations...");
            store.migrate().await?;
            Arc::new(store)
        }
        StoreBackend::Redis => {
            tracing::info!("connecting to redis token store...");
            Arc::new(RedisStore::connect(&cfg.redis_url).await?)
        }
        StoreBackend::Memory => {
            tracing::warn!("memory token store selected: tokens will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    })
}

async fn run_server(cfg: Config, port_override: Option<u16>) -> anyhow::Result<()> {
    let port = port_override.unwrap_or(cfg.port);
    let origin_url = cfg
        .origin_url
        .clone()
        .context("ONCEURL_ORIGIN_URL must be set to serve")?;

    let store = build_store(&cfg).await?;
    let signer = Arc::new(HmacSigner::new(&cfg.domain, &cfg.key_id, &cfg.signing_key)?);

    let state = Arc::new(AppState {
        issuer: Issuer::new(store.clone(), signer),
        redeemer: Redeemer::new(store.clone()),
        upstream: UpstreamClient::new(&origin_url),
        config: cfg.clone(),
    });

    // The issuance API is called from browsers on other origins (the page
    // that hands out links), so it gets a permissive CORS policy.
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    // Everything that is not the management API is content: it passes the
    // redemption gate and, if allowed, is forwarded to the origin.
    let content = axum::Router::new()
        .fallback(any(forward_origin))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            api::redeem_gate,
        ));

    let app = axum::Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(|| async { "ok" }))
        .nest("/api/v1", api::api_router().layer(cors))
        .merge(content)
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn(security_headers_middleware));

    jobs::reaper::spawn(store, cfg.reap_interval_secs);
    tracing::info!(
        "background reaper started (every {}s)",
        cfg.reap_interval_secs
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("onceurl gateway listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn issue_once(cfg: Config, resource: String, lifetime: i64) -> anyhow::Result<()> {
    let store = build_store(&cfg).await?;
    let signer = Arc::new(HmacSigner::new(&cfg.domain, &cfg.key_id, &cfg.signing_key)?);
    let issuer = Issuer::new(store, signer);

    let issued = issuer
        .issue(
            &IssueRequest {
                resource,
                lifetime_secs: lifetime,
            },
            Utc::now().timestamp(),
        )
        .await?;

    println!(
        "URL issued:\n  ID:          {}\n  URL:         {}\n  Valid until: {}",
        issued.id, issued.url, issued.valid_until
    );
    Ok(())
}

async fn reap_once(cfg: Config) -> anyhow::Result<()> {
    let store = build_store(&cfg).await?;
    let removed = store.reap_expired(Utc::now().timestamp()).await?;
    println!("Removed {} expired token(s).", removed);
    Ok(())
}

/// Middleware: injects a unique X-Request-Id into every response so clients
/// can correlate errors with gateway logs.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = axum::http::HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

/// Middleware: security headers. Responses carry capability URLs, so the
/// no-store / no-referrer pair matters — a cached or referred-away signed URL
/// is a leaked token.
async fn security_headers_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    headers.insert("X-Content-Type-Options", "nosniff".parse().unwrap());
    headers.insert("Cache-Control", "no-store".parse().unwrap());
    headers.insert("Referrer-Policy", "no-referrer".parse().unwrap());

    resp
}
