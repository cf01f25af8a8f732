//! onceurl — single-use signed URL gateway.
//!
//! Issues time-limited, cryptographically signed resource URLs that can be
//! redeemed exactly once. Issuance writes a token record to the store and
//! returns the signed URL; the redemption gate atomically consumes the
//! record, so the first redemption wins and every replay is turned away.
//!
//! Exported as a library so integration tests in `tests/` can drive the
//! router and the core types directly.

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod issuer;
pub mod jobs;
pub mod models;
pub mod proxy;
pub mod redeemer;
pub mod signer;
pub mod store;

use issuer::Issuer;
use proxy::upstream::UpstreamClient;
use redeemer::Redeemer;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub issuer: Issuer,
    pub redeemer: Redeemer,
    pub upstream: UpstreamClient,
    pub config: config::Config,
}
