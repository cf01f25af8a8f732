//! Token storage backends.
//!
//! The store is the consistency anchor of the whole system: issuer and
//! redeemer hold no cached copies, every redemption goes back to the store,
//! and all mutual exclusion lives inside [`TokenStore::consume`].

pub mod memory;
pub mod postgres;
pub mod redis;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::token::AccessToken;

/// Outcome of an atomic consume attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consumed {
    /// This caller won: the record existed and has been removed.
    Token(AccessToken),
    /// No record for that id — already used, reaped, or never issued.
    NotFound,
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// `put` found the id already present. Ids are generated with enough
    /// entropy that this is unreachable in practice; it is surfaced as a
    /// fatal issuance error rather than a silent overwrite.
    #[error("token id already present: {0}")]
    DuplicateId(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable key-value storage over token records.
///
/// `consume` is the load-bearing contract: it must be a single conditional
/// delete-returning-prior-value against the backend, never a read followed by
/// a delete. Under concurrent invocation with the same id, exactly one caller
/// receives [`Consumed::Token`] and every other caller receives
/// [`Consumed::NotFound`] — a loser never observes "found but being deleted".
///
/// There are no automatic retries on `consume`: a retry after a
/// successful-but-unacknowledged delete would observe its own deletion and
/// misreport a valid consumption as a failure. A consume whose outcome is
/// unknown (timeout) surfaces as [`StoreError`], never as `NotFound`.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Insert a new record. The id must not already be present.
    async fn put(&self, token: &AccessToken) -> Result<(), StoreError>;

    /// Atomically remove the record for `id`, returning it if it existed.
    ///
    /// The store may legitimately return an already-expired record here —
    /// reaping is best-effort, and the redeemer makes the final expiry
    /// decision.
    async fn consume(&self, id: &str) -> Result<Consumed, StoreError>;

    /// Delete expired, unconsumed records. Bounds storage growth only; the
    /// redeemer's own expiry check never depends on this having run. Returns
    /// the number of records removed.
    async fn reap_expired(&self, now: i64) -> Result<u64, StoreError>;
}
