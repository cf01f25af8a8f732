//! Background job: remove expired, unconsumed token records.
//!
//! Storage-bounding only. The redeemer re-checks expiry on every consume, so
//! nothing is allowed to depend on this having run — a failed sweep is
//! logged and retried on the next tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time;

use crate::store::TokenStore;

/// Spawn the reaper loop. Call this once at startup.
pub fn spawn(store: Arc<dyn TokenStore>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(interval_secs.max(1)));
        loop {
            interval.tick().await;
            match store.reap_expired(Utc::now().timestamp()).await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "reaped expired tokens"),
                Err(e) => tracing::error!("reap failed: {}", e),
            }
        }
    });
}
