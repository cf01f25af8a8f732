//! Token redemption.
//!
//! Decides, for an incoming token id, whether the original request may
//! proceed. The store's atomic consume is the only cross-request
//! synchronization point; the redeemer itself is stateless and holds no
//! cached records — the store is re-read on every redemption.

use std::sync::Arc;

use crate::errors::AppError;
use crate::models::token::AccessToken;
use crate::store::{Consumed, TokenStore};

/// Terminal outcomes of a successful consume call. Mutually exclusive and
/// collectively exhaustive; rejections are opaque to the outside (a redirect
/// that does not reveal absent-vs-consumed-vs-expired).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redemption {
    /// Token consumed and still valid — the original request proceeds.
    Allowed(AccessToken),
    /// Token consumed but past its expiry. The record is already removed —
    /// denying access must not leave it redeemable again.
    Expired,
    /// No record: already used, reaped, or never issued.
    NotFound,
}

/// Extract the token id from a raw query string: `&`-separated `key=value`
/// pairs, percent-decoded, first occurrence of `id` wins. Returns `None` for
/// an absent or empty id.
pub fn token_id_from_query(query: &str) -> Option<String> {
    for pair in query.split('&') {
        let mut parts = pair.splitn(2, '=');
        let key = parts.next().unwrap_or("");
        if urlencoding::decode(key).map(|k| k == "id").unwrap_or(false) {
            let value = parts.next().unwrap_or("");
            let decoded = urlencoding::decode(value).ok()?.into_owned();
            if decoded.is_empty() {
                return None;
            }
            return Some(decoded);
        }
    }
    None
}

pub struct Redeemer {
    store: Arc<dyn TokenStore>,
}

impl Redeemer {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Attempt to redeem `token_id` at time `now`.
    ///
    /// No retry is ever attempted on the same request: a consume whose
    /// outcome was lost (timeout after the delete took effect) surfaces as a
    /// store error, and a retry would wrongly observe `NotFound`.
    pub async fn redeem(&self, token_id: &str, now: i64) -> Result<Redemption, AppError> {
        if token_id.is_empty() {
            return Err(AppError::MissingToken);
        }

        match self.store.consume(token_id).await? {
            Consumed::NotFound => {
                tracing::info!(token_id, "redemption rejected: no matching record");
                Ok(Redemption::NotFound)
            }
            Consumed::Token(token) if token.expires_at < now => {
                // The store may hand back records the reaper has not caught
                // up with; expiry is decided here, at redemption time.
                tracing::info!(
                    token_id,
                    expires_at = token.expires_at,
                    now,
                    "redemption rejected: token expired"
                );
                Ok(Redemption::Expired)
            }
            Consumed::Token(token) => {
                tracing::info!(token_id, resource = %token.resource, "token redeemed");
                Ok(Redemption::Allowed(token))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::StoreError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // ── Query extraction ─────────────────────────────────────

    #[test]
    fn extracts_id_from_query() {
        assert_eq!(token_id_from_query("id=abc123"), Some("abc123".into()));
        assert_eq!(
            token_id_from_query("exp=1300&id=abc&sig=ff"),
            Some("abc".into())
        );
    }

    #[test]
    fn first_id_occurrence_wins() {
        assert_eq!(
            token_id_from_query("id=first&id=second"),
            Some("first".into())
        );
    }

    #[test]
    fn percent_decodes_keys_and_values() {
        assert_eq!(token_id_from_query("%69d=a%20b"), Some("a b".into()));
    }

    #[test]
    fn absent_or_empty_id_is_none() {
        assert_eq!(token_id_from_query(""), None);
        assert_eq!(token_id_from_query("file=video.mp4"), None);
        assert_eq!(token_id_from_query("id="), None);
        assert_eq!(token_id_from_query("id"), None);
    }

    // ── State machine ────────────────────────────────────────

    /// Counts store calls, to prove input validation happens before any
    /// store round trip.
    struct CountingStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenStore for CountingStore {
        async fn put(&self, _: &AccessToken) -> Result<(), StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn consume(&self, _: &str) -> Result<Consumed, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Consumed::NotFound)
        }
        async fn reap_expired(&self, _: i64) -> Result<u64, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }
    }

    fn token(id: &str, expires_at: i64) -> AccessToken {
        AccessToken {
            id: id.to_string(),
            resource: "video.mp4".to_string(),
            expires_at,
        }
    }

    #[tokio::test]
    async fn valid_token_is_allowed_once_then_not_found() {
        let store = MemoryStore::new();
        store.put(&token("t1", 1300)).await.unwrap();
        let redeemer = Redeemer::new(Arc::new(store));

        assert_eq!(
            redeemer.redeem("t1", 1100).await.unwrap(),
            Redemption::Allowed(token("t1", 1300))
        );
        assert_eq!(
            redeemer.redeem("t1", 1150).await.unwrap(),
            Redemption::NotFound
        );
    }

    #[tokio::test]
    async fn expired_token_is_rejected_and_consumed() {
        let store = MemoryStore::new();
        store.put(&token("t1", 1010)).await.unwrap();
        let redeemer = Redeemer::new(Arc::new(store.clone()));

        // Found but stale: rejected, and the consume already removed it.
        assert_eq!(
            redeemer.redeem("t1", 1020).await.unwrap(),
            Redemption::Expired
        );
        assert!(store.is_empty());

        // A second attempt is NotFound, not a repeated Expired.
        assert_eq!(
            redeemer.redeem("t1", 1021).await.unwrap(),
            Redemption::NotFound
        );
    }

    #[tokio::test]
    async fn expiry_boundary_is_inclusive_of_expiry_instant() {
        let store = MemoryStore::new();
        store.put(&token("t1", 1300)).await.unwrap();
        let redeemer = Redeemer::new(Arc::new(store));

        // expires_at == now is still valid (rejection is expiry < now).
        assert!(matches!(
            redeemer.redeem("t1", 1300).await.unwrap(),
            Redemption::Allowed(_)
        ));
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let redeemer = Redeemer::new(Arc::new(MemoryStore::new()));
        assert_eq!(
            redeemer.redeem("nope", 1000).await.unwrap(),
            Redemption::NotFound
        );
    }

    #[tokio::test]
    async fn empty_id_is_client_error_with_no_store_call() {
        let store = Arc::new(CountingStore {
            calls: AtomicUsize::new(0),
        });
        let redeemer = Redeemer::new(store.clone());

        let err = redeemer.redeem("", 1000).await.unwrap_err();
        assert!(matches!(err, AppError::MissingToken));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_redemptions_allow_exactly_one() {
        let store = MemoryStore::new();
        store.put(&token("t1", 2000)).await.unwrap();
        let redeemer = Arc::new(Redeemer::new(Arc::new(store)));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let redeemer = redeemer.clone();
            handles.push(tokio::spawn(async move {
                redeemer.redeem("t1", 1000).await.unwrap()
            }));
        }

        let mut allowed = 0;
        let mut not_found = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Redemption::Allowed(_) => allowed += 1,
                Redemption::NotFound => not_found += 1,
                Redemption::Expired => panic!("unexpected expiry"),
            }
        }
        assert_eq!(allowed, 1);
        assert_eq!(not_found, 15);
    }
}
