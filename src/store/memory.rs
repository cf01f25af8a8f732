//! In-memory token store for local development and tests.
//!
//! Atomicity comes from doing the whole consume (lookup + remove) under one
//! mutex guard: `HashMap::remove` is the conditional delete, and concurrent
//! callers serialize on the lock so exactly one of them gets the record.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::models::token::AccessToken;
use crate::store::{Consumed, StoreError, TokenStore};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tokens: Arc<Mutex<HashMap<String, AccessToken>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, AccessToken>> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of live records. Test/debugging helper.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn put(&self, token: &AccessToken) -> Result<(), StoreError> {
        let mut tokens = self.lock();
        if tokens.contains_key(&token.id) {
            return Err(StoreError::DuplicateId(token.id.clone()));
        }
        tokens.insert(token.id.clone(), token.clone());
        Ok(())
    }

    async fn consume(&self, id: &str) -> Result<Consumed, StoreError> {
        match self.lock().remove(id) {
            Some(token) => Ok(Consumed::Token(token)),
            None => Ok(Consumed::NotFound),
        }
    }

    async fn reap_expired(&self, now: i64) -> Result<u64, StoreError> {
        let mut tokens = self.lock();
        let before = tokens.len();
        tokens.retain(|_, t| t.expires_at >= now);
        Ok((before - tokens.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(id: &str, expires_at: i64) -> AccessToken {
        AccessToken {
            id: id.to_string(),
            resource: "video.mp4".to_string(),
            expires_at,
        }
    }

    #[tokio::test]
    async fn put_then_consume_then_not_found() {
        let store = MemoryStore::new();
        store.put(&token("t1", 2000)).await.unwrap();

        let first = store.consume("t1").await.unwrap();
        assert_eq!(first, Consumed::Token(token("t1", 2000)));

        let second = store.consume("t1").await.unwrap();
        assert_eq!(second, Consumed::NotFound);
    }

    #[tokio::test]
    async fn put_rejects_duplicate_id() {
        let store = MemoryStore::new();
        store.put(&token("t1", 2000)).await.unwrap();

        let err = store.put(&token("t1", 3000)).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(id) if id == "t1"));

        // Original record untouched.
        assert_eq!(
            store.consume("t1").await.unwrap(),
            Consumed::Token(token("t1", 2000))
        );
    }

    #[tokio::test]
    async fn concurrent_consume_has_exactly_one_winner() {
        let store = MemoryStore::new();
        store.put(&token("t1", 2000)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(
                async move { store.consume("t1").await.unwrap() },
            ));
        }

        let mut winners = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), Consumed::Token(_)) {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn reap_removes_only_expired_records() {
        let store = MemoryStore::new();
        store.put(&token("old", 900)).await.unwrap();
        store.put(&token("live", 2000)).await.unwrap();

        let removed = store.reap_expired(1000).await.unwrap();
        assert_eq!(removed, 1);

        assert_eq!(store.consume("old").await.unwrap(), Consumed::NotFound);
        assert!(matches!(
            store.consume("live").await.unwrap(),
            Consumed::Token(_)
        ));
    }
}
