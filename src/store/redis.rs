//! Redis-backed token store.
//!
//! Single-use semantics ride on two native primitives:
//! - `SET .. NX EX`: insert-if-absent with a TTL, so an id collision is
//!   detected without a read and expired records age out of storage on their
//!   own.
//! - `GETDEL`: fetch and delete in one command, so concurrent consumers of
//!   the same id get exactly one winner.
//!
//! The TTL is belt-and-braces for storage growth only — the redeemer still
//! checks `expires_at` itself, which also covers clock skew between the
//! application and the Redis server.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::models::token::AccessToken;
use crate::store::{Consumed, StoreError, TokenStore};

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    /// Keys are namespaced to avoid collisions on shared Redis instances.
    fn key(id: &str) -> String {
        format!("onceurl:token:{id}")
    }
}

#[async_trait]
impl TokenStore for RedisStore {
    async fn put(&self, token: &AccessToken) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(token)?;

        let ttl = (token.expires_at - chrono::Utc::now().timestamp()).max(1);

        // SET NX EX: one round trip for insert-if-absent plus TTL.
        let set: Option<String> = redis::cmd("SET")
            .arg(Self::key(&token.id))
            .arg(payload)
            .arg("NX")
            .arg("EX")
            .arg(ttl)
            .query_async(&mut conn)
            .await?;

        if set.is_none() {
            return Err(StoreError::DuplicateId(token.id.clone()));
        }
        Ok(())
    }

    async fn consume(&self, id: &str) -> Result<Consumed, StoreError> {
        let mut conn = self.conn.clone();

        let payload: Option<String> = conn.get_del(Self::key(id)).await?;

        Ok(match payload {
            Some(raw) => Consumed::Token(serde_json::from_str(&raw)?),
            None => Consumed::NotFound,
        })
    }

    async fn reap_expired(&self, _now: i64) -> Result<u64, StoreError> {
        // TTLs set at put time already bound storage growth.
        Ok(0)
    }
}
