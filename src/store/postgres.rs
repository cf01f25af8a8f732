//! Postgres-backed token store.
//!
//! `consume` is a single `DELETE .. RETURNING` statement, so the
//! check-and-remove happens inside one atomic operation on the database.
//! Decomposing it into a SELECT followed by a DELETE would let two concurrent
//! redemptions both observe the row before either deletes it.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::token::AccessToken;
use crate::store::{Consumed, StoreError, TokenStore};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    resource: String,
    expires_at: i64,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn put(&self, token: &AccessToken) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO tokens (id, resource, expires_at) VALUES ($1, $2, $3)")
            .bind(&token.id)
            .bind(&token.resource)
            .bind(token.expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    StoreError::DuplicateId(token.id.clone())
                }
                other => StoreError::Database(other),
            })?;
        Ok(())
    }

    async fn consume(&self, id: &str) -> Result<Consumed, StoreError> {
        let row = sqlx::query_as::<_, TokenRow>(
            "DELETE FROM tokens WHERE id = $1 RETURNING resource, expires_at",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(r) => Consumed::Token(AccessToken {
                id: id.to_string(),
                resource: r.resource,
                expires_at: r.expires_at,
            }),
            None => Consumed::NotFound,
        })
    }

    async fn reap_expired(&self, now: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM tokens WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::token::new_token_id;

    async fn connect() -> PgStore {
        let url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/onceurl".into());
        let store = PgStore::connect(&url).await.expect("connect postgres");
        store.migrate().await.expect("run migrations");
        store
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL at DATABASE_URL
    async fn pg_lifecycle_single_use() {
        let store = connect().await;
        let token = AccessToken {
            id: new_token_id(),
            resource: "video.mp4".into(),
            expires_at: 4_102_444_800, // far future
        };

        store.put(&token).await.unwrap();
        assert_eq!(
            store.consume(&token.id).await.unwrap(),
            Consumed::Token(token.clone())
        );
        assert_eq!(store.consume(&token.id).await.unwrap(), Consumed::NotFound);
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL at DATABASE_URL
    async fn pg_put_rejects_duplicate() {
        let store = connect().await;
        let token = AccessToken {
            id: new_token_id(),
            resource: "a".into(),
            expires_at: 4_102_444_800,
        };

        store.put(&token).await.unwrap();
        let err = store.put(&token).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(_)));

        store.consume(&token.id).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL at DATABASE_URL
    async fn pg_concurrent_consume_single_winner() {
        let store = connect().await;
        let token = AccessToken {
            id: new_token_id(),
            resource: "video.mp4".into(),
            expires_at: 4_102_444_800,
        };
        store.put(&token).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = store.clone();
            let id = token.id.clone();
            handles.push(tokio::spawn(async move { store.consume(&id).await.unwrap() }));
        }

        let mut winners = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), Consumed::Token(_)) {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
