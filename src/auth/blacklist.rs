use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::info;

use crate::error::AuthError;

pub(crate) const ALREADY_BLACKLISTED: &str = "token is already blacklisted";

/// Persistent set of revoked tokens, consulted on every protected request.
#[async_trait]
pub trait BlacklistStore: Send + Sync {
    /// Exact-match membership check for a serialized token.
    async fn contains(&self, token: &str) -> anyhow::Result<bool>;

    /// Record a revoked token together with its own expiry claim, kept for
    /// later garbage collection of stale entries. Duplicate insertion
    /// surfaces as `Conflict`; the uniqueness constraint is the sole
    /// serialization point for concurrent logouts.
    async fn add(&self, token: &str, expires_at: OffsetDateTime) -> Result<(), AuthError>;
}

pub struct PgBlacklist {
    pool: PgPool,
}

impl PgBlacklist {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BlacklistStore for PgBlacklist {
    async fn contains(&self, token: &str) -> anyhow::Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM token_blacklist WHERE token = $1")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    async fn add(&self, token: &str, expires_at: OffsetDateTime) -> Result<(), AuthError> {
        sqlx::query(
            r#"
            INSERT INTO token_blacklist (token, expires_at)
            VALUES ($1, $2)
            "#,
        )
        .bind(token)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => {
                AuthError::Conflict(ALREADY_BLACKLISTED.into())
            }
            _ => AuthError::Internal(e.into()),
        })?;
        info!(expires_at = %expires_at, "token blacklisted");
        Ok(())
    }
}

/// In-memory store backing `AppState::fake()` and the unit tests.
#[derive(Default)]
pub struct MemoryBlacklist {
    tokens: Mutex<HashSet<String>>,
}

#[async_trait]
impl BlacklistStore for MemoryBlacklist {
    async fn contains(&self, token: &str) -> anyhow::Result<bool> {
        Ok(self.tokens.lock().expect("blacklist lock").contains(token))
    }

    async fn add(&self, token: &str, _expires_at: OffsetDateTime) -> Result<(), AuthError> {
        let inserted = self
            .tokens
            .lock()
            .expect("blacklist lock")
            .insert(token.to_string());
        if !inserted {
            return Err(AuthError::Conflict(ALREADY_BLACKLISTED.into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn membership_after_insert() {
        let store = MemoryBlacklist::default();
        let expires_at = OffsetDateTime::now_utc();
        assert!(!store.contains("tok").await.unwrap());
        store.add("tok", expires_at).await.unwrap();
        assert!(store.contains("tok").await.unwrap());
        assert!(!store.contains("other").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_insert_is_a_conflict() {
        let store = MemoryBlacklist::default();
        let expires_at = OffsetDateTime::now_utc();
        store.add("tok", expires_at).await.unwrap();
        let err = store.add("tok", expires_at).await.unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));
        assert_eq!(err.to_string(), ALREADY_BLACKLISTED);
    }
}
