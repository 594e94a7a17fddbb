use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AuthError;
use crate::timeutil;

/// User credential record. Immutable after creation; the public id is
/// generated once and never reused.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub public_id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub admin: bool,
    pub registered_at: OffsetDateTime,
}

/// Lookup and creation of user credential records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Exact-match lookup used by login.
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    /// Exact-match lookup used by token validation.
    async fn find_by_public_id(&self, public_id: Uuid) -> anyhow::Result<Option<User>>;

    /// Persist a new user with a fresh random public id. A concurrent
    /// registration with the same email loses on the unique constraint and
    /// surfaces as `Conflict`.
    async fn create(
        &self,
        email: &str,
        password_hash: &str,
        admin: bool,
    ) -> Result<User, AuthError>;
}

pub struct PgUsers {
    pool: PgPool,
}

impl PgUsers {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUsers {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, public_id, email, password_hash, admin, registered_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_public_id(&self, public_id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, public_id, email, password_hash, admin, registered_at
            FROM users
            WHERE public_id = $1
            "#,
        )
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create(
        &self,
        email: &str,
        password_hash: &str,
        admin: bool,
    ) -> Result<User, AuthError> {
        let public_id = Uuid::new_v4();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (public_id, email, password_hash, admin)
            VALUES ($1, $2, $3, $4)
            RETURNING id, public_id, email, password_hash, admin, registered_at
            "#,
        )
        .bind(public_id)
        .bind(email)
        .bind(password_hash)
        .bind(admin)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => {
                AuthError::Conflict(format!("{email} is already registered"))
            }
            _ => AuthError::Internal(e.into()),
        })?;
        Ok(user)
    }
}

/// In-memory store backing `AppState::fake()` and the unit tests. Enforces
/// the same email uniqueness rule as the database constraint.
#[derive(Default)]
pub struct MemoryUsers {
    users: Mutex<Vec<User>>,
}

#[async_trait]
impl UserStore for MemoryUsers {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .expect("users lock")
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_public_id(&self, public_id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .expect("users lock")
            .iter()
            .find(|u| u.public_id == public_id)
            .cloned())
    }

    async fn create(
        &self,
        email: &str,
        password_hash: &str,
        admin: bool,
    ) -> Result<User, AuthError> {
        let mut users = self.users.lock().expect("users lock");
        if users.iter().any(|u| u.email == email) {
            return Err(AuthError::Conflict(format!("{email} is already registered")));
        }
        let user = User {
            id: Uuid::new_v4(),
            public_id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            admin,
            registered_at: timeutil::utc_now(),
        };
        users.push(user.clone());
        Ok(user)
    }
}
