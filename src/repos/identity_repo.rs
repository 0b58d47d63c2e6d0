/*
 * Responsibility
 * - Read access to the users table (identities are minted and managed by the
 *   issuance side; this crate only ever looks them up)
 * - IdentityLookup seam so the auth gate can run against test doubles
 */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::repos::error::RepoError;

/// A stored identity, keyed by its unique user name.
#[derive(Debug, Clone, FromRow)]
pub struct Identity {
    #[sqlx(rename = "userId")]
    pub id: Uuid,
    #[sqlx(rename = "userName")]
    pub user_name: String,
    #[sqlx(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Resolve a token's claimed subject to a stored identity.
///
/// The gate needs exactly this one operation; keeping it behind a trait lets
/// tests substitute an in-memory store for the Postgres-backed one.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    async fn find_by_username(&self, user_name: &str) -> Result<Option<Identity>, RepoError>;
}

pub async fn find_by_username(
    db: &PgPool,
    user_name: &str,
) -> Result<Option<Identity>, RepoError> {
    let row = sqlx::query_as::<_, Identity>(
        r#"
        SELECT "userId", "userName", "createdAt"
        FROM users
        WHERE "userName" = $1
        "#,
    )
    .bind(user_name)
    .fetch_optional(db)
    .await?;

    Ok(row)
}

pub async fn list(db: &PgPool) -> Result<Vec<Identity>, RepoError> {
    let rows = sqlx::query_as::<_, Identity>(
        r#"
        SELECT "userId", "userName", "createdAt"
        FROM users
        ORDER BY "createdAt" DESC
        "#,
    )
    .fetch_all(db)
    .await?;

    Ok(rows)
}

/// Postgres-backed lookup used by the running service.
#[derive(Debug, Clone)]
pub struct PgIdentityLookup {
    db: PgPool,
}

impl PgIdentityLookup {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl IdentityLookup for PgIdentityLookup {
    async fn find_by_username(&self, user_name: &str) -> Result<Option<Identity>, RepoError> {
        find_by_username(&self.db, user_name).await
    }
}
