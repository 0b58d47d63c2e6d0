/*
 * Responsibility
 * - Identity response DTO (this API never writes identities)
 */
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::repos::identity_repo::Identity;

#[derive(Debug, Serialize)]
pub struct IdentityResponse {
    pub id: Uuid,
    pub user_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<Identity> for IdentityResponse {
    fn from(row: Identity) -> Self {
        Self {
            id: row.id,
            user_name: row.user_name,
            created_at: row.created_at,
        }
    }
}
