/*
 * Responsibility
 * - Shared context attached to the Router (AppState)
 * - Clone-cheap: the pool and the gate are internally reference counted
 */
use std::sync::Arc;

use crate::middleware::auth::AuthGate;

#[derive(Clone, Debug)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub gate: Arc<AuthGate>,
}

impl AppState {
    pub fn new(db: sqlx::PgPool, gate: Arc<AuthGate>) -> Self {
        Self { db, gate }
    }
}
