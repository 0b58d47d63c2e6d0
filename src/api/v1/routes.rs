/*
 * Responsibility
 * - v1 URL layout
 * - Everything here sits behind the auth gate; each handler decides whether
 *   a Principal is required (via CurrentPrincipal)
 */
use axum::{Router, routing::get};

use crate::state::AppState;

use crate::api::v1::handlers::{
    health::health,
    identities::{list_identities, me},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/me", get(me))
        .route("/users", get(list_identities))
}
