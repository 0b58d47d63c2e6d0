/*
 * Responsibility
 * - Read-only identity endpoints behind the gate
 * - First consumers of CurrentPrincipal: this is where "unauthenticated"
 *   actually turns into a 401/403, not in the gate
 */
use axum::{Json, extract::State};

use crate::{
    api::v1::dto::identities::IdentityResponse,
    api::v1::extractors::{Capability, CurrentPrincipal},
    error::AppError,
    repos::identity_repo,
    state::AppState,
};

/// GET /me: echo the caller's stored identity.
pub async fn me(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<IdentityResponse>, AppError> {
    let identity = identity_repo::find_by_username(&state.db, &principal.user_name)
        .await?
        .ok_or(AppError::not_found("identity"))?;

    Ok(Json(IdentityResponse::from(identity)))
}

/// GET /users: list known identities.
pub async fn list_identities(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<Vec<IdentityResponse>>, AppError> {
    if !principal.has_capability(Capability::AuthenticatedUser) {
        return Err(AppError::Forbidden);
    }

    let rows = identity_repo::list(&state.db).await?;
    let res = rows.into_iter().map(IdentityResponse::from).collect();

    Ok(Json(res))
}
