//! Bearer authentication gate.
//!
//! Decides, once per request, whether the caller presents a valid token and
//! installs a [`Principal`] into request extensions when it does. The gate
//! never rejects a request itself: paths under a public prefix are skipped
//! entirely, and every validation failure just leaves the request
//! unauthenticated. Whether that is acceptable is decided downstream (the
//! `CurrentPrincipal` extractor answers 401 for protected handlers).
//!
//! Failure kinds (malformed token, unknown subject, bad signature, expiry,
//! subject mismatch) are indistinguishable to the caller; they only surface
//! as distinct `tracing` events. The raw token is never logged.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::{self, Next},
    response::Response,
};

use crate::api::v1::extractors::Principal;
use crate::repos::identity_repo::IdentityLookup;
use crate::services::token_verifier::TokenVerifier;
use crate::state::AppState;

/// Apply the gate to every route of the given router.
///
/// Example:
/// ```ignore
/// let app = build_router(state.clone());
/// let app = middleware::auth::gate::apply(app, state);
/// ```
pub fn apply(router: Router, state: AppState) -> Router {
    // axum 0.8: from_fn cannot take a State extractor, so pass state explicitly.
    router.layer(middleware::from_fn_with_state(state, gate_middleware))
}

async fn gate_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let existing = req.extensions().get::<Principal>().cloned();
    let updated = state
        .gate
        .evaluate(req.uri().path(), authorization, existing)
        .await;

    // middleware -> extractor hand-off. Single insert; on repeat evaluations
    // of the same request this re-installs the established principal as-is.
    if let Some(principal) = updated {
        req.extensions_mut().insert(principal);
    }

    next.run(req).await
}

/// The per-request authentication decision pipeline, kept free of HTTP
/// plumbing so tests can drive the contract directly.
pub struct AuthGate {
    public_prefixes: Vec<String>,
    verifier: TokenVerifier,
    identities: Arc<dyn IdentityLookup>,
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("public_prefixes", &self.public_prefixes)
            .field("verifier", &self.verifier)
            .finish()
    }
}

impl AuthGate {
    pub fn new(
        public_prefixes: Vec<String>,
        verifier: TokenVerifier,
        identities: Arc<dyn IdentityLookup>,
    ) -> Self {
        Self {
            public_prefixes,
            verifier,
            identities,
        }
    }

    /// Evaluate one request and return its updated authentication context.
    ///
    /// `existing` comes back untouched on the public-prefix bypass, on
    /// absent/non-Bearer credentials, when a principal is already
    /// established, and on every validation failure. The identity lookup is
    /// the only await point.
    pub async fn evaluate(
        &self,
        path: &str,
        authorization: Option<&str>,
        existing: Option<Principal>,
    ) -> Option<Principal> {
        // Public prefixes short-circuit everything, token inspection included.
        if self.is_public(path) {
            return existing;
        }

        let Some(authorization) = authorization else {
            return existing;
        };
        let Some(token) = authorization.strip_prefix("Bearer ") else {
            // Some other scheme (Basic, DPoP, ...): not ours to judge.
            return existing;
        };

        // An established principal wins; never re-validate within a request.
        if existing.is_some() {
            return existing;
        }

        let subject = match self.verifier.extract_subject(token) {
            Ok(subject) => subject,
            Err(err) => {
                tracing::debug!(error = %err, "could not read a subject out of the bearer token");
                return None;
            }
        };

        let identity = match self.identities.find_by_username(&subject).await {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                tracing::debug!(subject = %subject, "bearer token names an unknown subject");
                return None;
            }
            Err(err) => {
                tracing::warn!(error = %err, "identity lookup failed during authentication");
                return None;
            }
        };

        if let Err(err) = self.verifier.confirm(token, &identity) {
            tracing::debug!(error = %err, "bearer token failed confirmation");
            return None;
        }

        Some(Principal::authenticated_user(identity.user_name))
    }

    fn is_public(&self, path: &str) -> bool {
        self.public_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use jsonwebtoken::{Algorithm, EncodingKey, Header};
    use serde::Serialize;
    use uuid::Uuid;

    use crate::api::v1::extractors::Capability;
    use crate::repos::error::RepoError;
    use crate::repos::identity_repo::Identity;

    const SECRET: &[u8] = b"gate-test-signing-secret";

    #[derive(Serialize)]
    struct MintClaims<'a> {
        sub: &'a str,
        exp: i64,
    }

    fn mint(sub: &str, ttl_seconds: i64) -> String {
        let claims = MintClaims {
            sub,
            exp: Utc::now().timestamp() + ttl_seconds,
        };
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {token}")
    }

    fn test_identity(user_name: &str) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            user_name: user_name.to_string(),
            created_at: Utc::now(),
        }
    }

    /// In-memory store; counts lookups so tests can assert that the bypass
    /// and idempotence rules really short-circuit.
    struct StaticIdentities {
        known: Vec<&'static str>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl StaticIdentities {
        fn with(known: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                known,
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                known: Vec::new(),
                fail: true,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IdentityLookup for StaticIdentities {
        async fn find_by_username(&self, user_name: &str) -> Result<Option<Identity>, RepoError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RepoError::Db(sqlx::Error::PoolClosed));
            }
            Ok(self
                .known
                .iter()
                .find(|name| **name == user_name)
                .map(|name| test_identity(name)))
        }
    }

    /// A store that answers with a different identity than was asked for,
    /// to force the subject-binding check to do its job.
    struct MisroutedIdentities;

    #[async_trait]
    impl IdentityLookup for MisroutedIdentities {
        async fn find_by_username(&self, _user_name: &str) -> Result<Option<Identity>, RepoError> {
            Ok(Some(test_identity("bob")))
        }
    }

    fn gate(identities: Arc<dyn IdentityLookup>) -> AuthGate {
        AuthGate::new(
            vec![
                "/auth".to_string(),
                "/v3/api-docs".to_string(),
                "/swagger-ui".to_string(),
            ],
            TokenVerifier::new(SECRET, 0),
            identities,
        )
    }

    #[tokio::test]
    async fn public_prefix_bypasses_even_a_valid_token() {
        let identities = StaticIdentities::with(vec!["alice"]);
        let g = gate(identities.clone());

        let header = bearer(&mint("alice", 600));
        let out = g.evaluate("/auth/login", Some(&header), None).await;

        assert!(out.is_none());
        assert_eq!(identities.calls(), 0);
    }

    #[tokio::test]
    async fn absent_header_leaves_the_context_unchanged() {
        let identities = StaticIdentities::with(vec!["alice"]);
        let g = gate(identities.clone());

        assert!(g.evaluate("/orders/42", None, None).await.is_none());
        assert_eq!(identities.calls(), 0);
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_ignored() {
        let identities = StaticIdentities::with(vec!["alice"]);
        let g = gate(identities.clone());

        let out = g
            .evaluate("/orders/42", Some("Basic YWxpY2U6cHc="), None)
            .await;

        assert!(out.is_none());
        assert_eq!(identities.calls(), 0);
    }

    #[tokio::test]
    async fn valid_token_installs_a_principal() {
        let identities = StaticIdentities::with(vec!["alice"]);
        let g = gate(identities.clone());

        let header = bearer(&mint("alice", 600));
        let principal = g
            .evaluate("/orders/42", Some(&header), None)
            .await
            .expect("principal installed");

        assert_eq!(principal.user_name, "alice");
        assert!(principal.has_capability(Capability::AuthenticatedUser));
        assert_eq!(identities.calls(), 1);
    }

    #[tokio::test]
    async fn established_principal_is_not_revalidated() {
        let identities = StaticIdentities::with(vec!["alice"]);
        let g = gate(identities.clone());

        let header = bearer(&mint("alice", 600));
        let first = g
            .evaluate("/orders/42", Some(&header), None)
            .await
            .expect("principal installed");
        let second = g
            .evaluate("/orders/42", Some(&header), Some(first.clone()))
            .await
            .expect("principal kept");

        assert_eq!(first, second);
        assert_eq!(identities.calls(), 1);
    }

    #[tokio::test]
    async fn malformed_token_aborts_before_any_lookup() {
        let identities = StaticIdentities::with(vec!["alice"]);
        let g = gate(identities.clone());

        let out = g
            .evaluate("/orders/42", Some("Bearer not-a-jwt"), None)
            .await;

        assert!(out.is_none());
        assert_eq!(identities.calls(), 0);
    }

    #[tokio::test]
    async fn unknown_subject_stays_unauthenticated() {
        let identities = StaticIdentities::with(Vec::new());
        let g = gate(identities.clone());

        let header = bearer(&mint("alice", 600));
        let out = g.evaluate("/orders/42", Some(&header), None).await;

        assert!(out.is_none());
        assert_eq!(identities.calls(), 1);
    }

    #[tokio::test]
    async fn expired_token_stays_unauthenticated() {
        let identities = StaticIdentities::with(vec!["alice"]);
        let g = gate(identities.clone());

        let header = bearer(&mint("alice", -600));
        assert!(g.evaluate("/orders/42", Some(&header), None).await.is_none());
    }

    #[tokio::test]
    async fn failing_identity_store_stays_unauthenticated() {
        let identities = StaticIdentities::failing();
        let g = gate(identities.clone());

        let header = bearer(&mint("alice", 600));
        assert!(g.evaluate("/orders/42", Some(&header), None).await.is_none());
        assert_eq!(identities.calls(), 1);
    }

    #[tokio::test]
    async fn subject_identity_mismatch_stays_unauthenticated() {
        let g = gate(Arc::new(MisroutedIdentities));

        let header = bearer(&mint("alice", 600));
        assert!(g.evaluate("/orders/42", Some(&header), None).await.is_none());
    }
}
