//! Bearer-token verification.
//!
//! This is the only component that understands the token's encoding: a JWT of
//! three dot-separated base64url segments, HS256-signed with the process-wide
//! secret. Two operations:
//!
//! - `extract_subject`: parse structure + claims WITHOUT trusting the
//!   signature, to learn which identity the token claims to be.
//! - `confirm`: full verification (signature, expiry, subject binding)
//!   against the identity that claim resolved to.
//!
//! Both are pure functions of their inputs and the secret; nothing is cached
//! across calls.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, errors::ErrorKind};
use serde::Deserialize;

use crate::repos::identity_repo::Identity;

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// Not a structurally valid token: wrong segment count, undecodable
    /// claims, or an unexpected signature algorithm.
    #[error("malformed token: {0}")]
    Malformed(jsonwebtoken::errors::Error),
    /// Structure is fine but the `sub` claim is missing or empty.
    #[error("token has no usable subject")]
    MissingSubject,
    #[error("signature verification failed")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token subject does not match the resolved identity")]
    SubjectMismatch,
}

/// Claims this service cares about. Tokens may carry more; extra fields are
/// ignored rather than rejected so the issuance side can evolve on its own.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub exp: u64,
    #[serde(default)]
    pub iat: Option<u64>,
}

/// HS256 bearer-token verifier.
///
/// - Key material is intentionally not printable via Debug.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    confirm_validation: Validation,
    peek_validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("TokenVerifier")
            .field("validation", &self.confirm_validation)
            .finish()
    }
}

impl TokenVerifier {
    pub fn new(secret: &[u8], leeway_seconds: u64) -> Self {
        let decoding_key = DecodingKey::from_secret(secret);

        let mut confirm_validation = Validation::new(Algorithm::HS256);
        confirm_validation.leeway = leeway_seconds;
        confirm_validation.set_required_spec_claims(&["sub", "exp"]);

        // Structure/claims peek. The signature is deliberately not checked
        // here, so expiry must not be either; the caller confirms both later.
        let mut peek_validation = Validation::new(Algorithm::HS256);
        peek_validation.insecure_disable_signature_validation();
        peek_validation.validate_exp = false;
        peek_validation.set_required_spec_claims(&["sub"]);

        Self {
            decoding_key,
            confirm_validation,
            peek_validation,
        }
    }

    /// Read the claimed subject out of a token without verifying trust.
    ///
    /// A token that is not syntactically well-formed fails here with a
    /// distinct error; it never silently yields an empty subject.
    pub fn extract_subject(&self, token: &str) -> Result<String, VerifyError> {
        let data =
            jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &self.peek_validation)
                .map_err(VerifyError::Malformed)?;

        let sub = data.claims.sub;
        if sub.trim().is_empty() {
            return Err(VerifyError::MissingSubject);
        }
        Ok(sub)
    }

    /// Confirm a token against the identity its subject resolved to.
    ///
    /// All three conditions must hold: the HS256 signature verifies against
    /// the process secret (the MAC comparison is constant-time inside the
    /// crypto backend), `exp` is still in the future (modulo configured
    /// leeway), and the subject equals the identity's user name.
    pub fn confirm(&self, token: &str, identity: &Identity) -> Result<(), VerifyError> {
        let data = jsonwebtoken::decode::<TokenClaims>(
            token,
            &self.decoding_key,
            &self.confirm_validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => VerifyError::Expired,
            ErrorKind::InvalidSignature => VerifyError::InvalidSignature,
            _ => VerifyError::Malformed(e),
        })?;

        if data.claims.sub != identity.user_name {
            return Err(VerifyError::SubjectMismatch);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use jsonwebtoken::{EncodingKey, Header};
    use serde::Serialize;
    use uuid::Uuid;

    const SECRET: &[u8] = b"unit-test-signing-secret";

    #[derive(Serialize)]
    struct MintClaims<'a> {
        sub: &'a str,
        exp: i64,
        iat: i64,
    }

    fn mint_with(secret: &[u8], sub: &str, ttl_seconds: i64, alg: Algorithm) -> String {
        let now = Utc::now().timestamp();
        let claims = MintClaims {
            sub,
            exp: now + ttl_seconds,
            iat: now,
        };
        jsonwebtoken::encode(&Header::new(alg), &claims, &EncodingKey::from_secret(secret))
            .unwrap()
    }

    fn mint(sub: &str, ttl_seconds: i64) -> String {
        mint_with(SECRET, sub, ttl_seconds, Algorithm::HS256)
    }

    fn identity(user_name: &str) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            user_name: user_name.to_string(),
            created_at: Utc::now(),
        }
    }

    fn verifier() -> TokenVerifier {
        TokenVerifier::new(SECRET, 0)
    }

    #[test]
    fn extracts_the_subject_without_trusting_the_signature() {
        // Signed with a different key: extraction still works (and confirm
        // must not, see below).
        let token = mint_with(b"some-other-secret", "alice", 600, Algorithm::HS256);
        assert_eq!(verifier().extract_subject(&token).unwrap(), "alice");
    }

    #[test]
    fn rejects_garbage_tokens_as_malformed() {
        let v = verifier();
        assert!(matches!(
            v.extract_subject("not-a-jwt"),
            Err(VerifyError::Malformed(_))
        ));
        assert!(matches!(
            v.extract_subject("only.two"),
            Err(VerifyError::Malformed(_))
        ));
        assert!(matches!(v.extract_subject(""), Err(VerifyError::Malformed(_))));
    }

    #[test]
    fn rejects_an_unexpected_signature_algorithm() {
        let token = mint_with(SECRET, "alice", 600, Algorithm::HS384);
        assert!(matches!(
            verifier().extract_subject(&token),
            Err(VerifyError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_an_empty_subject_distinctly() {
        let token = mint("", 600);
        assert!(matches!(
            verifier().extract_subject(&token),
            Err(VerifyError::MissingSubject)
        ));
    }

    #[test]
    fn confirms_a_valid_token() {
        let token = mint("alice", 600);
        assert!(verifier().confirm(&token, &identity("alice")).is_ok());
    }

    #[test]
    fn rejects_an_expired_token() {
        let token = mint("alice", -600);
        assert!(matches!(
            verifier().confirm(&token, &identity("alice")),
            Err(VerifyError::Expired)
        ));
    }

    #[test]
    fn leeway_tolerates_a_just_expired_token() {
        let token = mint("alice", -30);
        let v = TokenVerifier::new(SECRET, 60);
        assert!(v.confirm(&token, &identity("alice")).is_ok());
    }

    #[test]
    fn rejects_a_foreign_signature() {
        let token = mint_with(b"some-other-secret", "alice", 600, Algorithm::HS256);
        assert!(matches!(
            verifier().confirm(&token, &identity("alice")),
            Err(VerifyError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_a_tampered_signature() {
        let mut token = mint("alice", 600);
        token.truncate(token.rfind('.').unwrap() + 1);
        token.push_str("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");
        assert!(matches!(
            verifier().confirm(&token, &identity("alice")),
            Err(VerifyError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_a_subject_identity_mismatch() {
        let token = mint("alice", 600);
        assert!(matches!(
            verifier().confirm(&token, &identity("bob")),
            Err(VerifyError::SubjectMismatch)
        ));
    }

    #[test]
    fn debug_output_does_not_leak_the_secret() {
        let rendered = format!("{:?}", verifier());
        assert!(!rendered.contains("unit-test-signing-secret"));
    }
}
