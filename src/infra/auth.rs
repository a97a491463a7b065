//! Bearer-token authentication.
//!
//! HS256 JWTs carry the user id and role; the same verifier serves the HTTP
//! middleware and the WebSocket handshake. Password digests are sha-256,
//! hex-encoded, compared in constant time.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::domain::types::UserRole;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token is invalid")]
    InvalidToken,
    #[error("token has expired")]
    Expired,
    #[error("failed to issue token: {0}")]
    Issue(String),
}

/// Wire-format claims. `sub` is the user id, `exp`/`iat` are unix seconds.
#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    sub: String,
    role: UserRole,
    exp: i64,
    iat: i64,
}

/// Verified identity attached to authenticated requests and connections.
#[derive(Debug, Clone)]
pub struct AuthClaims {
    pub user_id: Uuid,
    pub role: UserRole,
    pub expires_at: OffsetDateTime,
}

impl AuthClaims {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Issues and verifies bearer tokens against the configured signing secret.
pub struct JwtVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    token_ttl: Duration,
}

impl JwtVerifier {
    pub fn new(signing_secret: &str, token_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(signing_secret.as_bytes()),
            decoding: DecodingKey::from_secret(signing_secret.as_bytes()),
            token_ttl,
        }
    }

    pub fn issue(&self, user_id: Uuid, role: UserRole) -> Result<String, AuthError> {
        let now = OffsetDateTime::now_utc();
        let claims = TokenClaims {
            sub: user_id.to_string(),
            role,
            exp: (now + self.token_ttl).unix_timestamp(),
            iat: now.unix_timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| AuthError::Issue(err.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<AuthClaims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<TokenClaims>(token, &self.decoding, &validation).map_err(|err| {
            match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken,
            }
        })?;

        let user_id = data
            .claims
            .sub
            .parse::<Uuid>()
            .map_err(|_| AuthError::InvalidToken)?;
        let expires_at = OffsetDateTime::from_unix_timestamp(data.claims.exp)
            .map_err(|_| AuthError::InvalidToken)?;

        Ok(AuthClaims {
            user_id,
            role: data.claims.role,
            expires_at,
        })
    }
}

/// Hex-encoded sha-256 digest of a password.
pub fn password_digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Constant-time comparison of a candidate password against a stored digest.
pub fn verify_password(password: &str, stored_digest: &str) -> bool {
    let candidate = password_digest(password);
    candidate.as_bytes().ct_eq(stored_digest.as_bytes()).into()
}

/// Pull the token out of an `Authorization: Bearer …` header value.
pub fn extract_bearer(header: &str) -> Option<&str> {
    let token = header.strip_prefix("Bearer ")?;
    (!token.is_empty()).then_some(token)
}
