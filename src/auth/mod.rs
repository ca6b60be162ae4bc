// src/auth/mod.rs

//! Session tokens (HS256 JWT), password hashing and the request extractor
//! that turns a bearer token into an [`access::Principal`].

use std::sync::OnceLock;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::access::{Principal, Role};
use crate::models::Usuario;
use crate::AppState;

pub const TOKEN_COOKIE: &str = "token";
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// usuario_id
    pub sub: String,
    pub email: String,
    pub rol: Role,
    pub barberia_id: Option<i64>,
    pub barbero_id: Option<i64>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn principal(&self) -> Result<Principal, AuthError> {
        let usuario_id = self
            .sub
            .parse::<i64>()
            .map_err(|_| AuthError::InvalidToken(format!("bad subject '{}'", self.sub)))?;
        Ok(Principal {
            usuario_id,
            rol: self.rol,
            barberia_id: self.barberia_id,
            barbero_id: self.barbero_id,
        })
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("session expired")]
    Expired,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("invalid email or password")]
    BadCredentials,
    #[error("account is disabled")]
    Inactive,
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,
    #[error("token signing failed: {0}")]
    Signing(String),
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl From<AuthError> for (StatusCode, String) {
    fn from(e: AuthError) -> Self {
        let status = match e {
            AuthError::MissingToken
            | AuthError::Expired
            | AuthError::InvalidToken(_)
            | AuthError::BadCredentials => StatusCode::UNAUTHORIZED,
            AuthError::Inactive => StatusCode::FORBIDDEN,
            AuthError::WeakPassword => StatusCode::BAD_REQUEST,
            AuthError::Signing(_) | AuthError::Hashing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, e.to_string())
    }
}

/// Signing and verification keys plus the session lifetime.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn issue(&self, usuario: &Usuario, barbero_id: Option<i64>) -> Result<String, AuthError> {
        let rol = usuario
            .rol
            .parse::<Role>()
            .map_err(AuthError::Signing)?;
        let now = Utc::now();
        let claims = Claims {
            sub: usuario.usuario_id.to_string(),
            email: usuario.email.clone(),
            rol,
            barberia_id: usuario.barberia_id,
            barbero_id,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(e.to_string()),
            })
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }
}

/// `Authorization: Bearer <jwt>` first, then the `token` cookie.
pub fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    if let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ").map(str::trim) {
            if !token.is_empty() {
                return Some(token);
            }
        }
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == TOKEN_COOKIE && !value.is_empty())
        .map(|(_, value)| value)
}

/// Authenticated requester. Use `Option<AuthUser>` where login is optional.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers).ok_or(AuthError::MissingToken)?;
        let claims = state.jwt.verify(token).map_err(|e| {
            tracing::debug!(error = %e, "rejected session token");
            e
        })?;
        Ok(AuthUser(claims.principal()?))
    }
}

pub async fn hash_password(password: String) -> Result<String, AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword);
    }
    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Malformed hashes count as a mismatch.
pub async fn verify_password(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .unwrap_or(false)
}

static DUMMY_HASH: OnceLock<String> = OnceLock::new();

/// Runs a full bcrypt verification against a throwaway hash, so a login for an
/// unknown email takes as long as one with a wrong password.
pub async fn verify_unknown_user(password: String) {
    let _ = tokio::task::spawn_blocking(move || {
        let hash = DUMMY_HASH
            .get_or_init(|| bcrypt::hash("no-such-account", bcrypt::DEFAULT_COST).unwrap_or_default());
        bcrypt::verify(password, hash).unwrap_or(false)
    })
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "test-secret-test-secret-test-secret!";

    fn usuario(rol: &str, barberia_id: Option<i64>) -> Usuario {
        Usuario {
            usuario_id: 17,
            email: "admin@fade.test".into(),
            nombre: "Admin".into(),
            password_hash: String::new(),
            rol: rol.into(),
            barberia_id,
            activo: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn issued_token_verifies_into_principal() {
        let keys = JwtKeys::new(SECRET, 1);
        let token = keys.issue(&usuario("ADMIN_BARBERIA", Some(3)), None).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.rol, Role::AdminBarberia);
        assert_eq!(claims.exp - claims.iat, 3600);

        let p = claims.principal().unwrap();
        assert_eq!(p.usuario_id, 17);
        assert_eq!(p.barberia_id, Some(3));
        assert_eq!(p.barbero_id, None);
    }

    #[test]
    fn other_secret_is_rejected() {
        let token = JwtKeys::new(SECRET, 1).issue(&usuario("CLIENTE", None), None).unwrap();
        let other = JwtKeys::new("another-secret-another-secret-another", 1);
        assert!(matches!(other.verify(&token), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let keys = JwtKeys::new(SECRET, 1);
        let past = Utc::now().timestamp() - 7200;
        let claims = Claims {
            sub: "1".into(),
            email: "x@y.z".into(),
            rol: Role::Cliente,
            barberia_id: None,
            barbero_id: None,
            iat: past - 3600,
            exp: past,
        };
        let token = keys.sign(&claims).unwrap();
        assert!(matches!(keys.verify(&token), Err(AuthError::Expired)));
    }

    #[test]
    fn garbage_is_invalid() {
        let keys = JwtKeys::new(SECRET, 1);
        assert!(matches!(keys.verify("not-a-jwt"), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn unknown_role_cannot_be_signed() {
        let keys = JwtKeys::new(SECRET, 1);
        assert!(matches!(keys.issue(&usuario("OWNER", None), None), Err(AuthError::Signing(_))));
    }

    #[test]
    fn token_is_read_from_bearer_then_cookie() {
        let mut headers = HeaderMap::new();
        assert_eq!(token_from_headers(&headers), None);

        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; token=abc.def"));
        assert_eq!(token_from_headers(&headers), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(token_from_headers(&headers), Some("xyz"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        assert_eq!(token_from_headers(&headers), Some("abc.def"));
    }

    #[test]
    fn auth_errors_map_to_statuses() {
        let (s, _) = <(StatusCode, String)>::from(AuthError::MissingToken);
        assert_eq!(s, StatusCode::UNAUTHORIZED);
        let (s, _) = <(StatusCode, String)>::from(AuthError::Inactive);
        assert_eq!(s, StatusCode::FORBIDDEN);
        let (s, _) = <(StatusCode, String)>::from(AuthError::WeakPassword);
        assert_eq!(s, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn password_hash_round_trip() {
        let hash = hash_password("navaja-y-tijera".into()).await.unwrap();
        assert!(verify_password("navaja-y-tijera".into(), hash.clone()).await);
        assert!(!verify_password("otra-clave-123".into(), hash).await);
        assert!(!verify_password("x".into(), "not-a-bcrypt-hash".into()).await);
    }

    #[tokio::test]
    async fn unknown_users_still_pay_for_a_bcrypt_check() {
        verify_unknown_user("cualquier-cosa".into()).await;
        let hash = DUMMY_HASH.get().expect("dummy hash is built on first use");
        assert!(hash.starts_with("$2"));
        assert!(!verify_password("cualquier-cosa".into(), hash.clone()).await);
    }

    #[tokio::test]
    async fn short_passwords_are_refused() {
        assert!(matches!(hash_password("corta".into()).await, Err(AuthError::WeakPassword)));
    }
}
