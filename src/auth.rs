//! Supabase JWT verification for the recalculation endpoints.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, StatusCode},
    Json,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Claims carried by a Supabase access token. Only `sub`, `role` and `exp` are used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub exp: u64,
    #[serde(default)]
    pub iat: u64,
}

/// Caller identity resolved from the bearer token.
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    pub role: String,
}

impl From<SupabaseClaims> for AuthUser {
    fn from(claims: SupabaseClaims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            role: claims.role.unwrap_or_else(|| "authenticated".to_string()),
        }
    }
}

impl AuthUser {
    /// Only service keys and dashboard admins may trigger bulk recalculation.
    pub fn can_recalculate(&self) -> bool {
        matches!(self.role.as_str(), "service_role" | "admin")
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingHeader,
    #[error("Authorization header is not a bearer token")]
    NotBearer,
    #[error("JWT secret is not configured")]
    NoSecret,
    #[error("token rejected: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub message: String,
}

/// Shared secret used to verify Supabase tokens.
#[derive(Clone)]
pub struct JwtSecret(pub String);

impl std::fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JwtSecret(***)")
    }
}

/// Check signature (HS256) and expiry of a Supabase token.
pub fn verify_token(token: &str, secret: &str) -> Result<SupabaseClaims, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::NoSecret);
    }
    let mut validation = Validation::new(Algorithm::HS256);
    // Supabase sets aud="authenticated"; only signature and expiry matter here
    validation.validate_aud = false;

    let data = decode::<SupabaseClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)?;
    Ok(data.claims)
}

pub fn bearer_token(value: &str) -> Option<&str> {
    value.strip_prefix("Bearer ").map(str::trim).filter(|t| !t.is_empty())
}

fn unauthorized(err: AuthError) -> (StatusCode, Json<AuthResponse>) {
    tracing::warn!("⚠️ Auth failed: {}", err);
    let message = match err {
        AuthError::Invalid(_) | AuthError::NoSecret => "Invalid or expired token".to_string(),
        other => other.to_string(),
    };
    (StatusCode::UNAUTHORIZED, Json(AuthResponse { message }))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    JwtSecret: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<AuthResponse>);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let JwtSecret(secret) = JwtSecret::from_ref(state);
        parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::MissingHeader)
            .and_then(|v| bearer_token(v).ok_or(AuthError::NotBearer))
            .and_then(|token| verify_token(token, &secret))
            .map(AuthUser::from)
            .map_err(unauthorized)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    pub(crate) fn token(secret: &str, role: &str, exp_offset: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = SupabaseClaims {
            sub: "user-1".to_string(),
            email: Some("ops@example.com".to_string()),
            role: Some(role.to_string()),
            exp: (now + exp_offset) as u64,
            iat: now as u64,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_verify_token_roundtrip() {
        let claims = verify_token(&token("s3cret", "service_role", 3600), "s3cret").unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.role.as_deref(), Some("service_role"));
    }

    #[test]
    fn test_verify_token_rejects_wrong_secret_and_expired() {
        assert!(matches!(
            verify_token(&token("s3cret", "admin", 3600), "other"),
            Err(AuthError::Invalid(_))
        ));
        assert!(verify_token(&token("s3cret", "admin", -3600), "s3cret").is_err());
        assert!(matches!(
            verify_token(&token("", "admin", 3600), ""),
            Err(AuthError::NoSecret)
        ));
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }

    #[test]
    fn test_recalculate_permission() {
        let user = |role: &str| AuthUser {
            id: "u".to_string(),
            email: None,
            role: role.to_string(),
        };
        assert!(user("service_role").can_recalculate());
        assert!(user("admin").can_recalculate());
        assert!(!user("authenticated").can_recalculate());
    }
}
