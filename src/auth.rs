//! Request authentication.
//!
//! Three schemes: `Authorization: Bearer <jwt>` for browser clients, a static
//! `x-api-key` for service-to-service `/internal/*` routes and
//! `Authorization: Internal <token>` for the status callback.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct AuthKeys {
    pub jwt_secret: String,
    pub internal_api_key: String,
    pub internal_token: String,
}

/// Router state that carries the authentication keys.
pub trait AuthState {
    fn auth_keys(&self) -> &AuthKeys;
}

impl<T: AuthState> AuthState for Arc<T> {
    fn auth_keys(&self) -> &AuthKeys {
        self.as_ref().auth_keys()
    }
}

impl AuthState for AuthKeys {
    fn auth_keys(&self) -> &AuthKeys {
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id at the identity provider
    #[serde(default)]
    pub email: Option<String>,
    pub exp: usize,
}

/// Authenticated end user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
    pub email: Option<String>,
}

/// Marker for requests carrying the internal API key.
#[derive(Debug, Clone, Copy)]
pub struct InternalApiKey;

/// Marker for requests carrying the internal token.
#[derive(Debug, Clone, Copy)]
pub struct InternalToken;

pub fn verify_token(token: &str, secret: &str) -> Result<AuthUser, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

    if data.claims.sub.trim().is_empty() {
        return Err(AppError::Unauthorized("Token has no subject".to_string()));
    }

    Ok(AuthUser {
        user_id: data.claims.sub,
        email: data.claims.email,
    })
}

/// Value of `Authorization` after `scheme`, compared case-insensitively.
fn authorization_value<'a>(headers: &'a HeaderMap, scheme: &str) -> Option<&'a str> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let (found, rest) = value.split_once(' ')?;
    if found.eq_ignore_ascii_case(scheme) {
        Some(rest.trim()).filter(|v| !v.is_empty())
    } else {
        None
    }
}

/// Constant-time comparison for shared secrets.
fn secrets_match(provided: &str, expected: &str) -> bool {
    provided.len() == expected.len()
        && provided
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: AuthState + Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = authorization_value(&parts.headers, "Bearer")
            .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;
        verify_token(token, &state.auth_keys().jwt_secret)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for InternalApiKey
where
    S: AuthState + Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing x-api-key header".to_string()))?;

        if !secrets_match(provided, &state.auth_keys().internal_api_key) {
            return Err(AppError::Unauthorized("Invalid API key".to_string()));
        }
        Ok(InternalApiKey)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for InternalToken
where
    S: AuthState + Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let provided = authorization_value(&parts.headers, "Internal")
            .ok_or_else(|| AppError::Unauthorized("Missing internal token".to_string()))?;

        if !secrets_match(provided, &state.auth_keys().internal_token) {
            return Err(AppError::Unauthorized("Invalid internal token".to_string()));
        }
        Ok(InternalToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn create_token(
        user_id: &str,
        email: Option<&str>,
        secret: &str,
        ttl: chrono::Duration,
    ) -> Result<String, AppError> {
        let exp = (chrono::Utc::now() + ttl).timestamp().max(0) as usize;
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.map(str::to_string),
            exp,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| AppError::InternalError(format!("Failed to sign token: {}", e)))
    }

    fn keys() -> AuthKeys {
        AuthKeys {
            jwt_secret: "test-secret".to_string(),
            internal_api_key: "key-123".to_string(),
            internal_token: "tok-456".to_string(),
        }
    }

    fn parts(header: &str, value: &str) -> Parts {
        let (parts, _) = Request::builder()
            .header(header, value)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[tokio::test]
    async fn test_bearer_token_round_trip() {
        let token =
            create_token("user-1", Some("a@b.c"), "test-secret", chrono::Duration::hours(1))
                .unwrap();
        let mut parts = parts("authorization", &format!("Bearer {}", token));

        let user = AuthUser::from_request_parts(&mut parts, &keys()).await.unwrap();
        assert_eq!(user.user_id, "user-1");
        assert_eq!(user.email.as_deref(), Some("a@b.c"));
    }

    #[tokio::test]
    async fn test_token_signed_with_other_secret_is_rejected() {
        let token = create_token("user-1", None, "other", chrono::Duration::hours(1)).unwrap();
        let mut parts = parts("authorization", &format!("Bearer {}", token));

        let err = AuthUser::from_request_parts(&mut parts, &keys())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let token =
            create_token("user-1", None, "test-secret", chrono::Duration::hours(-2)).unwrap();
        assert!(verify_token(&token, "test-secret").is_err());
    }

    #[tokio::test]
    async fn test_internal_api_key() {
        let mut ok = parts("x-api-key", "key-123");
        assert!(InternalApiKey::from_request_parts(&mut ok, &keys()).await.is_ok());

        let mut bad = parts("x-api-key", "key-124");
        assert!(InternalApiKey::from_request_parts(&mut bad, &keys()).await.is_err());
    }

    #[tokio::test]
    async fn test_internal_token_scheme() {
        let mut ok = parts("authorization", "Internal tok-456");
        assert!(InternalToken::from_request_parts(&mut ok, &keys()).await.is_ok());

        let mut bearer = parts("authorization", "Bearer tok-456");
        assert!(InternalToken::from_request_parts(&mut bearer, &keys()).await.is_err());
    }
}
