/*!
 * # Authentication
 *
 * Requests carry an `Authorization: Bearer <JWT>` header issued by the
 * identity provider. Tokens are HS256 signed, and issuer and audience are
 * checked against configuration. The token subject becomes the owner id that
 * scopes every inventory operation.
 */

use crate::errors::ServiceError;
use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // identity-provider user id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>, // session id
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: String,
    pub email: Option<String>,
    pub session_id: Option<String>,
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
}

impl AuthConfig {
    pub fn new(jwt_secret: String, jwt_audience: String, jwt_issuer: String) -> Self {
        Self {
            jwt_secret,
            jwt_audience,
            jwt_issuer,
        }
    }
}

impl From<&crate::config::AppConfig> for AuthConfig {
    fn from(cfg: &crate::config::AppConfig) -> Self {
        Self::new(
            cfg.jwt_secret.clone(),
            cfg.jwt_audience.clone(),
            cfg.jwt_issuer.clone(),
        )
    }
}

/// Validates bearer tokens
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
    }

    /// Signs a token for `user_id` with this service's issuer and audience.
    /// Used by local tooling and tests; production tokens come from the
    /// identity provider.
    pub fn issue_token(&self, user_id: &str, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            email: None,
            sid: None,
            iat: now,
            exp: now + ttl.as_secs() as i64,
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingAuth => ServiceError::Unauthorized("Authentication required".into()),
            AuthError::InvalidToken => {
                ServiceError::Unauthorized("Invalid authentication token".into())
            }
            AuthError::TokenExpired => ServiceError::Unauthorized("Token has expired".into()),
            AuthError::TokenCreation(msg) | AuthError::InternalError(msg) => {
                ServiceError::InternalError(msg)
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ServiceError::from(self).into_response()
    }
}

/// Authentication middleware that extracts and validates bearer tokens
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return AuthError::InternalError("Authentication service not available".into())
                .into_response();
        }
    };

    match extract_auth_from_headers(request.headers(), &auth_service) {
        Ok(user) => {
            debug!(user_id = %user.user_id, "Request authenticated");
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

fn extract_auth_from_headers(
    headers: &HeaderMap,
    auth_service: &AuthService,
) -> Result<AuthUser, AuthError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingAuth)?;

    let claims = auth_service.validate_token(token)?;
    Ok(AuthUser {
        user_id: claims.sub,
        email: claims.email,
        session_id: claims.sid,
    })
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn service() -> AuthService {
        AuthService::new(AuthConfig::new(
            "unit-test-secret-with-enough-length-for-hs256-signing".into(),
            "pizza-pantry-api".into(),
            "pizza-pantry".into(),
        ))
    }

    #[test]
    fn issued_tokens_validate() {
        let svc = service();
        let token = svc.issue_token("user_a", Duration::from_secs(60)).unwrap();
        let claims = svc.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "user_a");
    }

    #[test]
    fn wrong_audience_is_rejected() {
        let svc = service();
        let token = svc.issue_token("user_a", Duration::from_secs(60)).unwrap();

        let mut other = service();
        other.config.jwt_audience = "someone-else".into();
        assert!(matches!(
            other.validate_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn missing_or_malformed_header_is_unauthenticated() {
        let svc = service();
        let mut headers = HeaderMap::new();
        assert!(matches!(
            extract_auth_from_headers(&headers, &svc),
            Err(AuthError::MissingAuth)
        ));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(
            extract_auth_from_headers(&headers, &svc),
            Err(AuthError::MissingAuth)
        ));

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer not-a-jwt"),
        );
        assert!(matches!(
            extract_auth_from_headers(&headers, &svc),
            Err(AuthError::InvalidToken)
        ));
    }
}
