//! # Authentication and Authorization
//!
//! HS256 access/refresh tokens and the bearer middleware that turns a valid
//! access token into an [`AuthUser`] request extension. The tenant of every
//! protected request comes from the token, never from the client.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{ApiError, unauthorized};
use crate::models::UserRole;
use crate::models::user::Model as UserModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims carried by both token types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
}

/// Tokens returned by login.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Always `Bearer`
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token encoding failed: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    Invalid,
    #[error("expected a {expected:?} token")]
    WrongType { expected: TokenType },
}

impl From<TokenError> for ApiError {
    fn from(error: TokenError) -> Self {
        match error {
            TokenError::Encoding(source) => anyhow::Error::new(source).into(),
            TokenError::Expired => unauthorized(Some("Token expired")),
            TokenError::Invalid | TokenError::WrongType { .. } => {
                unauthorized(Some("Invalid token"))
            }
        }
    }
}

/// Signs a token of the given type for the user.
pub fn issue_token(
    config: &AppConfig,
    user: &UserModel,
    token_type: TokenType,
) -> Result<String, TokenError> {
    let ttl = match token_type {
        TokenType::Access => config.access_token_ttl_seconds,
        TokenType::Refresh => config.refresh_token_ttl_seconds,
    };
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user.id,
        tenant_id: user.tenant_id,
        email: user.email.clone(),
        role: user.role,
        token_type,
        iat: now,
        exp: now.saturating_add(i64::try_from(ttl).unwrap_or(i64::MAX)),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret_bytes()),
    )
    .map_err(TokenError::Encoding)
}

pub fn issue_token_pair(config: &AppConfig, user: &UserModel) -> Result<TokenPair, TokenError> {
    Ok(TokenPair {
        access_token: issue_token(config, user, TokenType::Access)?,
        refresh_token: issue_token(config, user, TokenType::Refresh)?,
        token_type: "Bearer".to_string(),
        expires_in: config.access_token_ttl_seconds,
    })
}

/// Verifies signature and expiry, and that the token has the expected type.
pub fn verify_token(
    config: &AppConfig,
    token: &str,
    expected: TokenType,
) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.validate_aud = false;
    validation.leeway = 0;

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret_bytes()),
        &validation,
    )
    .map_err(|error| match error.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Invalid,
    })?
    .claims;

    if claims.token_type != expected {
        return Err(TokenError::WrongType { expected });
    }
    Ok(claims)
}

/// The authenticated caller of a protected request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub role: UserRole,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            tenant_id: claims.tenant_id,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// Validates the bearer access token and attaches the [`AuthUser`].
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers())?;
    let claims = verify_token(&config, token, TokenType::Access)?;

    let user = AuthUser::from(claims);
    tracing::debug!(tenant_id = %user.tenant_id, user_id = %user.user_id, "Authenticated request");
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| unauthorized(Some("Missing Authorization header")))?
        .to_str()
        .map_err(|_| unauthorized(Some("Invalid Authorization header")))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| unauthorized(Some("Authorization header must use Bearer scheme")))
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| unauthorized(Some("Authentication required")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        routing::get,
    };
    use tower::ServiceExt;

    fn config() -> Arc<AppConfig> {
        Arc::new(AppConfig {
            jwt_secret: Some("unit-test-secret-with-at-least-32-bytes".to_string()),
            ..Default::default()
        })
    }

    fn user() -> UserModel {
        let now = Utc::now().fixed_offset();
        UserModel {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            email: "admin@example.com".to_string(),
            password_hash: String::new(),
            first_name: "Max".to_string(),
            last_name: "Mustermann".to_string(),
            role: UserRole::Admin,
            is_active: true,
            email_verified_at: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    async fn run_middleware(config: Arc<AppConfig>, request: Request<Body>) -> Response {
        async fn handler(user: AuthUser) -> String {
            user.tenant_id.to_string()
        }

        Router::new()
            .route("/test", get(handler))
            .layer(axum::middleware::from_fn_with_state(
                Arc::clone(&config),
                auth_middleware,
            ))
            .oneshot(request)
            .await
            .unwrap()
    }

    fn request_with(authorization: Option<String>) -> Request<Body> {
        let mut builder = Request::builder().uri("/test");
        if let Some(value) = authorization {
            builder = builder.header("Authorization", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn token_pair_round_trips_claims() {
        let config = config();
        let user = user();
        let pair = issue_token_pair(&config, &user).unwrap();
        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 900);

        let access = verify_token(&config, &pair.access_token, TokenType::Access).unwrap();
        assert_eq!((access.sub, access.tenant_id), (user.id, user.tenant_id));
        assert_eq!(access.exp - access.iat, 900);

        let refresh = verify_token(&config, &pair.refresh_token, TokenType::Refresh).unwrap();
        assert_eq!(refresh.exp - refresh.iat, 604_800);
    }

    #[test]
    fn token_types_are_not_interchangeable() {
        let config = config();
        let pair = issue_token_pair(&config, &user()).unwrap();

        assert!(matches!(
            verify_token(&config, &pair.refresh_token, TokenType::Access),
            Err(TokenError::WrongType { .. })
        ));
        assert!(matches!(
            verify_token(&config, &pair.access_token, TokenType::Refresh),
            Err(TokenError::WrongType { .. })
        ));
    }

    #[test]
    fn foreign_secret_and_expiry_are_rejected() {
        let token = issue_token(&config(), &user(), TokenType::Access).unwrap();
        let other = AppConfig {
            jwt_secret: Some("another-secret-that-is-also-32-bytes-long".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            verify_token(&other, &token, TokenType::Access),
            Err(TokenError::Invalid)
        ));

        let config = config();
        let claims = Claims {
            sub: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            email: "x@example.com".into(),
            role: UserRole::User,
            token_type: TokenType::Access,
            iat: Utc::now().timestamp() - 120,
            exp: Utc::now().timestamp() - 60,
        };
        let expired = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret_bytes()),
        )
        .unwrap();
        assert!(matches!(
            verify_token(&config, &expired, TokenType::Access),
            Err(TokenError::Expired)
        ));
    }

    #[tokio::test]
    async fn missing_auth_header_returns_401() {
        let response = run_middleware(config(), request_with(None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_auth_scheme_returns_401() {
        let response =
            run_middleware(config(), request_with(Some("Basic dGVzdDoxMjM=".into()))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn refresh_token_is_not_accepted_as_bearer() {
        let config = config();
        let pair = issue_token_pair(&config, &user()).unwrap();
        let response = run_middleware(
            Arc::clone(&config),
            request_with(Some(format!("Bearer {}", pair.refresh_token))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn valid_access_token_exposes_tenant() {
        let config = config();
        let user = user();
        let token = issue_token(&config, &user, TokenType::Access).unwrap();

        let response = run_middleware(
            Arc::clone(&config),
            request_with(Some(format!("Bearer {token}"))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body, user.tenant_id.to_string().as_bytes());
    }
}
