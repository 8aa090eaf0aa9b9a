//! # Authentication Handlers
//!
//! Registration, login and access-token refresh. These are the only
//! `/api/v1` routes that do not require a bearer token.

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use metrics::counter;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::types::UserSummary;
use crate::auth::{self, TokenPair, TokenType};
use crate::error::{ApiError, unauthorized};
use crate::models::Plan;
use crate::repositories::{RegisterTenant, TenantRepository, UserRepository, user};
use crate::server::AppState;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub company_name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// At least 8 characters with upper case, lower case and a digit
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TenantSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub plan: Plan,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub message: String,
    pub tenant: TenantSummary,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub user: UserSummary,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
    pub expires_in: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LogoutResponse {
    pub message: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

/// Registers a tenant together with its first admin user
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Tenant and admin user created", body = RegisterResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 409, description = "Email already registered", body = ApiError)
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let (tenant, admin) = TenantRepository::new(&state.db)
        .register(RegisterTenant {
            company_name: request.company_name,
            first_name: request.first_name,
            last_name: request.last_name,
            email: request.email,
            password: request.password,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registration successful".to_string(),
            tenant: TenantSummary {
                id: tenant.id,
                name: tenant.name,
                email: tenant.email,
                plan: tenant.plan,
            },
            user: UserSummary::from(&admin),
        }),
    ))
}

/// Exchanges email and password for an access/refresh token pair
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ApiError)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Some(user) = user::verify_credentials(&state.db, &request.email, &request.password).await?
    else {
        counter!("login_failures_total").increment(1);
        return Err(unauthorized(Some("Invalid credentials")));
    };

    let user = UserRepository::new(&state.db, user.tenant_id)
        .touch_last_login(user.id)
        .await?;
    let tokens = auth::issue_token_pair(&state.config, &user)?;

    counter!("logins_total").increment(1);
    tracing::info!(user_id = %user.id, tenant_id = %user.tenant_id, "User logged in");

    Ok(Json(LoginResponse {
        user: UserSummary::from(&user),
        tokens,
    }))
}

/// Issues a new access token for a valid refresh token
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = RefreshResponse),
        (status = 401, description = "Invalid refresh token or inactive user", body = ApiError)
    ),
    tag = "auth"
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let claims = auth::verify_token(&state.config, &request.refresh_token, TokenType::Refresh)
        .map_err(|_| unauthorized(Some("Invalid refresh token")))?;

    let user = UserRepository::new(&state.db, claims.tenant_id)
        .find_unique(claims.sub)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| unauthorized(Some("User not found or inactive")))?;
    let tenant_active = TenantRepository::new(&state.db)
        .find_unique(user.tenant_id)
        .await?
        .is_some_and(|tenant| tenant.is_active);
    if !tenant_active {
        return Err(unauthorized(Some("User not found or inactive")));
    }

    Ok(Json(RefreshResponse {
        access_token: auth::issue_token(&state.config, &user, TokenType::Access)?,
        expires_in: state.config.access_token_ttl_seconds,
    }))
}

/// Ends a session. Tokens are stateless, so the client discards them and
/// they lapse at their expiry.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses(
        (status = 200, description = "Logged out", body = LogoutResponse)
    ),
    tag = "auth"
)]
pub async fn logout() -> Json<LogoutResponse> {
    counter!("logouts_total").increment(1);
    Json(LogoutResponse {
        message: "Logged out successfully".to_string(),
    })
}
