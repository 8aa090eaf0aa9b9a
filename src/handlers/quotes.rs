//! # Quote Handlers

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use super::types::SuccessResponse;
use crate::auth::AuthUser;
use crate::error::{ApiError, RepositoryError};
use crate::models::quote::Model as QuoteModel;
use crate::repositories::{CreateQuote, QuoteRepository};
use crate::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/quotes", post(create_quote))
        .route("/quotes/{id}", get(get_quote).delete(delete_quote))
}

/// Creates a quote; totals are computed from the submitted lines
#[utoipa::path(
    post,
    path = "/api/v1/quotes",
    security(("bearer_auth" = [])),
    request_body = CreateQuote,
    responses(
        (status = 201, description = "Quote created"),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "Customer not found", body = ApiError),
        (status = 409, description = "Quote number already used", body = ApiError)
    ),
    tag = "quotes"
)]
pub async fn create_quote(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreateQuote>,
) -> Result<(StatusCode, Json<QuoteModel>), ApiError> {
    let quote = QuoteRepository::new(&state.db, user.tenant_id)
        .create(input)
        .await?;
    Ok((StatusCode::CREATED, Json(quote)))
}

#[utoipa::path(
    get,
    path = "/api/v1/quotes/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Quote id")),
    responses(
        (status = 200, description = "Quote"),
        (status = 404, description = "Quote not found", body = ApiError)
    ),
    tag = "quotes"
)]
pub async fn get_quote(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<QuoteModel>, ApiError> {
    let quote = QuoteRepository::new(&state.db, user.tenant_id)
        .find_unique(id)
        .await?
        .ok_or_else(|| RepositoryError::not_found("Quote"))?;
    Ok(Json(quote))
}

#[utoipa::path(
    delete,
    path = "/api/v1/quotes/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Quote id")),
    responses(
        (status = 200, description = "Quote deleted", body = SuccessResponse),
        (status = 404, description = "Quote not found", body = ApiError)
    ),
    tag = "quotes"
)]
pub async fn delete_quote(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, ApiError> {
    QuoteRepository::new(&state.db, user.tenant_id)
        .delete(id)
        .await?;
    Ok(Json(SuccessResponse::ok()))
}
