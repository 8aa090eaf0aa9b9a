//! # Product Handlers

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
use crate::models::product::Model as ProductModel;
use crate::repositories::{CreateProduct, ProductRepository};
use crate::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", post(create_product))
        .route("/products/low-stock", get(list_low_stock))
        .route("/products/{id}", get(get_product).delete(delete_product))
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    security(("bearer_auth" = [])),
    request_body = CreateProduct,
    responses(
        (status = 201, description = "Product created"),
        (status = 400, description = "Validation error", body = ApiError)
    ),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreateProduct>,
) -> Result<(StatusCode, Json<ProductModel>), ApiError> {
    let product = ProductRepository::new(&state.db, user.tenant_id)
        .create(input)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// Active products whose stock is at or below their minimum
#[utoipa::path(
    get,
    path = "/api/v1/products/low-stock",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Products to reorder, by name")
    ),
    tag = "products"
)]
pub async fn list_low_stock(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<ProductModel>>, ApiError> {
    let products = ProductRepository::new(&state.db, user.tenant_id)
        .find_low_stock()
        .await?;
    Ok(Json(products))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product"),
        (status = 404, description = "Product not found", body = ApiError)
    ),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductModel>, ApiError> {
    let product = ProductRepository::new(&state.db, user.tenant_id)
        .find_unique(id)
        .await?
        .ok_or_else(|| RepositoryError::not_found("Product"))?;
    Ok(Json(product))
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product deleted", body = SuccessResponse),
        (status = 404, description = "Product not found", body = ApiError)
    ),
    tag = "products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, ApiError> {
    ProductRepository::new(&state.db, user.tenant_id)
        .delete(id)
        .await?;
    Ok(Json(SuccessResponse::ok()))
}
