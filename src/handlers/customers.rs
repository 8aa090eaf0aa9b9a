//! # Customer Handlers

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::types::{SuccessResponse, page_window};
use crate::auth::AuthUser;
use crate::error::{ApiError, RepositoryError};
use crate::models::InvoiceStatus;
use crate::models::customer::Model as CustomerModel;
use crate::query::Page;
use crate::repositories::{
    CreateCustomer, CustomerRepository, CustomerWithCounts, InvoiceListFilter, InvoiceRepository,
    InvoiceWithCustomer, UpdateCustomer,
};
use crate::server::AppState;

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListCustomersQuery {
    /// Case-insensitive match on name, email or customer number
    pub search: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CustomerInvoicesQuery {
    pub status: Option<InvoiceStatus>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/customers", get(list_customers).post(create_customer))
        .route(
            "/customers/{id}",
            get(get_customer).patch(update_customer).delete(delete_customer),
        )
        .route("/customers/{id}/invoices", get(list_customer_invoices))
}

/// Lists the tenant's customers ordered by name
#[utoipa::path(
    get,
    path = "/api/v1/customers",
    security(("bearer_auth" = [])),
    params(ListCustomersQuery),
    responses(
        (status = 200, description = "Page of customers"),
        (status = 400, description = "Invalid pagination", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    tag = "customers"
)]
pub async fn list_customers(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListCustomersQuery>,
) -> Result<Json<Page<CustomerModel>>, ApiError> {
    let (page, limit) = page_window(&state.config, query.page, query.limit)?;

    let customers = CustomerRepository::new(&state.db, user.tenant_id)
        .list(query.search.as_deref(), page, limit)
        .await?;
    Ok(Json(customers))
}

/// Returns one customer with its invoice and quote counts
#[utoipa::path(
    get,
    path = "/api/v1/customers/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Customer with document counts"),
        (status = 404, description = "Customer not found", body = ApiError)
    ),
    tag = "customers"
)]
pub async fn get_customer(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<CustomerWithCounts>, ApiError> {
    let customer = CustomerRepository::new(&state.db, user.tenant_id)
        .find_with_counts(id)
        .await?
        .ok_or_else(|| RepositoryError::not_found("Customer"))?;
    Ok(Json(customer))
}

/// Creates a customer, generating the next customer number when omitted
#[utoipa::path(
    post,
    path = "/api/v1/customers",
    security(("bearer_auth" = [])),
    request_body = CreateCustomer,
    responses(
        (status = 201, description = "Customer created"),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 409, description = "Customer number already taken", body = ApiError)
    ),
    tag = "customers"
)]
pub async fn create_customer(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreateCustomer>,
) -> Result<(StatusCode, Json<CustomerModel>), ApiError> {
    let customer = CustomerRepository::new(&state.db, user.tenant_id)
        .create(input)
        .await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/customers/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Customer id")),
    request_body = UpdateCustomer,
    responses(
        (status = 200, description = "Customer updated"),
        (status = 404, description = "Customer not found", body = ApiError)
    ),
    tag = "customers"
)]
pub async fn update_customer(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateCustomer>,
) -> Result<Json<CustomerModel>, ApiError> {
    let customer = CustomerRepository::new(&state.db, user.tenant_id)
        .update(id, patch)
        .await?;
    Ok(Json(customer))
}

/// Deletes a customer that has no invoices or quotes
#[utoipa::path(
    delete,
    path = "/api/v1/customers/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Customer deleted", body = SuccessResponse),
        (status = 400, description = "Customer still has documents", body = ApiError),
        (status = 404, description = "Customer not found", body = ApiError)
    ),
    tag = "customers"
)]
pub async fn delete_customer(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, ApiError> {
    CustomerRepository::new(&state.db, user.tenant_id)
        .delete(id)
        .await?;
    Ok(Json(SuccessResponse::ok()))
}

/// Lists the invoices addressed to one customer, newest first
#[utoipa::path(
    get,
    path = "/api/v1/customers/{id}/invoices",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Customer id"), CustomerInvoicesQuery),
    responses(
        (status = 200, description = "Page of invoices"),
        (status = 404, description = "Customer not found", body = ApiError)
    ),
    tag = "customers"
)]
pub async fn list_customer_invoices(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<CustomerInvoicesQuery>,
) -> Result<Json<Page<InvoiceWithCustomer>>, ApiError> {
    let (page, limit) = page_window(&state.config, query.page, query.limit)?;

    CustomerRepository::new(&state.db, user.tenant_id)
        .find_unique(id)
        .await?
        .ok_or_else(|| RepositoryError::not_found("Customer"))?;

    let invoices = InvoiceRepository::new(&state.db, user.tenant_id)
        .list(
            &InvoiceListFilter {
                status: query.status,
                customer_id: Some(id),
                ..InvoiceListFilter::default()
            },
            page,
            limit,
        )
        .await?;
    Ok(Json(invoices))
}
