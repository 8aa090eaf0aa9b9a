//! # Invoice Handlers
//!
//! List, detail and lifecycle endpoints for invoices. Totals are always
//! computed server side from the submitted items.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::types::{SuccessResponse, page_window};
use crate::auth::AuthUser;
use crate::error::{ApiError, RepositoryError, validation_error};
use crate::models::InvoiceStatus;
use crate::models::invoice::Model as InvoiceModel;
use crate::query::{Page, parse_datetime};
use crate::repositories::{
    CreateInvoice, InvoiceDetails, InvoiceListFilter, InvoiceRepository, InvoiceWithCustomer,
    UpdateInvoice,
};
use crate::server::AppState;

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListInvoicesQuery {
    pub status: Option<InvoiceStatus>,
    pub customer_id: Option<Uuid>,
    /// Earliest invoice date, RFC 3339 or `YYYY-MM-DD`
    pub from: Option<String>,
    /// Latest invoice date, RFC 3339 or `YYYY-MM-DD`
    pub to: Option<String>,
    /// Case-insensitive match on invoice number or customer name
    pub search: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl ListInvoicesQuery {
    fn criteria(&self) -> Result<InvoiceListFilter, ApiError> {
        Ok(InvoiceListFilter {
            status: self.status,
            customer_id: self.customer_id,
            from: date_param("from", self.from.as_deref())?,
            to: date_param("to", self.to.as_deref())?,
            search: self.search.clone(),
        })
    }
}

fn date_param(
    name: &str,
    raw: Option<&str>,
) -> Result<Option<DateTimeWithTimeZone>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => parse_datetime(value).map(Some).ok_or_else(|| {
            validation_error(
                "Invalid date parameter",
                serde_json::json!({ name: "expected RFC 3339 or YYYY-MM-DD" }),
            )
        }),
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/invoices", get(list_invoices).post(create_invoice))
        .route(
            "/invoices/{id}",
            get(get_invoice).patch(update_invoice).delete(delete_invoice),
        )
        .route("/invoices/{id}/send", post(send_invoice))
        .route("/invoices/{id}/pay", post(pay_invoice))
}

/// Lists invoices, newest first, with their customer's name
#[utoipa::path(
    get,
    path = "/api/v1/invoices",
    security(("bearer_auth" = [])),
    params(ListInvoicesQuery),
    responses(
        (status = 200, description = "Page of invoices"),
        (status = 400, description = "Invalid query parameters", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    tag = "invoices"
)]
pub async fn list_invoices(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListInvoicesQuery>,
) -> Result<Json<Page<InvoiceWithCustomer>>, ApiError> {
    let (page, limit) = page_window(&state.config, query.page, query.limit)?;
    let criteria = query.criteria()?;

    let invoices = InvoiceRepository::new(&state.db, user.tenant_id)
        .list(&criteria, page, limit)
        .await?;
    Ok(Json(invoices))
}

/// Returns an invoice with its customer and items
#[utoipa::path(
    get,
    path = "/api/v1/invoices/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses(
        (status = 200, description = "Invoice with customer and items"),
        (status = 404, description = "Invoice not found", body = ApiError)
    ),
    tag = "invoices"
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<InvoiceDetails>, ApiError> {
    let invoice = InvoiceRepository::new(&state.db, user.tenant_id)
        .find_with_details(id)
        .await?
        .ok_or_else(|| RepositoryError::not_found("Invoice"))?;
    Ok(Json(invoice))
}

#[utoipa::path(
    post,
    path = "/api/v1/invoices",
    security(("bearer_auth" = [])),
    request_body = CreateInvoice,
    responses(
        (status = 201, description = "Invoice created with computed totals"),
        (status = 400, description = "Invalid items", body = ApiError),
        (status = 404, description = "Customer not found", body = ApiError),
        (status = 409, description = "Invoice number already used", body = ApiError)
    ),
    tag = "invoices"
)]
pub async fn create_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreateInvoice>,
) -> Result<(StatusCode, Json<InvoiceDetails>), ApiError> {
    let repo = InvoiceRepository::new(&state.db, user.tenant_id);
    let created = repo.create(input).await?;
    let details = repo
        .find_with_details(created.id)
        .await?
        .ok_or_else(|| RepositoryError::not_found("Invoice"))?;
    Ok((StatusCode::CREATED, Json(details)))
}

/// Updates an invoice; submitted items replace the existing ones
#[utoipa::path(
    patch,
    path = "/api/v1/invoices/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Invoice id")),
    request_body = UpdateInvoice,
    responses(
        (status = 200, description = "Invoice updated"),
        (status = 404, description = "Invoice not found", body = ApiError)
    ),
    tag = "invoices"
)]
pub async fn update_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateInvoice>,
) -> Result<Json<InvoiceDetails>, ApiError> {
    let repo = InvoiceRepository::new(&state.db, user.tenant_id);
    repo.update(id, patch).await?;
    let details = repo
        .find_with_details(id)
        .await?
        .ok_or_else(|| RepositoryError::not_found("Invoice"))?;
    Ok(Json(details))
}

/// Deletes an invoice and its items; paid invoices are kept
#[utoipa::path(
    delete,
    path = "/api/v1/invoices/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses(
        (status = 200, description = "Invoice deleted", body = SuccessResponse),
        (status = 400, description = "Invoice is paid", body = ApiError),
        (status = 404, description = "Invoice not found", body = ApiError)
    ),
    tag = "invoices"
)]
pub async fn delete_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, ApiError> {
    InvoiceRepository::new(&state.db, user.tenant_id)
        .delete(id)
        .await?;
    Ok(Json(SuccessResponse::ok()))
}

/// Marks an invoice as sent
#[utoipa::path(
    post,
    path = "/api/v1/invoices/{id}/send",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses(
        (status = 200, description = "Invoice marked as sent"),
        (status = 400, description = "Invoice is paid or cancelled", body = ApiError),
        (status = 404, description = "Invoice not found", body = ApiError)
    ),
    tag = "invoices"
)]
pub async fn send_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<InvoiceModel>, ApiError> {
    let invoice = InvoiceRepository::new(&state.db, user.tenant_id)
        .mark_sent(id)
        .await?;
    Ok(Json(invoice))
}

/// Marks an invoice as paid
#[utoipa::path(
    post,
    path = "/api/v1/invoices/{id}/pay",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses(
        (status = 200, description = "Invoice marked as paid"),
        (status = 400, description = "Invoice is cancelled", body = ApiError),
        (status = 404, description = "Invoice not found", body = ApiError)
    ),
    tag = "invoices"
)]
pub async fn pay_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<InvoiceModel>, ApiError> {
    let invoice = InvoiceRepository::new(&state.db, user.tenant_id)
        .mark_paid(id)
        .await?;
    Ok(Json(invoice))
}
