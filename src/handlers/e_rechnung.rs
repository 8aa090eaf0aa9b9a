//! # E-Rechnung Handlers
//!
//! XRechnung export, download and structural validation of electronic
//! invoices. Export payloads carry the XML base64 encoded.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use metrics::counter;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, RepositoryError, validation_error};
use crate::repositories::{InvoiceRepository, TenantRepository};
use crate::server::AppState;
use crate::services::xrechnung::{self, ValidationReport, XRechnungInput};

const XML_CONTENT_TYPE: &str = "application/xml";

/// Electronic invoice format. Only XRechnung (UBL) is produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EInvoiceFormat {
    #[default]
    Xrechnung,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ExportRequest {
    pub invoice_id: Uuid,
    #[serde(default)]
    pub format: EInvoiceFormat,
    /// Routing id of the recipient; defaults to the customer's Leitweg-ID
    pub leitweg_id: Option<String>,
    /// Defaults to the Leitweg-ID, then the customer number
    pub buyer_reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExportResponse {
    pub success: bool,
    pub format: EInvoiceFormat,
    pub file_name: String,
    /// Base64 encoded document
    pub content: String,
    pub content_type: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ValidateRequest {
    #[serde(default)]
    pub format: EInvoiceFormat,
    /// Base64 encoded document
    pub content: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/e-rechnung/export", post(export))
        .route("/e-rechnung/validate", post(validate))
        .route(
            "/e-rechnung/download/{invoice_id}/{format}",
            get(download),
        )
}

/// Renders an invoice of the caller's tenant as XRechnung.
async fn render(
    state: &AppState,
    tenant_id: Uuid,
    invoice_id: Uuid,
    leitweg_id: Option<&str>,
    buyer_reference: Option<&str>,
) -> Result<(String, String), ApiError> {
    let details = InvoiceRepository::new(&state.db, tenant_id)
        .find_with_details(invoice_id)
        .await?
        .ok_or_else(|| RepositoryError::not_found("Invoice"))?;
    let customer = details
        .customer
        .as_ref()
        .ok_or_else(|| RepositoryError::not_found("Customer"))?;
    let seller = TenantRepository::new(&state.db)
        .find_unique(tenant_id)
        .await?
        .ok_or_else(|| RepositoryError::not_found("Tenant"))?;

    let xml = xrechnung::generate(&XRechnungInput {
        invoice: &details.invoice,
        customer,
        items: &details.items,
        seller: &seller,
        leitweg_id,
        buyer_reference,
    })
    .map_err(anyhow::Error::from)?;

    counter!("einvoices_exported_total").increment(1);
    tracing::info!(
        %tenant_id,
        %invoice_id,
        invoice_number = %details.invoice.invoice_number,
        "Rendered XRechnung"
    );
    Ok((details.invoice.invoice_number.clone(), xml))
}

/// Exports an invoice as XRechnung XML
#[utoipa::path(
    post,
    path = "/api/v1/e-rechnung/export",
    security(("bearer_auth" = [])),
    request_body = ExportRequest,
    responses(
        (status = 200, description = "Base64 encoded XRechnung", body = ExportResponse),
        (status = 404, description = "Invoice not found", body = ApiError)
    ),
    tag = "e-rechnung"
)]
pub async fn export(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<ExportRequest>,
) -> Result<Json<ExportResponse>, ApiError> {
    let (invoice_number, xml) = render(
        &state,
        user.tenant_id,
        request.invoice_id,
        request.leitweg_id.as_deref(),
        request.buyer_reference.as_deref(),
    )
    .await?;

    Ok(Json(ExportResponse {
        success: true,
        format: request.format,
        file_name: xrechnung::file_name(&invoice_number),
        content: STANDARD.encode(xml),
        content_type: XML_CONTENT_TYPE.to_string(),
    }))
}

/// Downloads an invoice as an XRechnung XML file
#[utoipa::path(
    get,
    path = "/api/v1/e-rechnung/download/{invoice_id}/{format}",
    security(("bearer_auth" = [])),
    params(
        ("invoice_id" = Uuid, Path, description = "Invoice id"),
        ("format" = EInvoiceFormat, Path, description = "Document format")
    ),
    responses(
        (status = 200, description = "XRechnung XML attachment", body = String, content_type = "application/xml"),
        (status = 404, description = "Invoice not found", body = ApiError)
    ),
    tag = "e-rechnung"
)]
pub async fn download(
    State(state): State<AppState>,
    user: AuthUser,
    Path((invoice_id, _format)): Path<(Uuid, EInvoiceFormat)>,
) -> Result<impl IntoResponse, ApiError> {
    let (invoice_number, xml) = render(&state, user.tenant_id, invoice_id, None, None).await?;

    let headers = [
        (header::CONTENT_TYPE, XML_CONTENT_TYPE.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"{}\"",
                xrechnung::file_name(&invoice_number)
            ),
        ),
    ];
    Ok((headers, xml))
}

/// Checks a base64 encoded XRechnung document for the mandatory elements
#[utoipa::path(
    post,
    path = "/api/v1/e-rechnung/validate",
    security(("bearer_auth" = [])),
    request_body = ValidateRequest,
    responses(
        (status = 200, description = "Validation report", body = ValidationReport),
        (status = 400, description = "Content is not base64 encoded UTF-8", body = ApiError)
    ),
    tag = "e-rechnung"
)]
pub async fn validate(
    _user: AuthUser,
    Json(request): Json<ValidateRequest>,
) -> Result<Json<ValidationReport>, ApiError> {
    let xml = decode_content(&request.content)?;
    let report = xrechnung::validate(&xml);
    tracing::debug!(valid = report.valid, errors = report.errors.len(), "Validated XRechnung");
    Ok(Json(report))
}

fn decode_content(content: &str) -> Result<String, ApiError> {
    let invalid = || {
        validation_error(
            "Invalid content format",
            serde_json::json!({ "content": "expected base64 encoded UTF-8 XML" }),
        )
    };
    let bytes = STANDARD.decode(content.trim()).map_err(|_| invalid())?;
    String::from_utf8(bytes).map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn content_must_be_base64_utf8() {
        assert_eq!(decode_content("PGE+PC9hPg==").unwrap(), "<a></a>");
        assert_eq!(
            decode_content("not base64!").unwrap_err().status,
            StatusCode::BAD_REQUEST
        );
        let latin1 = STANDARD.encode([0xff, 0xfe]);
        assert!(decode_content(&latin1).is_err());
    }

    #[test]
    fn export_request_defaults_to_xrechnung() {
        let request: ExportRequest = serde_json::from_value(serde_json::json!({
            "invoice_id": "6f9619ff-8b86-d011-b42d-00cf4fc964ff"
        }))
        .unwrap();
        assert_eq!(request.format, EInvoiceFormat::Xrechnung);
        assert!(request.leitweg_id.is_none());

        let zugferd = serde_json::from_value::<ExportRequest>(serde_json::json!({
            "invoice_id": "6f9619ff-8b86-d011-b42d-00cf4fc964ff",
            "format": "zugferd"
        }));
        assert!(zugferd.is_err());
    }
}
