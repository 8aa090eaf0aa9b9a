//! # Server Configuration
//!
//! Router assembly, OpenAPI document and the serve loop of the invoicing API.

use std::sync::Arc;

use anyhow::Context;
use axum::{Router, middleware, routing::get};
use sea_orm::DatabaseConnection;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::auth_middleware;
use crate::config::AppConfig;
use crate::handlers;
use crate::telemetry::trace_id_middleware;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let protected = Router::new()
        .merge(handlers::customers::routes())
        .merge(handlers::invoices::routes())
        .merge(handlers::quotes::routes())
        .merge(handlers::products::routes())
        .merge(handlers::projects::routes())
        .merge(handlers::e_rechnung::routes())
        .merge(handlers::query::routes())
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.config),
            auth_middleware,
        ));

    let api = Router::new()
        .merge(handlers::auth::routes())
        .merge(protected);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .nest("/api/v1", api)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(trace_id_middleware))
}

/// Starts the server with the given configuration
pub async fn run_server(config: AppConfig, db: DatabaseConnection) -> anyhow::Result<()> {
    let addr = config
        .bind_addr()
        .with_context(|| format!("Invalid server address: {}", config.api_bind_addr))?;
    let profile = config.profile.clone();

    let state = AppState {
        db,
        config: Arc::new(config),
    };
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::health,
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::refresh,
        crate::handlers::auth::logout,
        crate::handlers::customers::list_customers,
        crate::handlers::customers::get_customer,
        crate::handlers::customers::create_customer,
        crate::handlers::customers::update_customer,
        crate::handlers::customers::delete_customer,
        crate::handlers::customers::list_customer_invoices,
        crate::handlers::invoices::list_invoices,
        crate::handlers::invoices::get_invoice,
        crate::handlers::invoices::create_invoice,
        crate::handlers::invoices::update_invoice,
        crate::handlers::invoices::delete_invoice,
        crate::handlers::invoices::send_invoice,
        crate::handlers::invoices::pay_invoice,
        crate::handlers::quotes::create_quote,
        crate::handlers::quotes::get_quote,
        crate::handlers::quotes::delete_quote,
        crate::handlers::products::create_product,
        crate::handlers::products::list_low_stock,
        crate::handlers::products::get_product,
        crate::handlers::products::delete_product,
        crate::handlers::projects::create_project,
        crate::handlers::projects::get_project,
        crate::handlers::projects::delete_project,
        crate::handlers::e_rechnung::export,
        crate::handlers::e_rechnung::download,
        crate::handlers::e_rechnung::validate,
    ),
    components(
        schemas(
            crate::error::ApiError,
            crate::models::ServiceInfo,
            crate::models::Plan,
            crate::models::UserRole,
            crate::models::InvoiceStatus,
            crate::models::QuoteStatus,
            crate::models::ProjectStatus,
            crate::handlers::HealthResponse,
            crate::handlers::types::CountResponse,
            crate::handlers::types::SuccessResponse,
            crate::handlers::types::UserSummary,
            crate::handlers::auth::RegisterRequest,
            crate::handlers::auth::RegisterResponse,
            crate::handlers::auth::TenantSummary,
            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::LoginResponse,
            crate::handlers::auth::RefreshRequest,
            crate::handlers::auth::RefreshResponse,
            crate::handlers::auth::LogoutResponse,
            crate::handlers::e_rechnung::EInvoiceFormat,
            crate::handlers::e_rechnung::ExportRequest,
            crate::handlers::e_rechnung::ExportResponse,
            crate::handlers::e_rechnung::ValidateRequest,
            crate::services::xrechnung::ValidationReport,
            crate::auth::TokenPair,
            crate::repositories::CreateCustomer,
            crate::repositories::UpdateCustomer,
            crate::repositories::CreateInvoice,
            crate::repositories::UpdateInvoice,
            crate::repositories::InvoiceItemInput,
            crate::repositories::CreateQuote,
            crate::repositories::CreateProduct,
            crate::repositories::CreateProject,
            crate::services::TaxedLine,
            crate::query::AggregateResult,
            crate::query::GroupByRow,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "root", description = "Service information and health"),
        (name = "auth", description = "Registration, login and token refresh"),
        (name = "customers", description = "Customer management"),
        (name = "invoices", description = "Invoices and their lifecycle"),
        (name = "quotes", description = "Quotes"),
        (name = "products", description = "Product catalog and stock"),
        (name = "projects", description = "Projects"),
        (name = "e-rechnung", description = "XRechnung export and validation"),
    ),
    info(
        title = "Invoicing API",
        description = "Multi-tenant invoicing data service",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_protected_paths_with_bearer_scheme() {
        let doc = ApiDoc::openapi();

        assert!(doc.paths.paths.contains_key("/api/v1/invoices/{id}/pay"));
        assert!(doc.paths.paths.contains_key("/api/v1/auth/login"));
        assert!(doc.paths.paths.contains_key("/api/v1/auth/logout"));
        assert!(doc.paths.paths.contains_key("/api/v1/e-rechnung/export"));
        let schemes = &doc.components.as_ref().unwrap().security_schemes;
        assert!(schemes.contains_key("bearer_auth"));
    }

    #[test]
    fn document_dates_are_date_time_strings() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let schemas = &doc["components"]["schemas"];

        for (schema, field) in [
            ("CreateInvoice", "due_date"),
            ("CreateQuote", "valid_until"),
            ("CreateProject", "start_date"),
        ] {
            let property = &schemas[schema]["properties"][field];
            let rendered = property.to_string();
            assert!(rendered.contains("date-time"), "{schema}.{field}: {rendered}");
        }
    }
}
