//! Test utilities shared by the integration tests.
//!
//! Every test gets its own in-memory SQLite database with all migrations
//! applied and drives the real router through `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use invoicing::{
    config::AppConfig,
    server::{AppState, create_app},
};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "Passw0rd!";

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

pub fn test_config() -> AppConfig {
    AppConfig {
        profile: "test".to_string(),
        jwt_secret: Some("integration-test-secret-of-32-bytes!".to_string()),
        ..AppConfig::default()
    }
}

/// A router over a fresh database, plus the database for direct assertions.
pub struct TestApp {
    pub router: Router,
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let db = setup_test_db().await?;
        let config = Arc::new(test_config());
        let router = create_app(AppState {
            db: db.clone(),
            config: Arc::clone(&config),
        });
        Ok(Self { router, db, config })
    }

    /// Sends a request and returns the status with the parsed JSON body
    /// (`Value::Null` when the body is empty or not JSON).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    /// Registers a company and logs its admin in.
    pub async fn register_and_login(&self, company: &str, email: &str) -> Session {
        let (status, registered) = self
            .request(
                Method::POST,
                "/api/v1/auth/register",
                None,
                Some(json!({
                    "company_name": company,
                    "first_name": "Erika",
                    "last_name": "Musterfrau",
                    "email": email,
                    "password": PASSWORD,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {registered}");

        let (status, login) = self
            .request(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {login}");

        Session {
            tenant_id: parse_uuid(&registered["tenant"]["id"]),
            access_token: login["access_token"].as_str().unwrap().to_string(),
            refresh_token: login["refresh_token"].as_str().unwrap().to_string(),
        }
    }

    /// Creates a customer and returns its id.
    pub async fn create_customer(&self, token: &str, name: &str) -> Uuid {
        let (status, body) = self
            .post("/api/v1/customers", token, json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create customer failed: {body}");
        parse_uuid(&body["id"])
    }

    /// Creates an invoice with one 19% line and returns the response body.
    pub async fn create_invoice(
        &self,
        token: &str,
        customer_id: Uuid,
        number: &str,
        date: &str,
        quantity: u32,
        price: &str,
    ) -> Value {
        let (status, body) = self
            .post(
                "/api/v1/invoices",
                token,
                json!({
                    "customer_id": customer_id,
                    "invoice_number": number,
                    "date": format!("{date}T00:00:00Z"),
                    "due_date": format!("{date}T00:00:00Z"),
                    "items": [{
                        "description": "Arbeitszeit",
                        "quantity": quantity.to_string(),
                        "price": price,
                        "tax_rate": "19",
                        "unit": "Std",
                    }],
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create invoice failed: {body}");
        body
    }
}

/// Tokens and tenant of a logged-in admin.
pub struct Session {
    pub tenant_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
}

pub fn parse_uuid(value: &Value) -> Uuid {
    value.as_str().unwrap().parse().unwrap()
}

/// Parses a decimal serialized as a JSON string or number.
pub fn decimal(value: &Value) -> rust_decimal::Decimal {
    match value {
        Value::String(s) => s.parse().unwrap(),
        other => other.to_string().parse().unwrap(),
    }
}
