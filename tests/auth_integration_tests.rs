//! Integration tests for registration, login and bearer authentication

use axum::http::{Method, StatusCode};
use serde_json::json;

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::{PASSWORD, TestApp};

#[tokio::test]
async fn register_returns_tenant_and_admin_without_secrets() {
    let app = TestApp::new().await.unwrap();

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({
                "company_name": "Elektro Meier",
                "first_name": "Hans",
                "last_name": "Meier",
                "email": "Hans@Elektro-Meier.de",
                "password": PASSWORD,
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["tenant"]["name"], "Elektro Meier");
    assert_eq!(body["tenant"]["plan"], "STARTER");
    assert_eq!(body["user"]["email"], "hans@elektro-meier.de");
    assert_eq!(body["user"]["role"], "ADMIN");
    assert!(body["user"].get("password_hash").is_none());
    assert!(body.get("access_token").is_none());
}

#[tokio::test]
async fn duplicate_email_and_weak_password_are_rejected() {
    let app = TestApp::new().await.unwrap();
    app.register_and_login("Erste GmbH", "chef@example.de").await;

    let register = |email: &str, password: &str| {
        json!({
            "company_name": "Zweite GmbH",
            "first_name": "A",
            "last_name": "B",
            "email": email,
            "password": password,
        })
    };

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(register("CHEF@example.de", PASSWORD)),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(register("neu@example.de", "lowercase1")),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_issues_token_pair_and_rejects_bad_credentials() {
    let app = TestApp::new().await.unwrap();
    app.register_and_login("Login GmbH", "login@example.de").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "login@example.de", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 900);
    assert!(body["refresh_token"].is_string());
    assert_eq!(body["user"]["email"], "login@example.de");

    for (email, password) in [
        ("login@example.de", "Wrong-Passw0rd"),
        ("nobody@example.de", PASSWORD),
    ] {
        let (status, body) = app
            .request(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid credentials");
    }
}

#[tokio::test]
async fn protected_routes_require_an_access_token() {
    let app = TestApp::new().await.unwrap();
    let session = app.register_and_login("Token GmbH", "token@example.de").await;

    let (status, body) = app
        .request(Method::GET, "/api/v1/customers", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = app.get("/api/v1/customers", "not-a-jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/api/v1/customers", &session.refresh_token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.get("/api/v1/customers", &session.access_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn refresh_accepts_only_refresh_tokens() {
    let app = TestApp::new().await.unwrap();
    let session = app.register_and_login("Refresh GmbH", "refresh@example.de").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": session.refresh_token })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let access_token = body["access_token"].as_str().unwrap().to_string();
    let (status, _) = app.get("/api/v1/customers", &access_token).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": session.access_token })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_and_openapi_are_public() {
    let app = TestApp::new().await.unwrap();

    let (status, body) = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "connected");

    let (status, body) = app.request(Method::GET, "/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/v1/invoices"].is_object());
}

#[tokio::test]
async fn logout_is_acknowledged_without_a_session() {
    let app = TestApp::new().await.unwrap();

    let (status, body) = app
        .request(Method::POST, "/api/v1/auth/logout", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logged out successfully");
}
