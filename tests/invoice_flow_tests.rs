//! End-to-end invoice lifecycle through the HTTP API

use axum::http::{Method, StatusCode};
use rust_decimal::Decimal;
use serde_json::json;

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::{TestApp, decimal, parse_uuid};

#[tokio::test]
async fn invoice_lifecycle_from_draft_to_paid() {
    let app = TestApp::new().await.unwrap();
    let session = app.register_and_login("Handwerk GmbH", "chef@handwerk.de").await;
    let token = session.access_token.as_str();
    let customer_id = app.create_customer(token, "Stadt München").await;

    let created = app
        .create_invoice(token, customer_id, "RE-2024-001", "2024-01-15", 20, "85")
        .await;
    assert_eq!(created["status"], "DRAFT");
    assert_eq!(decimal(&created["subtotal"]), Decimal::from(1700));
    assert_eq!(decimal(&created["total"]), Decimal::from(2023));
    assert_eq!(created["customer"]["name"], "Stadt München");
    assert_eq!(created["items"].as_array().unwrap().len(), 1);
    let invoice_id = parse_uuid(&created["id"]);
    let uri = format!("/api/v1/invoices/{invoice_id}");

    let (status, updated) = app
        .request(
            Method::PATCH,
            &uri,
            Some(token),
            Some(json!({
                "items": [
                    { "description": "Arbeitszeit", "quantity": "20", "price": "85", "tax_rate": "19" },
                    { "description": "Kabel", "quantity": "170", "price": "2.50", "tax_rate": "19", "unit": "m" }
                ],
                "notes": "Teilrechnung"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&updated["subtotal"]), Decimal::from(2125));
    assert_eq!(decimal(&updated["total"]), Decimal::new(252875, 2));
    assert_eq!(updated["items"].as_array().unwrap().len(), 2);
    assert_eq!(updated["items"][1]["description"], "Kabel");

    let (status, sent) = app
        .request(Method::POST, &format!("{uri}/send"), Some(token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sent["status"], "SENT");
    assert!(sent["sent_at"].is_string());

    let (status, paid) = app
        .request(Method::POST, &format!("{uri}/pay"), Some(token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["status"], "PAID");

    let (status, body) = app
        .request(Method::POST, &format!("{uri}/send"), Some(token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = app.request(Method::DELETE, &uri, Some(token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Cannot delete paid invoices");

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/api/v1/customers/{customer_id}"),
            Some(token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn draft_invoice_can_be_deleted() {
    let app = TestApp::new().await.unwrap();
    let session = app.register_and_login("Handwerk GmbH", "chef@handwerk.de").await;
    let token = session.access_token.as_str();
    let customer_id = app.create_customer(token, "Siemens AG").await;
    let created = app
        .create_invoice(token, customer_id, "RE-1", "2024-02-01", 1, "450")
        .await;
    let uri = format!("/api/v1/invoices/{}", created["id"].as_str().unwrap());

    let (status, body) = app.request(Method::DELETE, &uri, Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));

    let (status, _) = app.get(&uri, token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invoice_list_filters_searches_and_pages() {
    let app = TestApp::new().await.unwrap();
    let session = app.register_and_login("Handwerk GmbH", "chef@handwerk.de").await;
    let token = session.access_token.as_str();
    let munich = app.create_customer(token, "Stadt München").await;
    let bmw = app.create_customer(token, "BMW Group").await;

    app.create_invoice(token, munich, "RE-001", "2024-01-15", 1, "100").await;
    app.create_invoice(token, munich, "RE-002", "2024-02-15", 1, "100").await;
    app.create_invoice(token, bmw, "RE-003", "2024-03-15", 1, "100").await;

    let (status, page) = app.get("/api/v1/invoices?limit=2", token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 3);
    assert_eq!(page["total_pages"], 2);
    assert_eq!(page["data"][0]["invoice_number"], "RE-003");
    assert_eq!(page["data"][0]["customer"]["name"], "BMW Group");

    let (_, page) = app.get("/api/v1/invoices?search=m%C3%BCnchen", token).await;
    assert_eq!(page["total"], 2);

    let (_, page) = app
        .get("/api/v1/invoices?from=2024-02-01&to=2024-03-01", token)
        .await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["data"][0]["invoice_number"], "RE-002");

    let (status, _) = app.get("/api/v1/invoices?from=yesterday", token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/api/v1/invoices?limit=1000", token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, page) = app
        .get(&format!("/api/v1/customers/{munich}/invoices"), token)
        .await;
    assert_eq!(page["total"], 2);

    let (_, customer) = app.get(&format!("/api/v1/customers/{munich}"), token).await;
    assert_eq!(customer["invoice_count"], 2);
}

#[tokio::test]
async fn quotes_products_and_projects_round_trip() {
    let app = TestApp::new().await.unwrap();
    let session = app.register_and_login("Handwerk GmbH", "chef@handwerk.de").await;
    let token = session.access_token.as_str();
    let customer_id = app.create_customer(token, "BMW Group").await;

    let (status, quote) = app
        .post(
            "/api/v1/quotes",
            token,
            json!({
                "customer_id": customer_id,
                "quote_number": "AN-1",
                "date": "2024-01-01T00:00:00Z",
                "valid_until": "2024-02-01T00:00:00Z",
                "lines": [{ "quantity": "10", "price": "85", "tax_rate": "19" }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{quote}");
    assert_eq!(decimal(&quote["total"]), Decimal::new(101150, 2));

    let (status, product) = app
        .post(
            "/api/v1/products",
            token,
            json!({ "name": "Kabel", "price": "2.50", "unit": "m", "stock": "10", "min_stock": "50" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(decimal(&product["tax_rate"]), Decimal::from(19));
    let (_, low) = app.get("/api/v1/products/low-stock", token).await;
    assert_eq!(low.as_array().unwrap().len(), 1);

    let (status, project) = app
        .post(
            "/api/v1/projects",
            token,
            json!({ "name": "Neubau", "budget": "250000" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(project["status"], "PLANNING");

    for (kind, body) in [("quotes", &quote), ("products", &product), ("projects", &project)] {
        let uri = format!("/api/v1/{kind}/{}", body["id"].as_str().unwrap());
        let (status, _) = app.get(&uri, token).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app.request(Method::DELETE, &uri, Some(token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app.get(&uri, token).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
