//! XRechnung export, download and validation through the HTTP API

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::{Value, json};
use tower::ServiceExt;

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::{TestApp, parse_uuid};

fn decode(content: &Value) -> String {
    let bytes = STANDARD.decode(content.as_str().unwrap()).unwrap();
    String::from_utf8(bytes).unwrap()
}

#[tokio::test]
async fn exported_invoice_is_valid_xrechnung() {
    let app = TestApp::new().await.unwrap();
    let session = app.register_and_login("Handwerk GmbH", "chef@handwerk.de").await;
    let token = session.access_token.as_str();
    let customer_id = app.create_customer(token, "Stadt München").await;
    let invoice = app
        .create_invoice(token, customer_id, "RE-2024-007", "2024-03-01", 8, "95")
        .await;
    let invoice_id = parse_uuid(&invoice["id"]);

    let (status, export) = app
        .post(
            "/api/v1/e-rechnung/export",
            token,
            json!({ "invoice_id": invoice_id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{export}");
    assert_eq!(export["success"], true);
    assert_eq!(export["format"], "xrechnung");
    assert_eq!(export["file_name"], "RE-2024-007_xrechnung.xml");
    assert_eq!(export["content_type"], "application/xml");

    let xml = decode(&export["content"]);
    assert!(xml.contains("<cbc:ID>RE-2024-007</cbc:ID>"));
    assert!(xml.contains("<cbc:IssueDate>2024-03-01</cbc:IssueDate>"));
    assert!(xml.contains("<cbc:BuyerReference>K0001</cbc:BuyerReference>"));
    assert!(xml.contains("<cbc:Name>Handwerk GmbH</cbc:Name>"));
    assert!(xml.contains("<cbc:Name>Stadt München</cbc:Name>"));
    assert!(xml.contains(r#"<cbc:PayableAmount currencyID="EUR">904.40</cbc:PayableAmount>"#));

    let (status, report) = app
        .post(
            "/api/v1/e-rechnung/validate",
            token,
            json!({ "format": "xrechnung", "content": export["content"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["valid"], true, "{report}");
    assert!(report["errors"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn requested_leitweg_id_becomes_endpoint_and_buyer_reference() {
    let app = TestApp::new().await.unwrap();
    let session = app.register_and_login("Handwerk GmbH", "chef@handwerk.de").await;
    let token = session.access_token.as_str();
    let customer_id = app.create_customer(token, "Landratsamt").await;
    let invoice = app
        .create_invoice(token, customer_id, "RE-2024-008", "2024-03-02", 1, "100")
        .await;

    let (status, export) = app
        .post(
            "/api/v1/e-rechnung/export",
            token,
            json!({
                "invoice_id": invoice["id"],
                "leitweg_id": "04011000-1234512345-06",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{export}");

    let xml = decode(&export["content"]);
    assert!(xml.contains(
        r#"<cbc:EndpointID schemeID="0204">04011000-1234512345-06</cbc:EndpointID>"#
    ));
    assert!(xml.contains("<cbc:BuyerReference>04011000-1234512345-06</cbc:BuyerReference>"));

    let (_, export) = app
        .post(
            "/api/v1/e-rechnung/export",
            token,
            json!({
                "invoice_id": invoice["id"],
                "leitweg_id": "04011000-1234512345-06",
                "buyer_reference": "Bestellung 4711",
            }),
        )
        .await;
    assert!(decode(&export["content"]).contains("<cbc:BuyerReference>Bestellung 4711</cbc:BuyerReference>"));
}

#[tokio::test]
async fn download_returns_xml_attachment() {
    let app = TestApp::new().await.unwrap();
    let session = app.register_and_login("Handwerk GmbH", "chef@handwerk.de").await;
    let token = session.access_token.as_str();
    let customer_id = app.create_customer(token, "Stadt München").await;
    let invoice = app
        .create_invoice(token, customer_id, "RE-2024-009", "2024-03-03", 2, "50")
        .await;

    let request = Request::builder()
        .method(Method::GET)
        .uri(format!(
            "/api/v1/e-rechnung/download/{}/xrechnung",
            invoice["id"].as_str().unwrap()
        ))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/xml"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"RE-2024-009_xrechnung.xml\""
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let xml = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(xml.starts_with("<?xml"));
    assert!(xml.contains("<cbc:ID>RE-2024-009</cbc:ID>"));
}

#[tokio::test]
async fn other_tenants_invoices_cannot_be_exported() {
    let app = TestApp::new().await.unwrap();
    let owner = app.register_and_login("Handwerk GmbH", "chef@handwerk.de").await;
    let other = app.register_and_login("Bäckerei Huber", "huber@baeckerei.de").await;
    let customer_id = app.create_customer(&owner.access_token, "Stadt München").await;
    let invoice = app
        .create_invoice(&owner.access_token, customer_id, "RE-2024-010", "2024-03-04", 1, "10")
        .await;
    let invoice_id = invoice["id"].as_str().unwrap();

    let (status, body) = app
        .post(
            "/api/v1/e-rechnung/export",
            &other.access_token,
            json!({ "invoice_id": invoice_id }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{body}");

    let (status, _) = app
        .get(
            &format!("/api/v1/e-rechnung/download/{invoice_id}/xrechnung"),
            &other.access_token,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/e-rechnung/export",
            None,
            Some(json!({ "invoice_id": invoice_id })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn validate_reports_missing_elements_and_rejects_bad_encoding() {
    let app = TestApp::new().await.unwrap();
    let session = app.register_and_login("Handwerk GmbH", "chef@handwerk.de").await;
    let token = session.access_token.as_str();

    let (status, body) = app
        .post(
            "/api/v1/e-rechnung/validate",
            token,
            json!({ "content": "not base64!" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid content format");

    let minimal = STANDARD.encode(
        r#"<Invoice xmlns="urn:oasis:names:specification:ubl:schema:xsd:Invoice-2"></Invoice>"#,
    );
    let (status, report) = app
        .post(
            "/api/v1/e-rechnung/validate",
            token,
            json!({ "content": minimal }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["valid"], false);
    let errors: Vec<&str> = report["errors"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(errors.contains(&"Missing required field BuyerReference"), "{errors:?}");
}
