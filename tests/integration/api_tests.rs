//! API integration tests, run against a live server and database

use biblio_server::models::{enums::Role, user::UserClaims};
use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";
const JWT_SECRET: &str = "change-this-secret-in-production";

/// Sign a token the way the external login service would
fn token(role: Role) -> String {
    let now = Utc::now().timestamp();
    UserClaims {
        sub: "integration".to_string(),
        user_id: 1,
        role,
        exp: now + 3600,
        iat: now,
    }
    .create_token(JWT_SECRET)
    .expect("Failed to sign token")
}

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

async fn create_book(client: &Client, admin: &str, total_copies: i32) -> Value {
    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(admin)
        .json(&json!({
            "title": unique("Integration book"),
            "total_copies": total_copies
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    response.json().await.expect("Failed to parse response")
}

async fn create_reader(client: &Client, admin: &str, loan_limit: i32) -> Value {
    let response = client
        .post(format!("{}/readers", BASE_URL))
        .bearer_auth(admin)
        .json(&json!({
            "firstname": "Ana",
            "lastname": "Ruiz",
            "document_id": unique("DOC"),
            "loan_limit": loan_limit
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    response.json().await.expect("Failed to parse response")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_requires_token() {
    let client = Client::new();

    let response = client
        .get(format!("{}/loans", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 401);

    let response = client
        .get(format!("{}/loans", BASE_URL))
        .bearer_auth("not-a-token")
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_staff_cannot_edit_catalog() {
    let client = Client::new();

    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(token(Role::Staff))
        .json(&json!({ "title": "Forbidden", "total_copies": 1 }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 403);
}

#[tokio::test]
#[ignore]
async fn test_issue_and_return_loan() {
    let client = Client::new();
    let admin = token(Role::Admin);
    let staff = token(Role::Staff);

    let book = create_book(&client, &admin, 1).await;
    let reader = create_reader(&client, &admin, 3).await;

    let response = client
        .post(format!("{}/loans", BASE_URL))
        .bearer_auth(&staff)
        .json(&json!({ "reader_id": reader["id"], "book_id": book["id"] }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    let loan: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(loan["status"], "active");

    // last copy is gone
    let other = create_reader(&client, &admin, 3).await;
    let response = client
        .post(format!("{}/loans", BASE_URL))
        .bearer_auth(&staff)
        .json(&json!({ "reader_id": other["id"], "book_id": book["id"] }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 422);

    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan["id"]))
        .bearer_auth(&staff)
        .json(&json!({ "notes": "ok" }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let outcome: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(outcome["loan"]["status"], "returned");
    assert_eq!(outcome["return"]["overdue_days"], 0);

    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan["id"]))
        .bearer_auth(&staff)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);

    let response = client
        .get(format!("{}/books/{}", BASE_URL, book["id"]))
        .bearer_auth(&staff)
        .send()
        .await
        .expect("Failed to send request");
    let book: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(book["available_copies"], 1);
}

#[tokio::test]
#[ignore]
async fn test_reader_with_open_loan_is_kept() {
    let client = Client::new();
    let admin = token(Role::Admin);

    let book = create_book(&client, &admin, 1).await;
    let reader = create_reader(&client, &admin, 3).await;

    let response = client
        .post(format!("{}/loans", BASE_URL))
        .bearer_auth(&admin)
        .json(&json!({ "reader_id": reader["id"], "book_id": book["id"] }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    let loan: Value = response.json().await.expect("Failed to parse response");

    let response = client
        .delete(format!("{}/readers/{}", BASE_URL, reader["id"]))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 422);

    // the loan and the copy it holds are untouched
    let response = client
        .get(format!("{}/loans/{}", BASE_URL, loan["id"]))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan["id"]))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let response = client
        .delete(format!("{}/readers/{}", BASE_URL, reader["id"]))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 204);

    let response = client
        .get(format!("{}/books/{}", BASE_URL, book["id"]))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to send request");
    let book: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(book["available_copies"], 1);
}

#[tokio::test]
#[ignore]
async fn test_compute_fine_rejects_overflow() {
    let client = Client::new();

    let response = client
        .get(format!(
            "{}/fines/compute?overdue_days=9223372036854775807&daily_rate=100000000000",
            BASE_URL
        ))
        .bearer_auth(token(Role::Staff))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore]
async fn test_compute_fine() {
    let client = Client::new();

    let response = client
        .get(format!("{}/fines/compute?overdue_days=5&daily_rate=0.25", BASE_URL))
        .bearer_auth(token(Role::Staff))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["fine"], "1.25");
}
