//! Notification inbox over HTTP.
//!
//! Requires a running server with migrations applied.

#![allow(clippy::unwrap_used)]

use chrono::{Duration, Utc};
use harvest_market_integration_tests::TestClient;
use reqwest::StatusCode;
use serde_json::{Value, json};

/// A seller whose vehicle has just been requested, so their inbox holds one
/// unread "New booking request".
async fn owner_with_request() -> TestClient {
    let owner = TestClient::new();
    owner.register("seller").await;
    let vehicle: Value = owner
        .post(
            "/api/vehicles",
            &json!({ "name": "Flatbed trailer", "kind": "trailer", "price_per_day": "8.00" }),
        )
        .await
        .json()
        .await
        .unwrap();

    let renter = TestClient::new();
    renter.register("buyer").await;
    let start = Utc::now().date_naive() + Duration::days(4);
    let resp = renter
        .post(
            "/api/bookings",
            &json!({
                "vehicle_id": vehicle["id"],
                "start_date": start.to_string(),
                "end_date": start.to_string(),
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    owner
}

async fn inbox(client: &TestClient) -> Vec<Value> {
    let page: Value = client
        .get("/api/notifications")
        .await
        .json()
        .await
        .unwrap();
    page["items"].as_array().unwrap().clone()
}

async fn unread(client: &TestClient) -> i64 {
    let count: Value = client
        .get("/api/notifications/unread-count")
        .await
        .json()
        .await
        .unwrap();
    count["unread"].as_i64().unwrap()
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_mark_read_and_delete() {
    let owner = owner_with_request().await;
    let items = inbox(&owner).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "New booking request");
    assert!(items[0]["read_at"].is_null());
    assert_eq!(unread(&owner).await, 1);

    let id = &items[0]["id"];
    let resp = owner.patch(&format!("/api/notifications/{id}/read"), &json!({})).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let notification: Value = resp.json().await.unwrap();
    assert!(!notification["read_at"].is_null());
    assert_eq!(unread(&owner).await, 0);

    let resp = owner.delete(&format!("/api/notifications/{id}")).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(inbox(&owner).await.is_empty());

    let resp = owner.delete(&format!("/api/notifications/{id}")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_read_all_marks_every_unread() {
    let owner = owner_with_request().await;
    assert_eq!(unread(&owner).await, 1);

    let resp = owner.post_empty("/api/notifications/read-all").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let marked: Value = resp.json().await.unwrap();
    assert_eq!(marked["updated"], 1);
    assert_eq!(unread(&owner).await, 0);

    // Nothing left to mark
    let marked: Value = owner
        .post_empty("/api/notifications/read-all")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(marked["updated"], 0);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_other_users_notification_is_not_found() {
    let owner = owner_with_request().await;
    let id = inbox(&owner).await[0]["id"].clone();

    let stranger = TestClient::new();
    stranger.register("buyer").await;

    let resp = stranger
        .patch(&format!("/api/notifications/{id}/read"), &json!({}))
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = stranger.delete(&format!("/api/notifications/{id}")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // Untouched for its owner
    assert_eq!(unread(&owner).await, 1);
    assert_eq!(inbox(&owner).await.len(), 1);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_inbox_requires_login() {
    let anonymous = TestClient::new();
    let resp = anonymous.get("/api/notifications").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
