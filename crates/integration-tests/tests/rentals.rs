//! Vehicle listings and the booking workflow over HTTP.
//!
//! Requires a running server with migrations applied.

#![allow(clippy::unwrap_used)]

use chrono::{Duration, Utc};
use harvest_market_integration_tests::{TestClient, decimal};
use reqwest::StatusCode;
use serde_json::{Value, json};

async fn create_vehicle(owner: &TestClient) -> Value {
    let resp = owner
        .post(
            "/api/vehicles",
            &json!({
                "name": "Massey Ferguson 240",
                "kind": "Tractor",
                "price_per_day": "20.00",
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.unwrap()
}

fn days_from_now(days: i64) -> String {
    (Utc::now().date_naive() + Duration::days(days)).to_string()
}

async fn book(renter: &TestClient, vehicle_id: &Value, start: i64, end: i64) -> reqwest::Response {
    renter
        .post(
            "/api/bookings",
            &json!({
                "vehicle_id": vehicle_id,
                "start_date": days_from_now(start),
                "end_date": days_from_now(end),
            }),
        )
        .await
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_vehicle_kind_is_lowercased_and_listed() {
    let owner = TestClient::new();
    owner.register("seller").await;
    let vehicle = create_vehicle(&owner).await;
    assert_eq!(vehicle["kind"], "tractor");
    assert_eq!(vehicle["status"], "available");

    let client = TestClient::new();
    let resp = client
        .get(&format!("/api/vehicles/{}", vehicle["id"]))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_owner_cannot_set_booked() {
    let owner = TestClient::new();
    owner.register("seller").await;
    let vehicle = create_vehicle(&owner).await;

    let resp = owner
        .put(
            &format!("/api/vehicles/{}", vehicle["id"]),
            &json!({
                "name": "Massey Ferguson 240",
                "kind": "tractor",
                "price_per_day": "20.00",
                "status": "booked",
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_booking_confirm_flow() {
    let owner = TestClient::new();
    owner.register("seller").await;
    let vehicle = create_vehicle(&owner).await;

    let renter = TestClient::new();
    renter.register("buyer").await;

    // Three inclusive days at 20.00
    let resp = book(&renter, &vehicle["id"], 10, 12).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let booking: Value = resp.json().await.unwrap();
    assert_eq!(booking["status"], "pending");
    assert!((decimal(&booking["total_price"]) - 60.0).abs() < f64::EPSILON);

    let status_path = format!("/api/bookings/{}/status", booking["id"]);

    // The renter cannot confirm their own request
    let resp = renter.patch(&status_path, &json!({ "status": "confirmed" })).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = owner.patch(&status_path, &json!({ "status": "confirmed" })).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let booking: Value = resp.json().await.unwrap();
    assert_eq!(booking["status"], "confirmed");

    let vehicle: Value = owner
        .get(&format!("/api/vehicles/{}", vehicle["id"]))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(vehicle["status"], "booked");

    // Overlapping request conflicts with the confirmed booking
    let other = TestClient::new();
    other.register("buyer").await;
    let resp = book(&other, &vehicle["id"], 11, 14).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    // The renter hears about the confirmation
    let resp = renter.get("/api/notifications/unread-count").await;
    let count: Value = resp.json().await.unwrap();
    assert!(count["unread"].as_i64().unwrap() >= 1);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_booking_date_rules() {
    let owner = TestClient::new();
    owner.register("seller").await;
    let vehicle = create_vehicle(&owner).await;

    let resp = book(&owner, &vehicle["id"], 1, 2).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let renter = TestClient::new();
    renter.register("buyer").await;

    let resp = book(&renter, &vehicle["id"], -3, -1).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = book(&renter, &vehicle["id"], 5, 4).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_renter_cancels_pending_booking() {
    let owner = TestClient::new();
    owner.register("seller").await;
    let vehicle = create_vehicle(&owner).await;

    let renter = TestClient::new();
    renter.register("buyer").await;
    let booking: Value = book(&renter, &vehicle["id"], 3, 3).await.json().await.unwrap();
    let status_path = format!("/api/bookings/{}/status", booking["id"]);

    let resp = renter.patch(&status_path, &json!({ "status": "cancelled" })).await;
    assert_eq!(resp.status(), StatusCode::OK);

    // Terminal: no way back
    let resp = owner.patch(&status_path, &json!({ "status": "confirmed" })).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let stranger = TestClient::new();
    stranger.register("buyer").await;
    let resp = stranger.get(&format!("/api/bookings/{}", booking["id"])).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_seller_dashboard_lists_incoming_bookings() {
    let owner = TestClient::new();
    owner.register("seller").await;
    let vehicle = create_vehicle(&owner).await;

    let renter = TestClient::new();
    renter.register("buyer").await;
    book(&renter, &vehicle["id"], 20, 21).await;

    let resp = owner.get("/api/seller/bookings?status=pending").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page: Value = resp.json().await.unwrap();
    assert_eq!(page["total"], 1);

    let resp = owner.get("/api/seller/dashboard").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let dashboard: Value = resp.json().await.unwrap();
    assert!(dashboard["store"].is_null());
}

async fn set_status(client: &TestClient, booking: &Value, status: &str) -> StatusCode {
    client
        .patch(
            &format!("/api/bookings/{}/status", booking["id"]),
            &json!({ "status": status }),
        )
        .await
        .status()
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_booking_unknown_vehicle_is_not_found() {
    let renter = TestClient::new();
    renter.register("buyer").await;
    let resp = book(&renter, &json!(i32::MAX), 2, 3).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_confirming_second_overlap_conflicts() {
    let owner = TestClient::new();
    owner.register("seller").await;
    let vehicle = create_vehicle(&owner).await;

    let first = TestClient::new();
    first.register("buyer").await;
    let second = TestClient::new();
    second.register("buyer").await;

    // Pending requests may overlap
    let a: Value = book(&first, &vehicle["id"], 30, 33).await.json().await.unwrap();
    let b: Value = book(&second, &vehicle["id"], 32, 35).await.json().await.unwrap();

    assert_eq!(set_status(&owner, &a, "confirmed").await, StatusCode::OK);
    assert_eq!(set_status(&owner, &b, "confirmed").await, StatusCode::CONFLICT);

    let b: Value = second
        .get(&format!("/api/bookings/{}", b["id"]))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(b["status"], "pending");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "Requires running marketplace server and database"]
async fn test_parallel_confirmations_admit_one() {
    let owner = TestClient::new();
    owner.register("seller").await;
    let vehicle = create_vehicle(&owner).await;

    let first = TestClient::new();
    first.register("buyer").await;
    let second = TestClient::new();
    second.register("buyer").await;
    let a: Value = book(&first, &vehicle["id"], 40, 42).await.json().await.unwrap();
    let b: Value = book(&second, &vehicle["id"], 41, 44).await.json().await.unwrap();

    let (left, right) = tokio::join!(
        set_status(&owner, &a, "confirmed"),
        set_status(&owner, &b, "confirmed"),
    );
    let mut outcomes = [left, right];
    outcomes.sort_by_key(StatusCode::as_u16);
    assert_eq!(outcomes, [StatusCode::OK, StatusCode::CONFLICT]);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_terminal_and_undefined_moves_conflict() {
    let owner = TestClient::new();
    owner.register("seller").await;
    let vehicle = create_vehicle(&owner).await;

    let renter = TestClient::new();
    renter.register("buyer").await;
    let booking: Value = book(&renter, &vehicle["id"], 6, 7).await.json().await.unwrap();

    // Pending cannot jump straight to completed, whoever asks
    assert_eq!(set_status(&owner, &booking, "completed").await, StatusCode::CONFLICT);
    // A defined move by the wrong party is forbidden
    assert_eq!(set_status(&renter, &booking, "rejected").await, StatusCode::FORBIDDEN);

    assert_eq!(set_status(&owner, &booking, "rejected").await, StatusCode::OK);
    assert_eq!(set_status(&renter, &booking, "cancelled").await, StatusCode::CONFLICT);
    assert_eq!(set_status(&owner, &booking, "confirmed").await, StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_vehicle_with_confirmed_booking_cannot_be_deleted() {
    let owner = TestClient::new();
    owner.register("seller").await;
    let vehicle = create_vehicle(&owner).await;

    let renter = TestClient::new();
    renter.register("buyer").await;
    let booking: Value = book(&renter, &vehicle["id"], 8, 9).await.json().await.unwrap();
    assert_eq!(set_status(&owner, &booking, "confirmed").await, StatusCode::OK);

    let resp = owner.delete(&format!("/api/vehicles/{}", vehicle["id"])).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = owner.get(&format!("/api/vehicles/{}", vehicle["id"])).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_deleting_vehicle_cancels_pending_and_notifies() {
    let owner = TestClient::new();
    owner.register("seller").await;
    let vehicle = create_vehicle(&owner).await;

    let renter = TestClient::new();
    renter.register("buyer").await;
    let booking: Value = book(&renter, &vehicle["id"], 12, 13).await.json().await.unwrap();

    let resp = owner.delete(&format!("/api/vehicles/{}", vehicle["id"])).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = renter.get(&format!("/api/vehicles/{}", vehicle["id"])).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let booking: Value = renter
        .get(&format!("/api/bookings/{}", booking["id"]))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(booking["status"], "cancelled");

    let page: Value = renter
        .get("/api/notifications?unread_only=true")
        .await
        .json()
        .await
        .unwrap();
    let cancelled = page["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|n| n["title"] == "Booking cancelled")
        .unwrap();
    assert_eq!(
        cancelled["link"],
        format!("/bookings/{}", booking["id"]).as_str()
    );
}
