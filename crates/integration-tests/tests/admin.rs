//! Admin console over HTTP.
//!
//! Requires a running server and an admin account in `MARKET_ADMIN_EMAIL` /
//! `HM_ADMIN_PASSWORD`.

#![allow(clippy::unwrap_used)]

use chrono::{Duration, Utc};
use harvest_market_integration_tests::{TestClient, reference_fixture, seller_with_store};
use reqwest::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_admin_routes_reject_non_admins() {
    let anonymous = TestClient::new();
    let resp = anonymous.get("/api/admin/dashboard").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let seller = TestClient::new();
    seller.register("seller").await;
    let resp = seller.get("/api/admin/dashboard").await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let resp = seller.post("/api/admin/categories", &json!({ "name": "Nope" })).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_dashboard_counts() {
    let admin = TestClient::new();
    admin.login_admin().await;

    let resp = admin.get("/api/admin/dashboard").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let stats: Value = resp.json().await.unwrap();
    assert!(stats["users_by_role"].is_object() || stats["users_by_role"].is_array());
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_blocked_user_cannot_log_in() {
    let admin = TestClient::new();
    admin.login_admin().await;

    let user_client = TestClient::new();
    let user = user_client.register("buyer").await;
    let status_path = format!("/api/admin/users/{}/status", user["id"]);

    let resp = admin.patch(&status_path, &json!({ "status": "blocked" })).await;
    assert_eq!(resp.status(), StatusCode::OK);

    // The existing session stops working on the next request
    let resp = user_client.get("/api/auth/me").await;
    assert!(matches!(
        resp.status(),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
    ));

    let fresh = TestClient::new();
    let resp = fresh
        .login(
            user["email"].as_str().unwrap(),
            harvest_market_integration_tests::TEST_PASSWORD,
        )
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = admin.patch(&status_path, &json!({ "status": "active" })).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_admin_cannot_demote_self() {
    let admin = TestClient::new();
    admin.login_admin().await;
    let me: Value = admin.get("/api/auth/me").await.json().await.unwrap();

    let resp = admin
        .patch(
            &format!("/api/admin/users/{}/role", me["id"]),
            &json!({ "role": "buyer" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_reference_crud_refreshes_public_lists() {
    let admin = TestClient::new();
    admin.login_admin().await;
    let name = format!("State {}", Uuid::new_v4().simple());

    let resp = admin.post("/api/admin/states", &json!({ "name": name })).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let state: Value = resp.json().await.unwrap();

    let resp = admin.post("/api/admin/states", &json!({ "name": name.to_uppercase() })).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = admin
        .post(
            "/api/admin/cities",
            &json!({ "state_id": state["id"], "name": "Riverside" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let public = TestClient::new();
    let states: Value = public.get("/api/states").await.json().await.unwrap();
    assert!(states.as_array().unwrap().iter().any(|s| s["id"] == state["id"]));

    let cities: Value = public
        .get(&format!("/api/states/{}/cities", state["id"]))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(cities.as_array().unwrap().len(), 1);

    let resp = admin.delete(&format!("/api/admin/states/{}", state["id"])).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = public.get(&format!("/api/states/{}/cities", state["id"])).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_csv_import_reports_rows() {
    let admin = TestClient::new();
    admin.login_admin().await;
    let tag = Uuid::new_v4().simple().to_string();

    let csv = format!("name,abbreviation\nCrate {tag},cr{}\n,x\nCrate {tag},cr\n", &tag[..4]);
    let resp = admin
        .upload("/api/admin/units/import", "units.csv", "text/csv", csv.into_bytes())
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let report: Value = resp.json().await.unwrap();
    assert_eq!(report["inserted"], 1);
    assert_eq!(report["errors"].as_array().unwrap().len(), 1);
    assert_eq!(report["skipped"].as_array().unwrap().len(), 1);

    let resp = admin
        .upload("/api/admin/units/import", "units.csv", "text/csv", b"label\nKg\n".to_vec())
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_report_moderation() {
    let admin = TestClient::new();
    admin.login_admin().await;

    let target = TestClient::new();
    let target_user = target.register("seller").await;

    let reporter = TestClient::new();
    reporter.register("buyer").await;
    let body = json!({
        "target_type": "user",
        "target_id": target_user["id"],
        "reason": "Spam",
    });
    let resp = reporter.post("/api/reports", &body).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let report: Value = resp.json().await.unwrap();
    assert_eq!(report["status"], "open");

    let resp = reporter.post("/api/reports", &body).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let path = format!("/api/admin/reports/{}", report["id"]);
    let resp = admin.patch(&path, &json!({ "status": "open" })).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = admin
        .patch(&path, &json!({ "status": "resolved", "resolution_note": "Warned" }))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let report: Value = resp.json().await.unwrap();
    assert_eq!(report["status"], "resolved");

    let resp = admin.patch(&path, &json!({ "status": "dismissed" })).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_banners_public_and_admin() {
    let admin = TestClient::new();
    admin.login_admin().await;

    let resp = admin
        .post(
            "/api/admin/banners",
            &json!({
                "title": "Hidden",
                "image_url": "/uploads/banners/hidden.png",
                "is_active": false,
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let banner: Value = resp.json().await.unwrap();

    let public: Value = TestClient::new().get("/api/banners").await.json().await.unwrap();
    assert!(!public.as_array().unwrap().iter().any(|b| b["id"] == banner["id"]));

    let all: Value = admin.get("/api/admin/banners").await.json().await.unwrap();
    assert!(all.as_array().unwrap().iter().any(|b| b["id"] == banner["id"]));

    let resp = admin.delete(&format!("/api/admin/banners/{}", banner["id"])).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_deleting_user_releases_their_footprint() {
    let admin = TestClient::new();
    admin.login_admin().await;
    let (category_id, unit_id) = reference_fixture(&admin).await;
    let (seller, store) = seller_with_store().await;

    let community: Value = admin
        .post(
            "/api/admin/communities",
            &json!({ "name": format!("Orchardists {}", Uuid::new_v4().simple()) }),
        )
        .await
        .json()
        .await
        .unwrap();
    let membership = format!("/api/communities/{}/membership", community["id"]);
    seller.post_empty(&membership).await;
    let post: Value = seller
        .post(
            &format!("/api/communities/{}/posts", community["id"]),
            &json!({ "content": "Pruning workshop on Saturday" }),
        )
        .await
        .json()
        .await
        .unwrap();
    let post_path = format!("/api/posts/{}", post["id"]);

    let product: Value = seller
        .post(
            "/api/products",
            &json!({
                "category_id": category_id,
                "unit_id": unit_id,
                "name": "Bramley apples",
                "price": "2.50",
                "quantity": 100,
            }),
        )
        .await
        .json()
        .await
        .unwrap();
    let vehicle: Value = seller
        .post(
            "/api/vehicles",
            &json!({ "name": "Orchard ladder truck", "kind": "truck", "price_per_day": "30.00" }),
        )
        .await
        .json()
        .await
        .unwrap();

    let buyer = TestClient::new();
    let user = buyer.register("buyer").await;
    buyer.post_empty(&format!("/api/stores/{}/follow", store["id"])).await;
    buyer.post_empty(&membership).await;
    buyer.post_empty(&format!("{post_path}/like")).await;
    buyer
        .post(&format!("{post_path}/comments"), &json!({ "content": "Count me in" }))
        .await;
    buyer
        .post(
            &format!("/api/products/{}/ratings", product["id"]),
            &json!({ "score": 4 }),
        )
        .await;
    let start = (Utc::now().date_naive() + Duration::days(15)).to_string();
    let booking: Value = buyer
        .post(
            "/api/bookings",
            &json!({ "vehicle_id": vehicle["id"], "start_date": start, "end_date": start }),
        )
        .await
        .json()
        .await
        .unwrap();
    let resp = seller
        .patch(
            &format!("/api/bookings/{}/status", booking["id"]),
            &json!({ "status": "confirmed" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = admin.delete(&format!("/api/admin/users/{}", user["id"])).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let store: Value = seller
        .get(&format!("/api/stores/{}", store["id"]))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(store["followers_count"], 0);

    let community: Value = seller
        .get(&format!("/api/communities/{}", community["id"]))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(community["members_count"], 1);

    let post: Value = seller.get(&post_path).await.json().await.unwrap();
    assert_eq!(post["like_count"], 0);
    assert_eq!(post["comment_count"], 0);

    let product: Value = seller
        .get(&format!("/api/products/{}", product["id"]))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(product["rating_count"], 0);

    let vehicle: Value = seller
        .get(&format!("/api/vehicles/{}", vehicle["id"]))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(vehicle["status"], "available");
}
