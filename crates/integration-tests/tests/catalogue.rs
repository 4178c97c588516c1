//! Stores, products, ratings and wishlist over HTTP.
//!
//! Requires a running server, migrations applied and an admin account in
//! `MARKET_ADMIN_EMAIL` / `HM_ADMIN_PASSWORD` for reference data.

#![allow(clippy::unwrap_used)]

use harvest_market_integration_tests::{
    TestClient, decimal, reference_fixture, seller_with_store,
};
use reqwest::StatusCode;
use serde_json::{Value, json};

async fn create_product(seller: &TestClient, category_id: i64, unit_id: i64, price: &str) -> Value {
    let resp = seller
        .post(
            "/api/products",
            &json!({
                "category_id": category_id,
                "unit_id": unit_id,
                "name": "Heirloom tomatoes",
                "price": price,
                "quantity": 40,
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.unwrap()
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_buyer_cannot_open_store() {
    let buyer = TestClient::new();
    buyer.register("buyer").await;

    let resp = buyer.post("/api/stores", &json!({ "name": "Not a farm" })).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_second_store_conflicts() {
    let (seller, _store) = seller_with_store().await;
    let resp = seller.post("/api/stores", &json!({ "name": "Another farm" })).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_product_lifecycle_and_visibility() {
    let admin = TestClient::new();
    admin.login_admin().await;
    let (category_id, unit_id) = reference_fixture(&admin).await;

    let (seller, store) = seller_with_store().await;
    let product = create_product(&seller, category_id, unit_id, "4.50").await;
    assert_eq!(product["store_id"], store["id"]);
    assert!((decimal(&product["price"]) - 4.5).abs() < f64::EPSILON);
    assert_eq!(product["is_featured"], false);

    let id = product["id"].as_i64().unwrap();
    let path = format!("/api/products/{id}");

    let anonymous = TestClient::new();
    let resp = anonymous.get(&path).await;
    assert_eq!(resp.status(), StatusCode::OK);

    // Deactivate: hidden from the public, still visible to the owner
    let resp = seller
        .put(
            &path,
            &json!({
                "category_id": category_id,
                "unit_id": unit_id,
                "name": "Heirloom tomatoes",
                "price": "4.50",
                "quantity": 40,
                "status": "inactive",
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    assert_eq!(anonymous.get(&path).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(seller.get(&path).await.status(), StatusCode::OK);

    let other = TestClient::new();
    other.register("seller").await;
    assert_eq!(other.delete(&path).await.status(), StatusCode::FORBIDDEN);

    assert_eq!(seller.delete(&path).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(seller.get(&path).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_product_validation() {
    let admin = TestClient::new();
    admin.login_admin().await;
    let (category_id, unit_id) = reference_fixture(&admin).await;
    let (seller, _store) = seller_with_store().await;

    let resp = seller
        .post(
            "/api/products",
            &json!({
                "category_id": category_id,
                "unit_id": unit_id,
                "name": "Bad price",
                "price": "-1",
                "quantity": 1,
            }),
        )
        .await;
    assert!(resp.status().is_client_error());

    let resp = seller
        .post(
            "/api/products",
            &json!({
                "category_id": 987_654_321,
                "unit_id": unit_id,
                "name": "Unknown category",
                "price": "1.00",
                "quantity": 1,
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = seller
        .post(
            "/api/products",
            &json!({
                "category_id": category_id,
                "unit_id": unit_id,
                "name": "Featured by a seller",
                "price": "1.00",
                "quantity": 1,
                "is_featured": true,
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let product: Value = resp.json().await.unwrap();
    assert_eq!(product["is_featured"], false);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_product_price_filter() {
    let admin = TestClient::new();
    admin.login_admin().await;
    let (category_id, unit_id) = reference_fixture(&admin).await;
    let (seller, _store) = seller_with_store().await;
    create_product(&seller, category_id, unit_id, "2.00").await;
    create_product(&seller, category_id, unit_id, "9.00").await;

    let client = TestClient::new();
    let resp = client
        .get(&format!(
            "/api/products?category_id={category_id}&min_price=5&sort=price_asc"
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page: Value = resp.json().await.unwrap();
    let items = page["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert!((decimal(&items[0]["price"]) - 9.0).abs() < f64::EPSILON);

    let resp = client.get("/api/products?min_price=10&max_price=5").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_rating_updates_average() {
    let admin = TestClient::new();
    admin.login_admin().await;
    let (category_id, unit_id) = reference_fixture(&admin).await;
    let (seller, _store) = seller_with_store().await;
    let product = create_product(&seller, category_id, unit_id, "3.00").await;
    let ratings = format!("/api/products/{}/ratings", product["id"]);

    let resp = seller.post(&ratings, &json!({ "score": 5 })).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let first = TestClient::new();
    first.register("buyer").await;
    let resp = first.post(&ratings, &json!({ "score": 6 })).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let resp = first.post(&ratings, &json!({ "score": 5, "review": "Sweet" })).await;
    assert!(resp.status().is_success());

    let second = TestClient::new();
    second.register("buyer").await;
    let resp = second.post(&ratings, &json!({ "score": 2 })).await;
    assert!(resp.status().is_success());

    // Rating again replaces the earlier score
    let resp = second.post(&ratings, &json!({ "score": 4 })).await;
    assert!(resp.status().is_success());

    let resp = first.get(&format!("/api/products/{}", product["id"])).await;
    let product: Value = resp.json().await.unwrap();
    assert_eq!(product["rating_count"], 2);
    assert!((decimal(&product["rating_average"]) - 4.5).abs() < f64::EPSILON);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_wishlist_is_idempotent() {
    let admin = TestClient::new();
    admin.login_admin().await;
    let (category_id, unit_id) = reference_fixture(&admin).await;
    let (seller, _store) = seller_with_store().await;
    let product = create_product(&seller, category_id, unit_id, "1.25").await;

    let buyer = TestClient::new();
    buyer.register("buyer").await;
    let body = json!({ "product_id": product["id"] });
    assert_eq!(buyer.post("/api/wishlist", &body).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(buyer.post("/api/wishlist", &body).await.status(), StatusCode::NO_CONTENT);

    let resp = buyer.get("/api/wishlist").await;
    let page: Value = resp.json().await.unwrap();
    assert_eq!(page["total"], 1);

    let path = format!("/api/wishlist/{}", product["id"]);
    assert_eq!(buyer.delete(&path).await.status(), StatusCode::NO_CONTENT);
    let page: Value = buyer.get("/api/wishlist").await.json().await.unwrap();
    assert_eq!(page["total"], 0);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_follow_store() {
    let (seller, store) = seller_with_store().await;
    let follow = format!("/api/stores/{}/follow", store["id"]);

    let resp = seller.post_empty(&follow).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let buyer = TestClient::new();
    buyer.register("buyer").await;
    let state: Value = buyer.post_empty(&follow).await.json().await.unwrap();
    assert_eq!(state["following"], true);
    assert_eq!(state["followers_count"], 1);

    let state: Value = buyer.post_empty(&follow).await.json().await.unwrap();
    assert_eq!(state["followers_count"], 1);

    let state: Value = buyer.delete(&follow).await.json().await.unwrap();
    assert_eq!(state["following"], false);
    assert_eq!(state["followers_count"], 0);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_upload_rejects_non_image() {
    let client = TestClient::new();
    client.register("seller").await;

    let resp = client
        .upload("/api/uploads", "notes.txt", "text/plain", b"hello".to_vec())
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let png = [
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R',
    ];
    let resp = client
        .upload("/api/uploads", "pixel.png", "image/png", png.to_vec())
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let stored: Value = resp.json().await.unwrap();
    assert!(stored["url"].as_str().unwrap().ends_with(".png"));
}
