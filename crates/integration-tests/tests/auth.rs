//! Account lifecycle over HTTP.
//!
//! Requires a running server with migrations applied. The password reset
//! tests also need `MARKET_DATABASE_URL` to plant a known code.

#![allow(clippy::unwrap_used)]

use harvest_market_integration_tests::{
    TEST_PASSWORD, TestClient, database, issue_reset_code, unique_email,
};
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_health_endpoints() {
    let client = TestClient::new();

    let resp = client.get("/health").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "ok");

    let resp = client.get("/health/ready").await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_register_me_logout() {
    let client = TestClient::new();
    let user = client.register("buyer").await;
    assert_eq!(user["role"], "buyer");
    assert!(user.get("password_hash").is_none());

    let resp = client.get("/api/auth/me").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let me: Value = resp.json().await.unwrap();
    assert_eq!(me["id"], user["id"]);

    let resp = client.post_empty("/api/auth/logout").await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = client.get("/api/auth/me").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_duplicate_email_conflicts() {
    let client = TestClient::new();
    let email = unique_email("dup");
    let body = json!({ "name": "First", "email": email, "password": TEST_PASSWORD });

    let resp = client.post("/api/auth/register", &body).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let other = TestClient::new();
    let body = json!({ "name": "Second", "email": email.to_uppercase(), "password": TEST_PASSWORD });
    let resp = other.post("/api/auth/register", &body).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_register_rejects_admin_role_and_short_password() {
    let client = TestClient::new();

    let resp = client
        .post(
            "/api/auth/register",
            &json!({
                "name": "Sneaky",
                "email": unique_email("sneaky"),
                "password": TEST_PASSWORD,
                "role": "admin",
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .post(
            "/api/auth/register",
            &json!({ "name": "Short", "email": unique_email("short"), "password": "abc" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("password"));
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_wrong_password_is_unauthorized() {
    let client = TestClient::new();
    let user = client.register("buyer").await;
    client.post_empty("/api/auth/logout").await;

    let resp = client
        .login(user["email"].as_str().unwrap(), "not-the-password")
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client
        .login(user["email"].as_str().unwrap(), TEST_PASSWORD)
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_change_password() {
    let client = TestClient::new();
    let user = client.register("buyer").await;

    let resp = client
        .put(
            "/api/auth/password",
            &json!({ "current_password": "wrong-current", "new_password": "another-password" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client
        .put(
            "/api/auth/password",
            &json!({ "current_password": TEST_PASSWORD, "new_password": "another-password" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let fresh = TestClient::new();
    let resp = fresh
        .login(user["email"].as_str().unwrap(), "another-password")
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_forgot_password_does_not_reveal_accounts() {
    let client = TestClient::new();
    let resp = client
        .post(
            "/api/auth/password/forgot",
            &json!({ "email": unique_email("nobody") }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_protected_routes_require_login() {
    let client = TestClient::new();
    for path in ["/api/wishlist", "/api/notifications", "/api/conversations", "/api/bookings"] {
        let resp = client.get(path).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{path}");
    }
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_reset_code_is_single_use() {
    let pool = database().await;
    let client = TestClient::new();
    let user = client.register("buyer").await;
    let email = user["email"].as_str().unwrap();
    issue_reset_code(&pool, &user, "314159").await;

    let resp = client.reset_password(email, "314159", "fresh-password-1").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client.reset_password(email, "314159", "fresh-password-2").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let fresh = TestClient::new();
    assert_eq!(fresh.login(email, "fresh-password-1").await.status(), StatusCode::OK);
    let fresh = TestClient::new();
    assert_eq!(
        fresh.login(email, "fresh-password-2").await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_reset_code_locks_after_five_guesses() {
    let pool = database().await;
    let client = TestClient::new();
    let user = client.register("buyer").await;
    let email = user["email"].as_str().unwrap();
    issue_reset_code(&pool, &user, "271828").await;

    for wrong in ["000001", "000002", "000003", "000004", "000005"] {
        let guesser = TestClient::new();
        let resp = guesser.reset_password(email, wrong, "fresh-password-1").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    // The right code is refused once the budget is spent
    let resp = client.reset_password(email, "271828", "fresh-password-1").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let fresh = TestClient::new();
    assert_eq!(fresh.login(email, TEST_PASSWORD).await.status(), StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "Requires running marketplace server and database"]
async fn test_parallel_guesses_share_one_budget() {
    let pool = database().await;
    let client = TestClient::new();
    let user = client.register("buyer").await;
    let email = user["email"].as_str().unwrap().to_string();
    issue_reset_code(&pool, &user, "161803").await;

    let guesses: Vec<_> = (0..20)
        .map(|i| {
            let email = email.clone();
            tokio::spawn(async move {
                let guesser = TestClient::new();
                guesser
                    .reset_password(&email, &format!("9{i:05}"), "fresh-password-1")
                    .await
                    .status()
            })
        })
        .collect();
    for guess in guesses {
        assert_eq!(guess.await.unwrap(), StatusCode::BAD_REQUEST);
    }

    let attempts: i32 = sqlx::query_scalar(
        "SELECT attempts FROM market.password_reset WHERE user_id = $1 AND consumed_at IS NULL",
    )
    .bind(i32::try_from(user["id"].as_i64().unwrap()).unwrap())
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(attempts, 5);

    let resp = client.reset_password(&email, "161803", "fresh-password-1").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
