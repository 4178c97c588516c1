//! Integration tests for Harvest Market.
//!
//! The tests talk HTTP to a running server and are `#[ignore]`d by default.
//!
//! # Running Tests
//!
//! ```bash
//! hm-cli migrate
//! HM_ADMIN_PASSWORD=admin-password-123 hm-cli admin create -e admin@example.com -n Admin
//! cargo run -p harvest-market &
//!
//! MARKET_ADMIN_EMAIL=admin@example.com HM_ADMIN_PASSWORD=admin-password-123 \
//!     cargo test -p harvest-market-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `MARKET_BASE_URL` - server under test (default `http://localhost:3000`)
//! - `MARKET_ADMIN_EMAIL`, `HM_ADMIN_PASSWORD` - admin account for admin tests
//! - `MARKET_DATABASE_URL` (or `DATABASE_URL`) - same database as the server,
//!   for state the API never returns such as reset codes
//!
//! The auth rate limiter allows a burst of five logins or registrations per
//! IP, so run the suite with `--test-threads=1` or behind distinct
//! `X-Forwarded-For` values (see [`TestClient::new`]).

#![allow(
    clippy::missing_panics_doc,
    clippy::unwrap_used,
    clippy::indexing_slicing
)]

use chrono::{Duration, Utc};
use harvest_market::db::PasswordResetRepository;
use harvest_market::services::auth::{RESET_CODE_TTL_MINUTES, hash_reset_code};
use harvest_market_core::UserId;
use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use sqlx::PgPool;
use uuid::Uuid;

/// Password used for every account the tests register.
pub const TEST_PASSWORD: &str = "harvest-test-password";

/// Base URL of the server under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("MARKET_BASE_URL")
        .unwrap_or_else(|_| "http://localhost:3000".to_string())
        .trim_end_matches('/')
        .to_string()
}

/// An email address no other test run has used.
#[must_use]
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.com", Uuid::new_v4().simple())
}

/// Parse a decimal string field such as `"60.00"`.
#[must_use]
pub fn decimal(value: &Value) -> f64 {
    value.as_str().unwrap().parse().unwrap()
}

/// Connect to the database the server under test uses.
pub async fn database() -> PgPool {
    let url = std::env::var("MARKET_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("MARKET_DATABASE_URL not set");
    PgPool::connect(&url)
        .await
        .expect("Failed to connect to database")
}

/// Issue a reset code with a known value, as if it had been emailed.
pub async fn issue_reset_code(pool: &PgPool, user: &Value, code: &str) {
    let id = i32::try_from(user["id"].as_i64().unwrap()).unwrap();
    PasswordResetRepository::new(pool)
        .create(
            UserId::new(id),
            &hash_reset_code(code),
            Utc::now() + Duration::minutes(RESET_CODE_TTL_MINUTES),
        )
        .await
        .unwrap();
}

/// HTTP client with its own cookie jar, so one value is one session.
pub struct TestClient {
    client: Client,
    base_url: String,
}

impl TestClient {
    /// A fresh anonymous client.
    ///
    /// Each client presents a random `X-Forwarded-For` address so the auth
    /// rate limiter buckets clients separately.
    #[must_use]
    pub fn new() -> Self {
        let bytes = Uuid::new_v4().into_bytes();
        let forwarded = format!("10.{}.{}.{}", bytes[0], bytes[1], bytes[2]);

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("x-forwarded-for", forwarded.parse().unwrap());

        let client = Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url(),
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    pub async fn post(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("POST request failed")
    }

    pub async fn post_empty(&self, path: &str) -> Response {
        self.client
            .post(self.url(path))
            .send()
            .await
            .expect("POST request failed")
    }

    pub async fn put(&self, path: &str, body: &Value) -> Response {
        self.client
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .expect("PUT request failed")
    }

    pub async fn patch(&self, path: &str, body: &Value) -> Response {
        self.client
            .patch(self.url(path))
            .json(body)
            .send()
            .await
            .expect("PATCH request failed")
    }

    pub async fn delete(&self, path: &str) -> Response {
        self.client
            .delete(self.url(path))
            .send()
            .await
            .expect("DELETE request failed")
    }

    /// Upload `bytes` as the multipart `file` field.
    pub async fn upload(&self, path: &str, file_name: &str, mime: &str, bytes: Vec<u8>) -> Response {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)
            .unwrap();
        let form = reqwest::multipart::Form::new().part("file", part);
        self.client
            .post(self.url(path))
            .multipart(form)
            .send()
            .await
            .expect("multipart request failed")
    }

    /// Register and stay logged in. Returns the new user.
    pub async fn register(&self, role: &str) -> Value {
        let resp = self
            .post(
                "/api/auth/register",
                &json!({
                    "name": format!("Test {role}"),
                    "email": unique_email(role),
                    "password": TEST_PASSWORD,
                    "role": role,
                }),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::CREATED, "registration failed");
        resp.json().await.unwrap()
    }

    pub async fn login(&self, email: &str, password: &str) -> Response {
        self.post(
            "/api/auth/login",
            &json!({ "email": email, "password": password }),
        )
        .await
    }

    pub async fn reset_password(&self, email: &str, code: &str, new_password: &str) -> Response {
        self.post(
            "/api/auth/password/reset",
            &json!({ "email": email, "code": code, "new_password": new_password }),
        )
        .await
    }

    /// Log in with the admin account from the environment.
    pub async fn login_admin(&self) {
        let email = std::env::var("MARKET_ADMIN_EMAIL").expect("MARKET_ADMIN_EMAIL not set");
        let password = std::env::var("HM_ADMIN_PASSWORD").expect("HM_ADMIN_PASSWORD not set");
        let resp = self.login(&email, &password).await;
        assert_eq!(resp.status(), StatusCode::OK, "admin login failed");
    }
}

impl Default for TestClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a category and a unit with unique names as admin.
///
/// Returns `(category_id, unit_id)`.
pub async fn reference_fixture(admin: &TestClient) -> (i64, i64) {
    let tag = Uuid::new_v4().simple().to_string();

    let resp = admin
        .post(
            "/api/admin/categories",
            &json!({ "name": format!("Category {tag}") }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let category: Value = resp.json().await.unwrap();

    let resp = admin
        .post(
            "/api/admin/units",
            &json!({ "name": format!("Unit {tag}"), "abbreviation": &tag[..6] }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let unit: Value = resp.json().await.unwrap();

    (category["id"].as_i64().unwrap(), unit["id"].as_i64().unwrap())
}

/// Register a seller who owns a store. Returns the client and the store.
pub async fn seller_with_store() -> (TestClient, Value) {
    let seller = TestClient::new();
    seller.register("seller").await;
    let resp = seller
        .post(
            "/api/stores",
            &json!({ "name": format!("Farm {}", Uuid::new_v4().simple()) }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let store = resp.json().await.unwrap();
    (seller, store)
}
