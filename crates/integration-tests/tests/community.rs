//! Communities, posts, comments, likes and direct messages over HTTP.
//!
//! Requires a running server and an admin account in `MARKET_ADMIN_EMAIL` /
//! `HM_ADMIN_PASSWORD` (communities are created by admins).

#![allow(clippy::unwrap_used)]

use harvest_market_integration_tests::TestClient;
use reqwest::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

async fn create_community(admin: &TestClient) -> Value {
    let resp = admin
        .post(
            "/api/admin/communities",
            &json!({ "name": format!("Growers {}", Uuid::new_v4().simple()) }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.unwrap()
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_membership_required_to_post() {
    let admin = TestClient::new();
    admin.login_admin().await;
    let community = create_community(&admin).await;
    let posts = format!("/api/communities/{}/posts", community["id"]);
    let membership = format!("/api/communities/{}/membership", community["id"]);

    let member = TestClient::new();
    member.register("buyer").await;

    let resp = member.post(&posts, &json!({ "content": "First harvest!" })).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let state: Value = member.post_empty(&membership).await.json().await.unwrap();
    assert_eq!(state["is_member"], true);
    assert_eq!(state["members_count"], 1);

    // Joining twice does not double count
    let state: Value = member.post_empty(&membership).await.json().await.unwrap();
    assert_eq!(state["members_count"], 1);

    let resp = member.post(&posts, &json!({ "content": "First harvest!" })).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let state: Value = member.delete(&membership).await.json().await.unwrap();
    assert_eq!(state["is_member"], false);
    assert_eq!(state["members_count"], 0);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_comments_and_likes_update_counters() {
    let admin = TestClient::new();
    admin.login_admin().await;
    let community = create_community(&admin).await;

    let author = TestClient::new();
    author.register("seller").await;
    author
        .post_empty(&format!("/api/communities/{}/membership", community["id"]))
        .await;
    let post: Value = author
        .post(
            &format!("/api/communities/{}/posts", community["id"]),
            &json!({ "content": "Who has spare seedlings?" }),
        )
        .await
        .json()
        .await
        .unwrap();
    let post_path = format!("/api/posts/{}", post["id"]);

    let reader = TestClient::new();
    reader.register("buyer").await;

    let like: Value = reader
        .post_empty(&format!("{post_path}/like"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(like["liked"], true);
    assert_eq!(like["like_count"], 1);

    let like: Value = reader
        .post_empty(&format!("{post_path}/like"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(like["like_count"], 1);

    let resp = reader
        .post(&format!("{post_path}/comments"), &json!({ "content": "I do" }))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let comment: Value = resp.json().await.unwrap();

    let post: Value = reader.get(&post_path).await.json().await.unwrap();
    assert_eq!(post["comment_count"], 1);
    assert_eq!(post["liked_by_me"], true);

    // Only the author may edit; the commenter may not delete the post
    let resp = reader.put(&post_path, &json!({ "content": "Edited" })).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let resp = reader.delete(&post_path).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = reader
        .delete(&format!("/api/comments/{}", comment["id"]))
        .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let post: Value = author.get(&post_path).await.json().await.unwrap();
    assert_eq!(post["comment_count"], 0);

    // The author heard about the like and the comment
    let notifications: Value = author.get("/api/notifications").await.json().await.unwrap();
    assert!(notifications["total"].as_i64().unwrap() >= 2);
}

#[tokio::test]
#[ignore = "Requires running marketplace server and database"]
async fn test_direct_messages() {
    let alice = TestClient::new();
    let alice_user = alice.register("buyer").await;
    let bob = TestClient::new();
    let bob_user = bob.register("seller").await;

    let resp = alice
        .post("/api/conversations", &json!({ "recipient_id": alice_user["id"] }))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = alice
        .post("/api/conversations", &json!({ "recipient_id": bob_user["id"] }))
        .await;
    assert!(resp.status().is_success());
    let conversation: Value = resp.json().await.unwrap();

    // Starting again reuses the same conversation
    let again: Value = alice
        .post("/api/conversations", &json!({ "recipient_id": bob_user["id"] }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(again["id"], conversation["id"]);

    let messages = format!("/api/conversations/{}/messages", conversation["id"]);
    let resp = alice.post(&messages, &json!({ "body": "Are the eggs fresh?" })).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let resp = alice.post(&messages, &json!({ "body": "   " })).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let unread: Value = bob.get("/api/conversations/unread").await.json().await.unwrap();
    assert_eq!(unread["unread"], 1);

    let resp = bob
        .post_empty(&format!("/api/conversations/{}/read", conversation["id"]))
        .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let unread: Value = bob.get("/api/conversations/unread").await.json().await.unwrap();
    assert_eq!(unread["unread"], 0);

    let outsider = TestClient::new();
    outsider.register("buyer").await;
    let resp = outsider.get(&messages).await;
    assert!(matches!(
        resp.status(),
        StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
    ));
}
