//! One-to-one messaging between users.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use harvest_market_core::{ConversationId, MessageId, Page, PageRequest, ProductId, UserId};

use crate::db::conversations::MAX_MESSAGES;
use crate::db::{ConversationRepository, ProductRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::extract::{Json, Path, Query};
use crate::middleware::RequireAuth;
use crate::models::{ConversationSummary, Message};
use crate::routes::found;
use crate::state::AppState;
use crate::validation;

const MAX_MESSAGE_LENGTH: usize = 2000;
const DEFAULT_MESSAGES: i64 = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/conversations", get(index).post(start))
        .route("/conversations/unread", get(unread))
        .route("/conversations/{id}", get(show))
        .route("/conversations/{id}/messages", get(messages).post(send))
        .route("/conversations/{id}/read", post(mark_read))
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub recipient_id: UserId,
    pub product_id: Option<ProductId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessagesQuery {
    pub before: Option<MessageId>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct UnreadTotal {
    pub unread: i64,
}

async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<ConversationSummary>>> {
    Ok(Json(ConversationRepository::new(state.pool()).list(user.id, page).await?))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id, recipient_id = %body.recipient_id))]
async fn start(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<StartRequest>,
) -> Result<Json<ConversationSummary>> {
    if body.recipient_id == user.id {
        return Err(AppError::BadRequest("You cannot message yourself".to_string()));
    }

    found(
        UserRepository::new(state.pool()).get_by_id(body.recipient_id).await?,
        "Recipient",
    )?;
    if let Some(product_id) = body.product_id {
        found(ProductRepository::new(state.pool()).get(product_id).await?, "Product")?;
    }

    let conversation = ConversationRepository::new(state.pool())
        .find_or_create(user.id, body.recipient_id, body.product_id)
        .await?;
    Ok(Json(conversation))
}

async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ConversationId>,
) -> Result<Json<ConversationSummary>> {
    let conversation = ConversationRepository::new(state.pool()).get(id, user.id).await?;
    Ok(Json(found(conversation, "Conversation")?))
}

/// Newest first. Reading a page resets the caller's unread count.
async fn messages(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ConversationId>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<Vec<Message>>> {
    let limit = query.limit.unwrap_or(DEFAULT_MESSAGES).clamp(1, MAX_MESSAGES);
    let messages = ConversationRepository::new(state.pool())
        .messages(id, user.id, query.before, limit)
        .await?;
    Ok(Json(messages))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id, conversation_id = %id))]
async fn send(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ConversationId>,
    Json(body): Json<SendRequest>,
) -> Result<(StatusCode, Json<Message>)> {
    let text = validation::required_text("body", &body.body, MAX_MESSAGE_LENGTH)?;
    let message = ConversationRepository::new(state.pool())
        .send(id, user.id, &user.name, &text)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn mark_read(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ConversationId>,
) -> Result<StatusCode> {
    ConversationRepository::new(state.pool())
        .mark_read(id, user.id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn unread(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<UnreadTotal>> {
    let unread = ConversationRepository::new(state.pool())
        .unread_total(user.id)
        .await?;
    Ok(Json(UnreadTotal { unread }))
}
