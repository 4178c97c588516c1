//! Communities, posts, comments and likes.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use harvest_market_core::{CommentId, CommunityId, Page, PageRequest, PostId};

use crate::db::posts::Actor;
use crate::db::{CommunityRepository, PostRepository};
use crate::error::{AppError, Result};
use crate::extract::{Json, Path, Query};
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::{Comment, Community, Post};
use crate::routes::{ensure_owner_or_admin, found};
use crate::state::AppState;
use crate::validation;

const MAX_POST_LENGTH: usize = 5000;
const MAX_COMMENT_LENGTH: usize = 2000;
const MAX_POST_IMAGES: usize = 10;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/communities", get(communities))
        .route("/communities/{id}", get(community))
        .route("/communities/{id}/membership", post(join).delete(leave))
        .route("/communities/{id}/posts", get(community_posts).post(create_post))
        .route("/feed", get(feed))
        .route("/posts/{id}", get(show_post).put(update_post).delete(delete_post))
        .route("/posts/{id}/comments", get(comments).post(add_comment))
        .route("/posts/{id}/like", post(like).delete(unlike))
        .route("/comments/{id}", delete(delete_comment))
}

#[derive(Debug, Default, Deserialize)]
pub struct CommunityQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PostRequest {
    pub content: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

impl PostRequest {
    fn validate(&self) -> Result<(String, Vec<String>)> {
        Ok((
            validation::required_text("content", &self.content, MAX_POST_LENGTH)?,
            validation::image_urls("image_urls", &self.image_urls, MAX_POST_IMAGES)?,
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct Membership {
    pub is_member: bool,
    pub members_count: i32,
}

#[derive(Debug, Serialize)]
pub struct LikeState {
    pub liked: bool,
    pub like_count: i32,
}

async fn communities(
    State(state): State<AppState>,
    OptionalAuth(viewer): OptionalAuth,
    Query(page): Query<PageRequest>,
    Query(query): Query<CommunityQuery>,
) -> Result<Json<Page<Community>>> {
    let q = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
    let list = CommunityRepository::new(state.pool())
        .list(viewer.map(|user| user.id), q, page)
        .await?;
    Ok(Json(list))
}

async fn community(
    State(state): State<AppState>,
    OptionalAuth(viewer): OptionalAuth,
    Path(id): Path<CommunityId>,
) -> Result<Json<Community>> {
    let community = CommunityRepository::new(state.pool())
        .get(id, viewer.map(|user| user.id))
        .await?;
    Ok(Json(found(community, "Community")?))
}

async fn join(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<CommunityId>,
) -> Result<Json<Membership>> {
    let repo = CommunityRepository::new(state.pool());
    found(repo.get(id, None).await?, "Community")?;
    let members_count = repo.join(id, user.id).await?;
    Ok(Json(Membership {
        is_member: true,
        members_count,
    }))
}

async fn leave(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<CommunityId>,
) -> Result<Json<Membership>> {
    let repo = CommunityRepository::new(state.pool());
    found(repo.get(id, None).await?, "Community")?;
    let members_count = repo.leave(id, user.id).await?;
    Ok(Json(Membership {
        is_member: false,
        members_count,
    }))
}

async fn feed(
    State(state): State<AppState>,
    OptionalAuth(viewer): OptionalAuth,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Post>>> {
    let posts = PostRepository::new(state.pool())
        .list(None, viewer.map(|user| user.id), page)
        .await?;
    Ok(Json(posts))
}

async fn community_posts(
    State(state): State<AppState>,
    OptionalAuth(viewer): OptionalAuth,
    Path(id): Path<CommunityId>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Post>>> {
    let viewer = viewer.map(|user| user.id);
    found(CommunityRepository::new(state.pool()).get(id, viewer).await?, "Community")?;
    let posts = PostRepository::new(state.pool())
        .list(Some(id), viewer, page)
        .await?;
    Ok(Json(posts))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id, community_id = %id))]
async fn create_post(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<CommunityId>,
    Json(body): Json<PostRequest>,
) -> Result<(StatusCode, Json<Post>)> {
    let communities = CommunityRepository::new(state.pool());
    found(communities.get(id, None).await?, "Community")?;
    if !communities.is_member(id, user.id).await? {
        return Err(AppError::Forbidden(
            "Join the community before posting".to_string(),
        ));
    }

    let (content, images) = body.validate()?;
    let post = PostRepository::new(state.pool())
        .create(id, user.id, &content, &images)
        .await?;
    tracing::info!(post_id = %post.id, "Post created");
    Ok((StatusCode::CREATED, Json(post)))
}

async fn show_post(
    State(state): State<AppState>,
    OptionalAuth(viewer): OptionalAuth,
    Path(id): Path<PostId>,
) -> Result<Json<Post>> {
    let post = PostRepository::new(state.pool())
        .get(id, viewer.map(|user| user.id))
        .await?;
    Ok(Json(found(post, "Post")?))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn update_post(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<PostId>,
    Json(body): Json<PostRequest>,
) -> Result<Json<Post>> {
    let repo = PostRepository::new(state.pool());
    let post = found(repo.get(id, Some(user.id)).await?, "Post")?;
    if post.author_id != user.id {
        return Err(AppError::Forbidden(
            "Only the author can edit a post".to_string(),
        ));
    }

    let (content, images) = body.validate()?;
    Ok(Json(repo.update(id, user.id, &content, &images).await?))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn delete_post(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<PostId>,
) -> Result<StatusCode> {
    let repo = PostRepository::new(state.pool());
    let post = found(repo.get(id, None).await?, "Post")?;
    ensure_owner_or_admin(&user, post.author_id)?;

    repo.delete(id).await?;
    tracing::info!(post_id = %id, "Post deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn comments(
    State(state): State<AppState>,
    Path(id): Path<PostId>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Comment>>> {
    let repo = PostRepository::new(state.pool());
    found(repo.get(id, None).await?, "Post")?;
    Ok(Json(repo.list_comments(id, page).await?))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn add_comment(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<PostId>,
    Json(body): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>)> {
    let content = validation::required_text("content", &body.content, MAX_COMMENT_LENGTH)?;

    let repo = PostRepository::new(state.pool());
    let post = found(repo.get(id, None).await?, "Post")?;
    let actor = Actor {
        id: user.id,
        name: &user.name,
    };
    let comment = repo.add_comment(&post, actor, &content).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn delete_comment(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<CommentId>,
) -> Result<StatusCode> {
    let repo = PostRepository::new(state.pool());
    let comment = found(repo.get_comment(id).await?, "Comment")?;
    ensure_owner_or_admin(&user, comment.author_id)?;

    repo.delete_comment(&comment).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn like(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<PostId>,
) -> Result<Json<LikeState>> {
    let repo = PostRepository::new(state.pool());
    let post = found(repo.get(id, None).await?, "Post")?;
    let actor = Actor {
        id: user.id,
        name: &user.name,
    };
    let like_count = repo.like(&post, actor).await?;
    Ok(Json(LikeState {
        liked: true,
        like_count,
    }))
}

async fn unlike(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<PostId>,
) -> Result<Json<LikeState>> {
    let repo = PostRepository::new(state.pool());
    found(repo.get(id, None).await?, "Post")?;
    let like_count = repo.unlike(id, user.id).await?;
    Ok(Json(LikeState {
        liked: false,
        like_count,
    }))
}
