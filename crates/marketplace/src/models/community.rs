//! Community groups, their posts and comments.

use chrono::{DateTime, Utc};
use serde::Serialize;

use harvest_market_core::{CommentId, CommunityId, PostId, UserId};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Community {
    pub id: CommunityId,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub members_count: i32,
    /// Whether the requesting user is a member; false for anonymous callers.
    pub is_member: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A post with its author and the viewer's like state.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Post {
    pub id: PostId,
    pub community_id: CommunityId,
    pub community_name: String,
    pub author_id: UserId,
    pub author_name: String,
    pub author_avatar_url: Option<String>,
    pub content: String,
    pub image_urls: Vec<String>,
    pub like_count: i32,
    pub comment_count: i32,
    pub liked_by_me: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author_id: UserId,
    pub author_name: String,
    pub author_avatar_url: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
