//! Direct messaging types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use harvest_market_core::{ConversationId, MessageId, ProductId, UserId};

/// A conversation as seen by one participant.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub counterpart_id: UserId,
    pub counterpart_name: String,
    pub counterpart_avatar_url: Option<String>,
    pub product_id: Option<ProductId>,
    pub last_message_preview: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    /// Messages the viewer has not read yet.
    pub unread_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Characters of a message body kept as the conversation preview.
pub const PREVIEW_CHARS: usize = 120;

/// Truncate a message body for `last_message_preview`.
#[must_use]
pub fn preview(body: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_keeps_short_bodies() {
        assert_eq!(preview("Is the maize still available?"), "Is the maize still available?");
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let body = "é".repeat(PREVIEW_CHARS + 5);
        let short = preview(&body);
        assert_eq!(short.chars().count(), PREVIEW_CHARS + 1);
        assert!(short.ends_with('…'));
    }
}
