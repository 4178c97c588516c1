//! In-app notifications.

use chrono::{DateTime, Utc};
use serde::Serialize;

use harvest_market_core::{NotificationId, NotificationKind, UserId};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    /// Client route the notification points at, e.g. `/bookings/12`.
    pub link: Option<String>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
