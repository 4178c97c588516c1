//! Moderation reports.

use chrono::{DateTime, Utc};
use serde::Serialize;

use harvest_market_core::{ReportId, ReportStatus, ReportTarget, UserId};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Report {
    pub id: ReportId,
    pub reporter_id: UserId,
    pub reporter_name: String,
    pub target_type: ReportTarget,
    pub target_id: i32,
    pub reason: String,
    pub details: Option<String>,
    pub status: ReportStatus,
    pub resolution_note: Option<String>,
    pub resolved_by: Option<UserId>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
