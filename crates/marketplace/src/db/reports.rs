//! Moderation reports.

use sqlx::PgPool;

use harvest_market_core::{
    NotificationKind, Page, PageRequest, ReportId, ReportStatus, ReportTarget, UserId,
};

use super::RepositoryError;
use super::notifications::{self, NewNotification};
use crate::models::Report;

const REPORT_SELECT: &str = r"
    SELECT r.id, r.reporter_id, u.name AS reporter_name, r.target_type, r.target_id,
           r.reason, r.details, r.status, r.resolution_note, r.resolved_by,
           r.resolved_at, r.created_at
    FROM market.report r
    JOIN market.user u ON u.id = r.reporter_id
";

#[derive(Debug, Clone)]
pub struct NewReport {
    pub target_type: ReportTarget,
    pub target_id: i32,
    pub reason: String,
    pub details: Option<String>,
}

/// Repository for reports.
pub struct ReportRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReportRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Whether the reported entity exists (and, for listings, is not deleted).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn target_exists(&self, target: ReportTarget, id: i32) -> Result<bool, RepositoryError> {
        let sql = match target {
            ReportTarget::Product => {
                "SELECT EXISTS(SELECT 1 FROM market.product WHERE id = $1 AND deleted_at IS NULL)"
            }
            ReportTarget::Vehicle => {
                "SELECT EXISTS(SELECT 1 FROM market.vehicle WHERE id = $1 AND deleted_at IS NULL)"
            }
            ReportTarget::Store => "SELECT EXISTS(SELECT 1 FROM market.store WHERE id = $1)",
            ReportTarget::User => "SELECT EXISTS(SELECT 1 FROM market.user WHERE id = $1)",
            ReportTarget::Post => "SELECT EXISTS(SELECT 1 FROM market.community_post WHERE id = $1)",
            ReportTarget::Comment => {
                "SELECT EXISTS(SELECT 1 FROM market.community_comment WHERE id = $1)"
            }
        };
        let exists: bool = sqlx::query_scalar(sql).bind(id).fetch_one(self.pool).await?;
        Ok(exists)
    }

    /// File a report.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the reporter already has an open
    /// report on the same target.
    pub async fn create(&self, reporter_id: UserId, new: &NewReport) -> Result<Report, RepositoryError> {
        let id: ReportId = sqlx::query_scalar(
            r"
            INSERT INTO market.report (reporter_id, target_type, target_id, reason, details)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            ",
        )
        .bind(reporter_id)
        .bind(new.target_type)
        .bind(new.target_id)
        .bind(&new.reason)
        .bind(new.details.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "you already reported this"))?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ReportId) -> Result<Option<Report>, RepositoryError> {
        let sql = format!("{REPORT_SELECT} WHERE r.id = $1");
        let report = sqlx::query_as::<_, Report>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(report)
    }

    /// Reports for the moderation queue, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<ReportStatus>,
        page: PageRequest,
    ) -> Result<Page<Report>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "{REPORT_SELECT} WHERE ($1::market.report_status IS NULL OR r.status = $1) \
             ORDER BY r.created_at ASC, r.id ASC LIMIT $2 OFFSET $3"
        );
        let items = sqlx::query_as::<_, Report>(&sql)
            .bind(status)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&mut *tx)
            .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM market.report r \
             WHERE ($1::market.report_status IS NULL OR r.status = $1)",
        )
        .bind(status)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Page::new(items, total, page))
    }

    /// Close an open report and tell the reporter.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the report does not exist,
    /// `RepositoryError::Conflict` if it is no longer open.
    pub async fn resolve(
        &self,
        id: ReportId,
        status: ReportStatus,
        note: Option<&str>,
        admin_id: UserId,
    ) -> Result<Report, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(ReportStatus, UserId, ReportTarget)> = sqlx::query_as(
            "SELECT status, reporter_id, target_type FROM market.report WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((current, reporter_id, target)) = current else {
            return Err(RepositoryError::NotFound);
        };

        if current != ReportStatus::Open {
            return Err(RepositoryError::Conflict(format!("report is already {current}")));
        }

        sqlx::query(
            r"
            UPDATE market.report
            SET status = $2, resolution_note = $3, resolved_by = $4, resolved_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(status)
        .bind(note)
        .bind(admin_id)
        .execute(&mut *tx)
        .await?;

        let notification = NewNotification::new(
            reporter_id,
            NotificationKind::Report,
            "Report reviewed",
            format!("Your report about a {target} was {status}"),
        );
        notifications::insert_in(&mut tx, &notification).await?;

        tx.commit().await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }
}
