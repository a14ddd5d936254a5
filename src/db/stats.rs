use super::Database;
use crate::error::Result;
use crate::models::DashboardStats;

impl Database {
    /// Counts of live rows; keys are counted by distinct name across projects.
    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        let (total_projects, total_languages, total_translations, total_keys): (i64, i64, i64, i64) =
            sqlx::query_as(
                "SELECT
                    (SELECT COUNT(*) FROM projects WHERE deleted_at IS NULL),
                    (SELECT COUNT(*) FROM languages WHERE deleted_at IS NULL),
                    (SELECT COUNT(*) FROM translations WHERE deleted_at IS NULL),
                    (SELECT COUNT(DISTINCT key_name) FROM translations WHERE deleted_at IS NULL)",
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(DashboardStats {
            total_projects,
            total_languages,
            total_translations,
            total_keys,
        })
    }
}
