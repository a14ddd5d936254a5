use chrono::Utc;

use super::Database;
use crate::error::Result;
use crate::models::{Actor, CreateProjectParams, Project};

const PROJECT_COLUMNS: &str =
    "id, name, slug, description, status, created_by, updated_by, created_at, updated_at";

impl Database {
    pub async fn insert_project(
        &self,
        params: &CreateProjectParams,
        slug: &str,
        actor: &Actor,
    ) -> Result<Project> {
        let now = Utc::now();
        let project = sqlx::query_as::<_, Project>(&format!(
            "INSERT INTO projects (name, slug, description, status, created_by, updated_by, created_at, updated_at)
             VALUES (?, ?, ?, 'active', ?, ?, ?, ?)
             RETURNING {}",
            PROJECT_COLUMNS
        ))
        .bind(params.name.trim())
        .bind(slug)
        .bind(params.description.trim())
        .bind(actor.id)
        .bind(actor.id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(project)
    }

    pub async fn get_project(&self, id: i64) -> Result<Option<Project>> {
        let project = sqlx::query_as::<_, Project>(&format!(
            "SELECT {} FROM projects WHERE id = ? AND deleted_at IS NULL",
            PROJECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(project)
    }

    /// Whether a live project already uses `slug`.
    pub async fn project_slug_taken(&self, slug: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM projects WHERE slug = ? AND deleted_at IS NULL",
        )
        .bind(slug)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Projects ordered by id; `limit <= 0` returns all.
    pub async fn list_projects(&self, limit: i64, offset: i64) -> Result<(Vec<Project>, i64)> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE deleted_at IS NULL")
                .fetch_one(&self.pool)
                .await?;

        let projects = sqlx::query_as::<_, Project>(&format!(
            "SELECT {} FROM projects WHERE deleted_at IS NULL ORDER BY id LIMIT ? OFFSET ?",
            PROJECT_COLUMNS
        ))
        .bind(if limit > 0 { limit } else { -1 })
        .bind(offset.max(0))
        .fetch_all(&self.pool)
        .await?;

        Ok((projects, total))
    }

    /// Soft delete. Returns false when the project was absent or already deleted.
    pub async fn soft_delete_project(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE projects SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(Utc::now())
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Ids from `ids` with no live project, sorted.
    pub async fn missing_project_ids(&self, ids: &[i64]) -> Result<Vec<i64>> {
        let mut missing = Vec::new();
        for &id in ids {
            if self.get_project(id).await?.is_none() {
                missing.push(id);
            }
        }
        missing.sort_unstable();
        missing.dedup();
        Ok(missing)
    }
}
