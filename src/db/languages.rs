use chrono::Utc;

use super::Database;
use crate::error::Result;
use crate::models::{Actor, CreateLanguageParams, Language, UpdateLanguageParams};

const LANGUAGE_COLUMNS: &str =
    "id, code, name, is_default, status, created_by, updated_by, created_at, updated_at";

impl Database {
    /// Insert a language; a new default clears the flag on every other language.
    pub async fn insert_language(
        &self,
        params: &CreateLanguageParams,
        actor: &Actor,
    ) -> Result<Language> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        if params.is_default {
            sqlx::query("UPDATE languages SET is_default = 0 WHERE deleted_at IS NULL")
                .execute(&mut *tx)
                .await?;
        }

        let language = sqlx::query_as::<_, Language>(&format!(
            "INSERT INTO languages (code, name, is_default, status, created_by, updated_by, created_at, updated_at)
             VALUES (?, ?, ?, 'active', ?, ?, ?, ?)
             RETURNING {}",
            LANGUAGE_COLUMNS
        ))
        .bind(params.code.trim())
        .bind(params.name.trim())
        .bind(params.is_default)
        .bind(actor.id)
        .bind(actor.id)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(language)
    }

    pub async fn get_language(&self, id: i64) -> Result<Option<Language>> {
        let language = sqlx::query_as::<_, Language>(&format!(
            "SELECT {} FROM languages WHERE id = ? AND deleted_at IS NULL",
            LANGUAGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(language)
    }

    pub async fn get_language_by_code(&self, code: &str) -> Result<Option<Language>> {
        let language = sqlx::query_as::<_, Language>(&format!(
            "SELECT {} FROM languages WHERE code = ? AND deleted_at IS NULL",
            LANGUAGE_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(language)
    }

    /// Every non-deleted language, active or not, ordered by id.
    pub async fn list_languages(&self) -> Result<Vec<Language>> {
        let languages = sqlx::query_as::<_, Language>(&format!(
            "SELECT {} FROM languages WHERE deleted_at IS NULL ORDER BY id",
            LANGUAGE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(languages)
    }

    /// The flagged default language, else the first active one.
    pub async fn default_language(&self) -> Result<Option<Language>> {
        let language = sqlx::query_as::<_, Language>(&format!(
            "SELECT {} FROM languages
             WHERE deleted_at IS NULL AND (is_default = 1 OR status = 'active')
             ORDER BY is_default DESC, id
             LIMIT 1",
            LANGUAGE_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await?;
        Ok(language)
    }

    /// Apply a partial update. Returns `None` when the language does not exist.
    pub async fn update_language(
        &self,
        id: i64,
        params: &UpdateLanguageParams,
        actor: &Actor,
    ) -> Result<Option<Language>> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Language>(&format!(
            "SELECT {} FROM languages WHERE id = ? AND deleted_at IS NULL",
            LANGUAGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(current) = current else {
            return Ok(None);
        };

        let is_default = params.is_default.unwrap_or(current.is_default);
        if is_default && !current.is_default {
            sqlx::query("UPDATE languages SET is_default = 0 WHERE deleted_at IS NULL")
                .execute(&mut *tx)
                .await?;
        }

        let updated = sqlx::query_as::<_, Language>(&format!(
            "UPDATE languages SET name = ?, is_default = ?, status = ?, updated_by = ?, updated_at = ?
             WHERE id = ?
             RETURNING {}",
            LANGUAGE_COLUMNS
        ))
        .bind(
            params
                .name
                .as_deref()
                .map(str::trim)
                .unwrap_or(&current.name),
        )
        .bind(is_default)
        .bind(params.status.unwrap_or(current.status))
        .bind(actor.id)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    /// Soft delete. Returns false when the language was absent or already deleted.
    pub async fn soft_delete_language(&self, id: i64) -> Result<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE languages SET deleted_at = ?, updated_at = ?, is_default = 0
             WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Ids from `ids` with no live language, sorted.
    pub async fn missing_language_ids(&self, ids: &[i64]) -> Result<Vec<i64>> {
        let mut missing = Vec::new();
        for &id in ids {
            if self.get_language(id).await?.is_none() {
                missing.push(id);
            }
        }
        missing.sort_unstable();
        missing.dedup();
        Ok(missing)
    }
}
