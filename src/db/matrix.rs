//! Matrix Builder: pivots `(key, language) -> value` rows into a nested map.
//!
//! Pagination is over distinct key names, never over value rows, so a page
//! always carries every language of each key it contains:
//!
//! 1. resolve the ordered set of key names matching the project and keyword;
//! 2. slice it with the [`KeyWindow`];
//! 3. fetch the cells of exactly the keys in the slice and fold them.
//!
//! Only active translations in active languages count. A key whose rows are
//! all deleted or in inactive languages is not part of the set, so every key
//! on a page has at least one cell.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;

use super::{Database, BATCH_CHUNK_SIZE};
use crate::error::Result;
use crate::models::{KeyWindow, MatrixPage, TranslationCell};

const LIVE_CELL_JOIN: &str = "FROM translations t
     JOIN languages l ON l.id = t.language_id
     WHERE t.deleted_at IS NULL AND t.status = 'active'
       AND l.deleted_at IS NULL AND l.status = 'active'";

#[derive(sqlx::FromRow)]
struct CellRow {
    id: i64,
    key_name: String,
    code: String,
    value: String,
    updated_at: DateTime<Utc>,
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
fn like_pattern(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len() + 2);
    escaped.push('%');
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

impl Database {
    /// Ordered, deduplicated key names of a project, optionally filtered by a
    /// keyword matched against key names and values.
    pub async fn matrix_key_names(&self, project_id: i64, keyword: &str) -> Result<Vec<String>> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT DISTINCT t.key_name ");
        builder.push(LIVE_CELL_JOIN);
        builder.push(" AND t.project_id = ");
        builder.push_bind(project_id);

        let keyword = keyword.trim();
        if !keyword.is_empty() {
            let pattern = like_pattern(keyword);
            builder.push(" AND (t.key_name LIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" ESCAPE '\\' OR t.value LIKE ");
            builder.push_bind(pattern);
            builder.push(" ESCAPE '\\')");
        }
        builder.push(" ORDER BY t.key_name");

        let keys: Vec<String> = builder
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await?;
        Ok(keys)
    }

    /// Build one page of the matrix. `total` counts every matching key,
    /// independent of the window.
    pub async fn build_matrix(
        &self,
        project_id: i64,
        window: KeyWindow,
        keyword: &str,
    ) -> Result<MatrixPage> {
        let keys = self.matrix_key_names(project_id, keyword).await?;
        let total = keys.len() as i64;
        let page_keys = window.slice(&keys);

        let mut page = MatrixPage {
            total,
            ..Default::default()
        };
        if page_keys.is_empty() {
            return Ok(page);
        }

        for chunk in page_keys.chunks(BATCH_CHUNK_SIZE) {
            let mut builder = QueryBuilder::<Sqlite>::new(
                "SELECT t.id, t.key_name, l.code, t.value, t.updated_at ",
            );
            builder.push(LIVE_CELL_JOIN);
            builder.push(" AND t.project_id = ");
            builder.push_bind(project_id);
            builder.push(" AND t.key_name IN (");
            let mut separated = builder.separated(", ");
            for key in chunk {
                separated.push_bind(key.clone());
            }
            separated.push_unseparated(")");

            let rows: Vec<CellRow> = builder.build_query_as().fetch_all(&self.pool).await?;
            for row in rows {
                page.matrix.entry(row.key_name).or_default().insert(
                    row.code,
                    TranslationCell {
                        id: row.id,
                        value: row.value,
                        updated_at: row.updated_at,
                    },
                );
            }
        }

        debug!(
            project_id,
            total,
            page_keys = page.matrix.len(),
            "Built translation matrix"
        );
        Ok(page)
    }
}
