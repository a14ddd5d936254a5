use chrono::{Duration, NaiveTime, Utc};
use sqlx::{QueryBuilder, Sqlite};

use super::Database;
use crate::error::Result;
use crate::models::{HistoryPage, HistoryQuery, NewHistoryEntry, TranslationHistory};

/// Which records a history listing selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryScope {
    Translation(i64),
    Project(i64),
    User(i64),
}

impl HistoryScope {
    fn column(&self) -> &'static str {
        match self {
            HistoryScope::Translation(_) => "translation_id",
            HistoryScope::Project(_) => "project_id",
            HistoryScope::User(_) => "operated_by",
        }
    }

    fn id(&self) -> i64 {
        match *self {
            HistoryScope::Translation(id) | HistoryScope::Project(id) | HistoryScope::User(id) => id,
        }
    }
}

const HISTORY_COLUMNS: &str = "id, translation_id, project_id, key_name, language_id, old_value, \
     new_value, operation, operated_by, operated_at, metadata";

impl Database {
    pub async fn insert_history(&self, entry: &NewHistoryEntry) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO translation_history
             (translation_id, project_id, key_name, language_id, old_value, new_value,
              operation, operated_by, operated_at, metadata)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(entry.translation_id)
        .bind(entry.project_id)
        .bind(&entry.key_name)
        .bind(entry.language_id)
        .bind(&entry.old_value)
        .bind(&entry.new_value)
        .bind(entry.operation)
        .bind(entry.operated_by)
        .bind(Utc::now())
        .bind(&entry.metadata)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Newest first. Dates cover whole calendar days: `start <= operated_at < end + 1 day`.
    pub async fn list_history(
        &self,
        scope: HistoryScope,
        query: &HistoryQuery,
    ) -> Result<HistoryPage> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM translation_history");
        push_filters(&mut count, scope, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM translation_history",
            HISTORY_COLUMNS
        ));
        push_filters(&mut select, scope, query);
        select.push(" ORDER BY operated_at DESC, id DESC LIMIT ");
        select.push_bind(if query.limit > 0 { query.limit } else { -1 });
        select.push(" OFFSET ");
        select.push_bind(query.offset.max(0));

        let records: Vec<TranslationHistory> =
            select.build_query_as().fetch_all(&self.pool).await?;
        Ok(HistoryPage { records, total })
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, scope: HistoryScope, query: &HistoryQuery) {
    builder.push(" WHERE ");
    builder.push(scope.column());
    builder.push(" = ");
    builder.push_bind(scope.id());

    if let Some(operation) = query.operation {
        builder.push(" AND operation = ");
        builder.push_bind(operation);
    }
    if let Some(start) = query.start_date {
        builder.push(" AND operated_at >= ");
        builder.push_bind(start.and_time(NaiveTime::MIN).and_utc());
    }
    if let Some(end) = query.end_date {
        let end_exclusive = end.and_time(NaiveTime::MIN).and_utc() + Duration::days(1);
        builder.push(" AND operated_at < ");
        builder.push_bind(end_exclusive);
    }
}
