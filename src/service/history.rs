use tracing::{debug, warn};

use crate::db::{Database, HistoryScope};
use crate::error::Result;
use crate::models::{HistoryPage, HistoryQuery, NewHistoryEntry};

/// Append-only audit trail of translation changes.
#[derive(Clone)]
pub struct HistoryRecorder {
    db: Database,
}

impl HistoryRecorder {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Write one record. Failures are logged and never returned.
    pub async fn record(&self, entry: NewHistoryEntry) {
        match self.db.insert_history(&entry).await {
            Ok(id) => debug!(
                history_id = id,
                operation = %entry.operation,
                key = %entry.key_name,
                "Recorded translation history"
            ),
            Err(e) => warn!(
                "Failed to record {} history for key '{}' (translation {:?}): {}",
                entry.operation, entry.key_name, entry.translation_id, e
            ),
        }
    }

    pub async fn list_by_translation_id(
        &self,
        translation_id: i64,
        query: &HistoryQuery,
    ) -> Result<HistoryPage> {
        self.db
            .list_history(HistoryScope::Translation(translation_id), query)
            .await
    }

    pub async fn list_by_project_id(
        &self,
        project_id: i64,
        query: &HistoryQuery,
    ) -> Result<HistoryPage> {
        self.db
            .list_history(HistoryScope::Project(project_id), query)
            .await
    }

    pub async fn list_by_user_id(&self, user_id: i64, query: &HistoryQuery) -> Result<HistoryPage> {
        self.db.list_history(HistoryScope::User(user_id), query).await
    }
}
