use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite};
use std::collections::HashMap;

use super::{Database, BATCH_CHUNK_SIZE};
use crate::error::{ConflictingKey, Error, Result};
use crate::models::{Translation, TranslationInput, TranslationStatus};

const TRANSLATION_COLUMNS: &str = "id, project_id, key_name, context, language_id, value, status, \
     created_by, updated_by, created_at, updated_at, deleted_at";

const INSERT_COLUMNS: &str = "INSERT INTO translations \
     (project_id, key_name, context, language_id, value, status, created_by, updated_by, created_at, updated_at) ";

/// Collapse inputs addressing the same triple, keeping the last one in input order.
pub(crate) fn dedup_last_wins(inputs: &[TranslationInput]) -> Vec<TranslationInput> {
    let mut position: HashMap<(i64, &str, i64), usize> = HashMap::new();
    let mut unique: Vec<TranslationInput> = Vec::with_capacity(inputs.len());
    for input in inputs {
        let triple = (input.project_id, input.key_name.as_str(), input.language_id);
        match position.get(&triple) {
            Some(&at) => unique[at] = input.clone(),
            None => {
                position.insert(triple, unique.len());
                unique.push(input.clone());
            }
        }
    }
    unique
}

impl Database {
    pub async fn get_translation(&self, id: i64) -> Result<Option<Translation>> {
        let translation = sqlx::query_as::<_, Translation>(&format!(
            "SELECT {} FROM translations WHERE id = ? AND deleted_at IS NULL",
            TRANSLATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(translation)
    }

    /// Rows of one project ordered by key then language; `limit <= 0` returns all.
    pub async fn list_translations(
        &self,
        project_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Translation>, i64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM translations WHERE project_id = ? AND deleted_at IS NULL",
        )
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?;

        let translations = sqlx::query_as::<_, Translation>(&format!(
            "SELECT {} FROM translations
             WHERE project_id = ? AND deleted_at IS NULL
             ORDER BY key_name, language_id, id
             LIMIT ? OFFSET ?",
            TRANSLATION_COLUMNS
        ))
        .bind(project_id)
        .bind(if limit > 0 { limit } else { -1 })
        .bind(offset.max(0))
        .fetch_all(&self.pool)
        .await?;

        Ok((translations, total))
    }

    /// Triples from `inputs` that already have a live row, sorted.
    pub async fn find_existing_translations(
        &self,
        inputs: &[TranslationInput],
    ) -> Result<Vec<ConflictingKey>> {
        let mut conn = self.pool.acquire().await?;
        find_existing(&mut *conn, inputs).await
    }

    pub async fn insert_translation(
        &self,
        input: &TranslationInput,
        actor_id: i64,
    ) -> Result<Translation> {
        let now = Utc::now();
        let translation = sqlx::query_as::<_, Translation>(&format!(
            "{} VALUES (?, ?, ?, ?, ?, 'active', ?, ?, ?, ?) RETURNING {}",
            INSERT_COLUMNS, TRANSLATION_COLUMNS
        ))
        .bind(input.project_id)
        .bind(&input.key_name)
        .bind(&input.context)
        .bind(input.language_id)
        .bind(&input.value)
        .bind(actor_id)
        .bind(actor_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(translation)
    }

    /// Strict batch create: one transaction, rejected whole if any triple already exists.
    pub async fn insert_translations(
        &self,
        inputs: &[TranslationInput],
        actor_id: i64,
    ) -> Result<Vec<Translation>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;

        let existing = find_existing(&mut *tx, inputs).await?;
        if !existing.is_empty() {
            return Err(Error::conflict("translations already exist", existing));
        }

        let now = Utc::now();
        let mut created = Vec::with_capacity(inputs.len());
        for chunk in inputs.chunks(BATCH_CHUNK_SIZE) {
            let mut builder = QueryBuilder::<Sqlite>::new(INSERT_COLUMNS);
            builder.push_values(chunk, |mut row, input| {
                row.push_bind(input.project_id)
                    .push_bind(input.key_name.clone())
                    .push_bind(input.context.clone())
                    .push_bind(input.language_id)
                    .push_bind(input.value.clone())
                    .push_bind("active")
                    .push_bind(actor_id)
                    .push_bind(actor_id)
                    .push_bind(now)
                    .push_bind(now);
            });
            builder.push(" RETURNING ");
            builder.push(TRANSLATION_COLUMNS);

            let rows = builder
                .build_query_as::<Translation>()
                .fetch_all(&mut *tx)
                .await?;
            created.extend(rows);
        }

        tx.commit().await?;
        Ok(created)
    }

    /// Create-or-update in one transaction. Colliding triples get the new
    /// value, context and `updated_at`; duplicates in `inputs` collapse to the last.
    pub async fn upsert_translations(
        &self,
        inputs: &[TranslationInput],
        actor_id: i64,
    ) -> Result<u64> {
        if inputs.is_empty() {
            return Ok(0);
        }

        let unique = dedup_last_wins(inputs);
        let now = Utc::now();
        let mut affected = 0;

        let mut tx = self.pool.begin().await?;
        for chunk in unique.chunks(BATCH_CHUNK_SIZE) {
            let mut builder = QueryBuilder::<Sqlite>::new(INSERT_COLUMNS);
            builder.push_values(chunk, |mut row, input| {
                row.push_bind(input.project_id)
                    .push_bind(input.key_name.clone())
                    .push_bind(input.context.clone())
                    .push_bind(input.language_id)
                    .push_bind(input.value.clone())
                    .push_bind("active")
                    .push_bind(actor_id)
                    .push_bind(actor_id)
                    .push_bind(now)
                    .push_bind(now);
            });
            builder.push(
                " ON CONFLICT(project_id, key_name, language_id) WHERE deleted_at IS NULL \
                 DO UPDATE SET value = excluded.value, context = excluded.context, \
                 updated_by = excluded.updated_by, updated_at = excluded.updated_at",
            );
            affected += builder.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;

        Ok(affected)
    }

    /// Overwrite the mutable fields of a live row. `None` when the row does not exist.
    pub async fn update_translation(
        &self,
        id: i64,
        fields: &TranslationInput,
        status: TranslationStatus,
        actor_id: i64,
    ) -> Result<Option<Translation>> {
        let translation = sqlx::query_as::<_, Translation>(&format!(
            "UPDATE translations
             SET project_id = ?, language_id = ?, key_name = ?, context = ?, value = ?,
                 status = ?, updated_by = ?, updated_at = ?
             WHERE id = ? AND deleted_at IS NULL
             RETURNING {}",
            TRANSLATION_COLUMNS
        ))
        .bind(fields.project_id)
        .bind(fields.language_id)
        .bind(&fields.key_name)
        .bind(&fields.context)
        .bind(&fields.value)
        .bind(status)
        .bind(actor_id)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(translation)
    }

    /// Soft delete. Returns false when the row was absent or already deleted.
    pub async fn soft_delete_translation(&self, id: i64) -> Result<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE translations SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Soft delete many rows; returns the affected rows (already-deleted and unknown ids are skipped).
    pub async fn soft_delete_translations(&self, ids: &[i64]) -> Result<Vec<Translation>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let mut deleted = Vec::with_capacity(ids.len());
        let mut tx = self.pool.begin().await?;
        for chunk in ids.chunks(BATCH_CHUNK_SIZE) {
            let mut builder = QueryBuilder::<Sqlite>::new("UPDATE translations SET deleted_at = ");
            builder.push_bind(now);
            builder.push(", updated_at = ");
            builder.push_bind(now);
            builder.push(" WHERE deleted_at IS NULL AND id IN (");
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(") RETURNING ");
            builder.push(TRANSLATION_COLUMNS);

            let rows = builder
                .build_query_as::<Translation>()
                .fetch_all(&mut *tx)
                .await?;
            deleted.extend(rows);
        }
        tx.commit().await?;
        Ok(deleted)
    }
}

async fn find_existing(
    conn: &mut sqlx::SqliteConnection,
    inputs: &[TranslationInput],
) -> Result<Vec<ConflictingKey>> {
    let mut existing = Vec::new();
    for chunk in inputs.chunks(BATCH_CHUNK_SIZE) {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT project_id, key_name, language_id FROM translations WHERE deleted_at IS NULL AND (",
        );
        for (i, input) in chunk.iter().enumerate() {
            if i > 0 {
                builder.push(" OR ");
            }
            builder.push("(project_id = ");
            builder.push_bind(input.project_id);
            builder.push(" AND key_name = ");
            builder.push_bind(input.key_name.clone());
            builder.push(" AND language_id = ");
            builder.push_bind(input.language_id);
            builder.push(")");
        }
        builder.push(")");

        let rows: Vec<(i64, String, i64)> = builder.build_query_as().fetch_all(&mut *conn).await?;
        existing.extend(rows.into_iter().map(|(project_id, key_name, language_id)| {
            ConflictingKey {
                project_id,
                key_name,
                language_id,
            }
        }));
    }
    existing.sort();
    existing.dedup();
    Ok(existing)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{create_test_db, seed};
    use super::*;

    async fn count_rows(db: &Database) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM translations WHERE deleted_at IS NULL")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    // ==================== dedup_last_wins Tests ====================

    #[test]
    fn test_dedup_keeps_last_value_in_first_position() {
        let inputs = vec![
            TranslationInput::new(1, "a", 1, "first"),
            TranslationInput::new(1, "b", 1, "other"),
            TranslationInput::new(1, "a", 1, "second"),
        ];
        let unique = dedup_last_wins(&inputs);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].key_name, "a");
        assert_eq!(unique[0].value, "second");
        assert_eq!(unique[1].key_name, "b");
    }

    // ==================== Insert Tests ====================

    #[tokio::test]
    async fn test_insert_and_get_translation() {
        let (db, _temp_dir) = create_test_db().await;
        let (project, en, _) = seed(&db).await;

        let input = TranslationInput::new(project.id, "home.title", en.id, "Home").with_context("nav");
        let created = db.insert_translation(&input, 5).await.unwrap();
        assert_eq!(created.key_name, "home.title");
        assert_eq!(created.context, "nav");
        assert_eq!(created.created_by, 5);
        assert!(created.deleted_at.is_none());

        assert_eq!(db.get_translation(created.id).await.unwrap(), Some(created));
    }

    #[tokio::test]
    async fn test_insert_duplicate_triple_is_conflict() {
        let (db, _temp_dir) = create_test_db().await;
        let (project, en, _) = seed(&db).await;
        let input = TranslationInput::new(project.id, "k", en.id, "v");

        db.insert_translation(&input, 0).await.unwrap();
        let err = db.insert_translation(&input, 0).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_soft_deleted_triple_can_be_recreated() {
        let (db, _temp_dir) = create_test_db().await;
        let (project, en, _) = seed(&db).await;
        let input = TranslationInput::new(project.id, "k", en.id, "v");

        let first = db.insert_translation(&input, 0).await.unwrap();
        assert!(db.soft_delete_translation(first.id).await.unwrap());
        let second = db.insert_translation(&input, 0).await.unwrap();
        assert_ne!(first.id, second.id);
    }

    // ==================== Batch Tests ====================

    #[tokio::test]
    async fn test_insert_translations_rejects_whole_batch_on_collision() {
        let (db, _temp_dir) = create_test_db().await;
        let (project, en, fr) = seed(&db).await;
        db.insert_translation(&TranslationInput::new(project.id, "a.b", en.id, "Hello"), 0)
            .await
            .unwrap();

        let batch = vec![
            TranslationInput::new(project.id, "new.key", en.id, "New"),
            TranslationInput::new(project.id, "a.b", fr.id, "Bonjour"),
            TranslationInput::new(project.id, "a.b", en.id, "Hi"),
        ];
        let err = db.insert_translations(&batch, 0).await.unwrap_err();
        match err {
            Error::Conflict { conflicts, .. } => {
                assert_eq!(
                    conflicts,
                    vec![ConflictingKey {
                        project_id: project.id,
                        key_name: "a.b".to_string(),
                        language_id: en.id,
                    }]
                );
            }
            other => panic!("expected conflict, got {:?}", other),
        }
        assert_eq!(count_rows(&db).await, 1);
    }

    #[tokio::test]
    async fn test_insert_translations_returns_created_rows() {
        let (db, _temp_dir) = create_test_db().await;
        let (project, en, fr) = seed(&db).await;

        let created = db
            .insert_translations(
                &[
                    TranslationInput::new(project.id, "a", en.id, "A"),
                    TranslationInput::new(project.id, "a", fr.id, "Á"),
                ],
                9,
            )
            .await
            .unwrap();
        assert_eq!(created.len(), 2);
        assert!(created.iter().all(|t| t.created_by == 9));
        assert_eq!(count_rows(&db).await, 2);
    }

    #[tokio::test]
    async fn test_upsert_updates_in_place() {
        let (db, _temp_dir) = create_test_db().await;
        let (project, en, fr) = seed(&db).await;
        let original = db
            .insert_translation(&TranslationInput::new(project.id, "a", en.id, "old"), 0)
            .await
            .unwrap();

        db.upsert_translations(
            &[
                TranslationInput::new(project.id, "a", en.id, "new").with_context("ctx"),
                TranslationInput::new(project.id, "a", fr.id, "nouveau"),
            ],
            0,
        )
        .await
        .unwrap();

        let updated = db.get_translation(original.id).await.unwrap().unwrap();
        assert_eq!(updated.value, "new");
        assert_eq!(updated.context, "ctx");
        assert!(updated.updated_at >= original.updated_at);
        assert_eq!(count_rows(&db).await, 2);
    }

    #[tokio::test]
    async fn test_upsert_empty_is_noop() {
        let (db, _temp_dir) = create_test_db().await;
        assert_eq!(db.upsert_translations(&[], 0).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upsert_spanning_chunks() {
        let (db, _temp_dir) = create_test_db().await;
        let (project, en, _) = seed(&db).await;
        let inputs: Vec<_> = (0..BATCH_CHUNK_SIZE + 7)
            .map(|i| TranslationInput::new(project.id, &format!("key.{:04}", i), en.id, "v"))
            .collect();

        db.upsert_translations(&inputs, 0).await.unwrap();
        assert_eq!(count_rows(&db).await, inputs.len() as i64);
    }

    // ==================== Update / Delete Tests ====================

    #[tokio::test]
    async fn test_update_translation() {
        let (db, _temp_dir) = create_test_db().await;
        let (project, en, _) = seed(&db).await;
        let created = db
            .insert_translation(&TranslationInput::new(project.id, "a", en.id, "old"), 0)
            .await
            .unwrap();

        let fields = TranslationInput::new(project.id, "a", en.id, "new");
        let updated = db
            .update_translation(created.id, &fields, TranslationStatus::Deprecated, 4)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.value, "new");
        assert_eq!(updated.status, TranslationStatus::Deprecated);
        assert_eq!(updated.updated_by, 4);

        assert!(db
            .update_translation(999, &fields, TranslationStatus::Active, 4)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_soft_delete_translations_skips_unknown() {
        let (db, _temp_dir) = create_test_db().await;
        let (project, en, fr) = seed(&db).await;
        let a = db
            .insert_translation(&TranslationInput::new(project.id, "a", en.id, "A"), 0)
            .await
            .unwrap();
        let b = db
            .insert_translation(&TranslationInput::new(project.id, "a", fr.id, "B"), 0)
            .await
            .unwrap();

        let deleted = db.soft_delete_translations(&[a.id, 999]).await.unwrap();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].id, a.id);
        assert!(deleted[0].deleted_at.is_some());

        let (rows, total) = db.list_translations(project.id, -1, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].id, b.id);
    }
}
