use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{info, warn};

use super::{HistoryRecorder, TranslationService};
use crate::db::Database;
use crate::error::{ConflictingKey, Entity, Error, Result};
use crate::models::{
    Actor, BatchTranslationParams, HistoryOperation, KeyWindow, MatrixPage, NewHistoryEntry,
    Translation, TranslationInput, TranslationPage, TranslationPatch,
};
use crate::transfer::{self, ExportFormat};
use crate::validation::validate_key_name;

/// Translation store over the relational database, without caching.
#[derive(Clone)]
pub struct TranslationManager {
    db: Database,
    history: HistoryRecorder,
}

impl TranslationManager {
    pub fn new(db: Database) -> Self {
        let history = HistoryRecorder::new(db.clone());
        Self { db, history }
    }

    pub fn history(&self) -> &HistoryRecorder {
        &self.history
    }

    async fn require_project(&self, project_id: i64) -> Result<()> {
        match self.db.get_project(project_id).await? {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(Entity::Project(project_id))),
        }
    }

    /// Every project and language referenced by `inputs` must exist.
    async fn ensure_references(&self, inputs: &[TranslationInput]) -> Result<()> {
        let project_ids: Vec<i64> = inputs
            .iter()
            .map(|i| i.project_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if let Some(&id) = self.db.missing_project_ids(&project_ids).await?.first() {
            return Err(Error::NotFound(Entity::Project(id)));
        }

        let language_ids: Vec<i64> = inputs
            .iter()
            .map(|i| i.language_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if let Some(&id) = self.db.missing_language_ids(&language_ids).await?.first() {
            return Err(Error::NotFound(Entity::Language(id)));
        }
        Ok(())
    }

    /// Language code -> id for every non-deleted language.
    async fn language_ids_by_code(&self) -> Result<HashMap<String, i64>> {
        Ok(self
            .db
            .list_languages()
            .await?
            .into_iter()
            .map(|language| (language.code, language.id))
            .collect())
    }

    /// Strict batch create recorded against `actor_id`.
    async fn create_batch_as(
        &self,
        inputs: &[TranslationInput],
        actor_id: i64,
    ) -> Result<Vec<Translation>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let prepared = prepare(inputs)?;
        let duplicates = duplicate_triples(&prepared);
        if !duplicates.is_empty() {
            return Err(Error::conflict("batch contains duplicate translations", duplicates));
        }
        self.ensure_references(&prepared).await?;

        let created = self.db.insert_translations(&prepared, actor_id).await?;
        info!(count = created.len(), "Created translation batch");
        Ok(created)
    }
}

/// Trim and validate every input.
fn prepare(inputs: &[TranslationInput]) -> Result<Vec<TranslationInput>> {
    inputs
        .iter()
        .map(|input| {
            let input = input.normalized();
            validate_key_name(&input.key_name)?;
            Ok(input)
        })
        .collect()
}

/// Triples that occur more than once in `inputs`, sorted.
fn duplicate_triples(inputs: &[TranslationInput]) -> Vec<ConflictingKey> {
    let mut seen = HashSet::new();
    let mut duplicates = BTreeSet::new();
    for input in inputs {
        let triple = ConflictingKey {
            project_id: input.project_id,
            key_name: input.key_name.clone(),
            language_id: input.language_id,
        };
        if !seen.insert(triple.clone()) {
            duplicates.insert(triple);
        }
    }
    duplicates.into_iter().collect()
}

/// Name the colliding triple in a bare uniqueness conflict from the store.
fn with_triple(err: Error, input: &TranslationInput) -> Error {
    match err {
        Error::Conflict { conflicts, .. } if conflicts.is_empty() => Error::conflict(
            "translation already exists",
            vec![ConflictingKey {
                project_id: input.project_id,
                key_name: input.key_name.clone(),
                language_id: input.language_id,
            }],
        ),
        other => other,
    }
}

#[async_trait]
impl TranslationService for TranslationManager {
    async fn create(&self, input: TranslationInput, actor: &Actor) -> Result<Translation> {
        let input = input.normalized();
        validate_key_name(&input.key_name)?;
        self.ensure_references(std::slice::from_ref(&input)).await?;

        let translation = self
            .db
            .insert_translation(&input, actor.id)
            .await
            .map_err(|e| with_triple(e, &input))?;

        self.history
            .record(NewHistoryEntry::for_translation(
                HistoryOperation::Create,
                &translation,
                None,
                Some(translation.value.clone()),
                actor,
            ))
            .await;

        info!(
            id = translation.id,
            key = %translation.key_name,
            actor = %actor.name,
            "Created translation"
        );
        Ok(translation)
    }

    async fn create_batch(&self, inputs: &[TranslationInput]) -> Result<Vec<Translation>> {
        self.create_batch_as(inputs, Actor::system().id).await
    }

    async fn create_batch_from_request(&self, params: BatchTranslationParams) -> Result<()> {
        let codes = self.language_ids_by_code().await?;

        let mut inputs = Vec::new();
        for (code, value) in &params.translations {
            if value.trim().is_empty() {
                continue;
            }
            match codes.get(code) {
                Some(&language_id) => inputs.push(
                    TranslationInput::new(params.project_id, &params.key_name, language_id, value)
                        .with_context(&params.context),
                ),
                None => warn!("Skipping unknown language code '{}'", code),
            }
        }

        if inputs.is_empty() {
            return Err(Error::validation("no valid translations to create"));
        }
        self.upsert_batch(&inputs).await
    }

    async fn upsert_batch(&self, inputs: &[TranslationInput]) -> Result<()> {
        if inputs.is_empty() {
            return Ok(());
        }

        let prepared = prepare(inputs)?;
        self.ensure_references(&prepared).await?;

        let affected = self
            .db
            .upsert_translations(&prepared, Actor::system().id)
            .await?;
        info!(count = prepared.len(), affected, "Upserted translation batch");
        Ok(())
    }

    async fn get_by_id(&self, id: i64) -> Result<Translation> {
        self.db
            .get_translation(id)
            .await?
            .ok_or(Error::NotFound(Entity::Translation(id)))
    }

    async fn get_by_project_id(
        &self,
        project_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<TranslationPage> {
        let (translations, total) = self.db.list_translations(project_id, limit, offset).await?;
        Ok(TranslationPage {
            translations,
            total,
        })
    }

    async fn get_matrix(
        &self,
        project_id: i64,
        limit: i64,
        offset: i64,
        keyword: &str,
    ) -> Result<MatrixPage> {
        self.require_project(project_id).await?;
        self.db
            .build_matrix(project_id, KeyWindow::from_limit_offset(limit, offset), keyword)
            .await
    }

    async fn update(
        &self,
        id: i64,
        patch: TranslationPatch,
        actor: &Actor,
    ) -> Result<Translation> {
        let current = self.get_by_id(id).await?;

        let fields = TranslationInput {
            project_id: patch.project_id.unwrap_or(current.project_id),
            language_id: patch.language_id.unwrap_or(current.language_id),
            key_name: patch.key_name.unwrap_or_else(|| current.key_name.clone()),
            context: patch.context.unwrap_or_else(|| current.context.clone()),
            value: patch.value.unwrap_or_else(|| current.value.clone()),
        }
        .normalized();
        let status = patch.status.unwrap_or(current.status);
        validate_key_name(&fields.key_name)?;
        if fields.project_id != current.project_id || fields.language_id != current.language_id {
            self.ensure_references(std::slice::from_ref(&fields)).await?;
        }

        let updated = self
            .db
            .update_translation(id, &fields, status, actor.id)
            .await
            .map_err(|e| with_triple(e, &fields))?
            .ok_or(Error::NotFound(Entity::Translation(id)))?;

        self.history
            .record(NewHistoryEntry::for_translation(
                HistoryOperation::Update,
                &updated,
                Some(current.value),
                Some(updated.value.clone()),
                actor,
            ))
            .await;

        info!(id, actor = %actor.name, "Updated translation");
        Ok(updated)
    }

    async fn delete(&self, id: i64, actor: &Actor) -> Result<()> {
        let current = self.get_by_id(id).await?;
        if !self.db.soft_delete_translation(id).await? {
            return Err(Error::NotFound(Entity::Translation(id)));
        }

        self.history
            .record(NewHistoryEntry::for_translation(
                HistoryOperation::Delete,
                &current,
                Some(current.value.clone()),
                None,
                actor,
            ))
            .await;

        info!(id, actor = %actor.name, "Deleted translation");
        Ok(())
    }

    async fn delete_batch(&self, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let deleted = self.db.soft_delete_translations(ids).await?;
        info!(
            requested = ids.len(),
            deleted = deleted.len(),
            "Deleted translation batch"
        );
        Ok(())
    }

    async fn export(&self, project_id: i64, format: ExportFormat) -> Result<Vec<u8>> {
        let page = self.get_matrix(project_id, -1, 0, "").await?;
        transfer::export(&page.to_simple(), format)
    }

    async fn import(
        &self,
        project_id: i64,
        data: &[u8],
        format: ExportFormat,
        actor: &Actor,
    ) -> Result<usize> {
        self.require_project(project_id).await?;

        let codes = self.language_ids_by_code().await?;
        let known: HashSet<String> = codes.keys().cloned().collect();
        let document = transfer::parse_import(data, format, &known)?;

        let mut inputs = Vec::new();
        for (key_name, values) in &document.matrix {
            for (code, value) in values {
                match codes.get(code) {
                    Some(&language_id) => inputs.push(TranslationInput::new(
                        project_id,
                        key_name,
                        language_id,
                        value,
                    )),
                    None => warn!("Skipping unknown language code '{}' in import", code),
                }
            }
        }
        if inputs.is_empty() {
            return Err(Error::validation("no valid translations found in import data"));
        }

        let created = self.create_batch_as(&inputs, actor.id).await?;
        for translation in &created {
            self.history
                .record(NewHistoryEntry::for_translation(
                    HistoryOperation::Import,
                    translation,
                    None,
                    Some(translation.value.clone()),
                    actor,
                ))
                .await;
        }

        info!(
            project_id,
            layout = ?document.layout,
            count = created.len(),
            actor = %actor.name,
            "Imported translations"
        );
        Ok(created.len())
    }
}
