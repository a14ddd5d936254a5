use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::TranslationService;
use crate::cache::{keys, CacheService};
use crate::error::{Entity, Error, Result};
use crate::models::{
    Actor, BatchTranslationParams, KeyWindow, MatrixPage, Translation, TranslationInput,
    TranslationPage, TranslationPatch,
};
use crate::transfer::{self, ExportFormat};

/// Read-through caching in front of any [`TranslationService`].
///
/// Reads go through the cache; successful writes drop every key that could
/// now be stale: the project's matrix and list pages, the touched entity
/// keys and the dashboard counters.
pub struct CachedTranslationService<S> {
    inner: S,
    cache: Arc<CacheService>,
}

impl<S: TranslationService> CachedTranslationService<S> {
    pub fn new(inner: S, cache: Arc<CacheService>) -> Self {
        Self { inner, cache }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn invalidate_projects(&self, project_ids: impl IntoIterator<Item = i64>) {
        for project_id in project_ids.into_iter().collect::<BTreeSet<_>>() {
            self.cache
                .invalidate_prefix(&keys::matrix_prefix(project_id))
                .await;
            self.cache
                .invalidate_prefix(&keys::translation_list_prefix(project_id))
                .await;
        }
        self.cache.invalidate(keys::DASHBOARD_STATS).await;
    }

    /// After batch writes the touched ids are not all known up front.
    async fn invalidate_entities(&self) {
        self.cache
            .invalidate_prefix(keys::TRANSLATION_ENTITIES)
            .await;
    }
}

#[async_trait]
impl<S: TranslationService> TranslationService for CachedTranslationService<S> {
    async fn create(&self, input: TranslationInput, actor: &Actor) -> Result<Translation> {
        let translation = self.inner.create(input, actor).await?;
        self.cache.invalidate(&keys::translation(translation.id)).await;
        self.invalidate_projects([translation.project_id]).await;
        Ok(translation)
    }

    async fn create_batch(&self, inputs: &[TranslationInput]) -> Result<Vec<Translation>> {
        let created = self.inner.create_batch(inputs).await?;
        self.invalidate_entities().await;
        self.invalidate_projects(inputs.iter().map(|i| i.project_id))
            .await;
        Ok(created)
    }

    async fn create_batch_from_request(&self, params: BatchTranslationParams) -> Result<()> {
        let project_id = params.project_id;
        self.inner.create_batch_from_request(params).await?;
        self.invalidate_entities().await;
        self.invalidate_projects([project_id]).await;
        Ok(())
    }

    async fn upsert_batch(&self, inputs: &[TranslationInput]) -> Result<()> {
        self.inner.upsert_batch(inputs).await?;
        if !inputs.is_empty() {
            self.invalidate_entities().await;
            self.invalidate_projects(inputs.iter().map(|i| i.project_id))
                .await;
        }
        Ok(())
    }

    async fn get_by_id(&self, id: i64) -> Result<Translation> {
        let found: Option<Translation> = self
            .cache
            .read_through(&keys::translation(id), self.cache.config().default_ttl, || async move {
                match self.inner.get_by_id(id).await {
                    Ok(translation) => Ok(Some(translation)),
                    Err(e) if e.is_not_found() => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .await?;
        found.ok_or(Error::NotFound(Entity::Translation(id)))
    }

    async fn get_by_project_id(
        &self,
        project_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<TranslationPage> {
        self.cache
            .read_through(
                &keys::translation_list(project_id, limit, offset),
                self.cache.config().default_ttl,
                || self.inner.get_by_project_id(project_id, limit, offset),
            )
            .await
    }

    async fn get_matrix(
        &self,
        project_id: i64,
        limit: i64,
        offset: i64,
        keyword: &str,
    ) -> Result<MatrixPage> {
        let window = KeyWindow::from_limit_offset(limit, offset);
        let ttl = if keyword.trim().is_empty() {
            self.cache.config().default_ttl
        } else {
            self.cache.config().search_ttl
        };
        self.cache
            .read_through(&keys::matrix(project_id, window, keyword), ttl, || {
                self.inner.get_matrix(project_id, limit, offset, keyword)
            })
            .await
    }

    async fn update(
        &self,
        id: i64,
        patch: TranslationPatch,
        actor: &Actor,
    ) -> Result<Translation> {
        // A move to another project leaves the old project's pages stale too
        let previous_project = match patch.project_id {
            Some(_) => self.inner.get_by_id(id).await.ok().map(|t| t.project_id),
            None => None,
        };

        let updated = self.inner.update(id, patch, actor).await?;
        self.cache.invalidate(&keys::translation(id)).await;
        self.invalidate_projects(previous_project.into_iter().chain([updated.project_id]))
            .await;
        Ok(updated)
    }

    async fn delete(&self, id: i64, actor: &Actor) -> Result<()> {
        let project_id = self.inner.get_by_id(id).await.ok().map(|t| t.project_id);

        self.inner.delete(id, actor).await?;
        self.cache.invalidate(&keys::translation(id)).await;
        self.invalidate_projects(project_id).await;
        Ok(())
    }

    async fn delete_batch(&self, ids: &[i64]) -> Result<()> {
        let mut project_ids = BTreeSet::new();
        for &id in ids {
            if let Ok(translation) = self.inner.get_by_id(id).await {
                project_ids.insert(translation.project_id);
            }
        }

        self.inner.delete_batch(ids).await?;
        if !ids.is_empty() {
            self.invalidate_entities().await;
            self.invalidate_projects(project_ids).await;
        }
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
        let count = self.inner.import(project_id, data, format, actor).await?;
        self.invalidate_entities().await;
        self.invalidate_projects([project_id]).await;
        Ok(count)
    }
}
