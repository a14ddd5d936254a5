//! Capability traits and their implementations.
//!
//! Each capability has a plain implementation over [`Database`](crate::db::Database)
//! and a cache decorator implementing the same trait, so callers hold an
//! `Arc<dyn ...>` and do not know whether caching is enabled.

mod cached_translations;
mod dashboard;
mod history;
mod languages;
mod projects;
mod translations;

pub use cached_translations::CachedTranslationService;
pub use dashboard::{CachedDashboardService, DashboardManager};
pub use history::HistoryRecorder;
pub use languages::{seed_known_languages, CachedLanguageService, LanguageManager};
pub use projects::{slugify, CachedProjectService, ProjectManager};
pub use translations::TranslationManager;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    Actor, BatchTranslationParams, CreateLanguageParams, CreateProjectParams, DashboardStats,
    Language, MatrixPage, Project, Translation, TranslationInput, TranslationPage,
    TranslationPatch, UpdateLanguageParams,
};
use crate::transfer::ExportFormat;

#[async_trait]
pub trait TranslationService: Send + Sync {
    /// Create one translation. Fails with `Conflict` if the triple exists.
    async fn create(&self, input: TranslationInput, actor: &Actor) -> Result<Translation>;

    /// All-or-nothing create; the conflict error lists every colliding triple.
    async fn create_batch(&self, inputs: &[TranslationInput]) -> Result<Vec<Translation>>;

    /// One key in several languages addressed by code, written with upsert semantics.
    async fn create_batch_from_request(&self, params: BatchTranslationParams) -> Result<()>;

    /// Create-or-update; never fails with `Conflict`.
    async fn upsert_batch(&self, inputs: &[TranslationInput]) -> Result<()>;

    async fn get_by_id(&self, id: i64) -> Result<Translation>;

    async fn get_by_project_id(
        &self,
        project_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<TranslationPage>;

    /// Page of the matrix over distinct keys. `limit <= 0` returns every key.
    async fn get_matrix(
        &self,
        project_id: i64,
        limit: i64,
        offset: i64,
        keyword: &str,
    ) -> Result<MatrixPage>;

    async fn update(&self, id: i64, patch: TranslationPatch, actor: &Actor)
        -> Result<Translation>;

    async fn delete(&self, id: i64, actor: &Actor) -> Result<()>;

    async fn delete_batch(&self, ids: &[i64]) -> Result<()>;

    /// The full, unpaginated matrix as `{key: {language_code: value}}`.
    async fn export(&self, project_id: i64, format: ExportFormat) -> Result<Vec<u8>>;

    /// Strict import: existing triples make the whole import fail. Returns the rows created.
    async fn import(
        &self,
        project_id: i64,
        data: &[u8],
        format: ExportFormat,
        actor: &Actor,
    ) -> Result<usize>;
}

#[async_trait]
pub trait LanguageService: Send + Sync {
    async fn create(&self, params: CreateLanguageParams, actor: &Actor) -> Result<Language>;

    async fn get_by_id(&self, id: i64) -> Result<Language>;

    /// Every non-deleted language, ordered by id.
    async fn get_all(&self) -> Result<Vec<Language>>;

    async fn get_default(&self) -> Result<Language>;

    async fn update(
        &self,
        id: i64,
        params: UpdateLanguageParams,
        actor: &Actor,
    ) -> Result<Language>;

    async fn delete(&self, id: i64) -> Result<()>;
}

#[async_trait]
pub trait ProjectService: Send + Sync {
    async fn create(&self, params: CreateProjectParams, actor: &Actor) -> Result<Project>;

    async fn get_by_id(&self, id: i64) -> Result<Project>;

    async fn get_all(&self, limit: i64, offset: i64) -> Result<(Vec<Project>, i64)>;

    async fn delete(&self, id: i64) -> Result<()>;
}

#[async_trait]
pub trait DashboardService: Send + Sync {
    async fn get_stats(&self) -> Result<DashboardStats>;
}
