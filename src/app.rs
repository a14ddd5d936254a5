//! Wiring: every service decorated with the shared cache.

use std::sync::Arc;

use crate::cache::CacheService;
use crate::db::Database;
use crate::service::{
    CachedDashboardService, CachedLanguageService, CachedProjectService,
    CachedTranslationService, DashboardManager, DashboardService, HistoryRecorder,
    LanguageManager, LanguageService, ProjectManager, ProjectService, TranslationManager,
    TranslationService,
};
use crate::sync::SyncService;

#[derive(Clone)]
pub struct App {
    pub db: Database,
    pub cache: Arc<CacheService>,
    pub translations: Arc<dyn TranslationService>,
    pub languages: Arc<dyn LanguageService>,
    pub projects: Arc<dyn ProjectService>,
    pub dashboard: Arc<dyn DashboardService>,
    pub history: HistoryRecorder,
    pub sync: Arc<SyncService>,
}

impl App {
    pub fn new(db: Database, cache: Arc<CacheService>) -> Self {
        let translations: Arc<dyn TranslationService> = Arc::new(CachedTranslationService::new(
            TranslationManager::new(db.clone()),
            cache.clone(),
        ));
        let languages: Arc<dyn LanguageService> = Arc::new(CachedLanguageService::new(
            LanguageManager::new(db.clone()),
            cache.clone(),
        ));
        let projects: Arc<dyn ProjectService> = Arc::new(CachedProjectService::new(
            ProjectManager::new(db.clone()),
            cache.clone(),
        ));
        let dashboard: Arc<dyn DashboardService> = Arc::new(CachedDashboardService::new(
            DashboardManager::new(db.clone()),
            cache.clone(),
        ));
        let sync = Arc::new(SyncService::new(
            translations.clone(),
            projects.clone(),
            languages.clone(),
        ));

        Self {
            history: HistoryRecorder::new(db.clone()),
            db,
            cache,
            translations,
            languages,
            projects,
            dashboard,
            sync,
        }
    }
}
