use async_trait::async_trait;
use std::sync::Arc;

use super::DashboardService;
use crate::cache::{keys, CacheService};
use crate::db::Database;
use crate::error::Result;
use crate::models::DashboardStats;

#[derive(Clone)]
pub struct DashboardManager {
    db: Database,
}

impl DashboardManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DashboardService for DashboardManager {
    async fn get_stats(&self) -> Result<DashboardStats> {
        self.db.dashboard_stats().await
    }
}

/// Counters are cached for the long TTL; every write path drops the key.
pub struct CachedDashboardService<S> {
    inner: S,
    cache: Arc<CacheService>,
}

impl<S: DashboardService> CachedDashboardService<S> {
    pub fn new(inner: S, cache: Arc<CacheService>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl<S: DashboardService> DashboardService for CachedDashboardService<S> {
    async fn get_stats(&self) -> Result<DashboardStats> {
        self.cache
            .read_through(keys::DASHBOARD_STATS, self.cache.config().long_ttl, || {
                self.inner.get_stats()
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_support::test_config;
    use crate::cache::MemoryCache;
    use crate::db::test_support::{create_test_db, seed};
    use crate::models::{Actor, TranslationInput};
    use crate::service::{CachedTranslationService, TranslationManager, TranslationService};

    #[tokio::test]
    async fn test_stats_cached_until_write() {
        let (db, _temp_dir) = create_test_db().await;
        let (project, en, _) = seed(&db).await;
        let store = Arc::new(MemoryCache::new());
        let cache = Arc::new(CacheService::new(store.clone(), test_config()));
        let dashboard = CachedDashboardService::new(DashboardManager::new(db.clone()), cache.clone());
        let translations =
            CachedTranslationService::new(TranslationManager::new(db.clone()), cache.clone());

        let stats = dashboard.get_stats().await.unwrap();
        assert_eq!((stats.total_projects, stats.total_languages), (1, 2));
        assert_eq!(stats.total_translations, 0);
        assert!(store.keys().contains(&"i18n:dashboard:stats".to_string()));

        translations
            .create(TranslationInput::new(project.id, "k", en.id, "v"), &Actor::system())
            .await
            .unwrap();

        let stats = dashboard.get_stats().await.unwrap();
        assert_eq!(stats.total_translations, 1);
        assert_eq!(stats.total_keys, 1);
        assert_eq!(cache.metrics().hits, 0);
    }
}
