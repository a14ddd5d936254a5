use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

use super::LanguageService;
use crate::cache::{keys, CacheService};
use crate::catalog::LanguageCatalog;
use crate::db::Database;
use crate::error::{Entity, Error, Result};
use crate::models::{Actor, CreateLanguageParams, Language, UpdateLanguageParams};
use crate::validation::validate_language_code;

/// Language directory over the relational database.
#[derive(Clone)]
pub struct LanguageManager {
    db: Database,
}

impl LanguageManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LanguageService for LanguageManager {
    async fn create(&self, params: CreateLanguageParams, actor: &Actor) -> Result<Language> {
        let code = params.code.trim().to_string();
        validate_language_code(&code)?;

        let name = match params.name.trim() {
            "" => match LanguageCatalog::get().get_by_code(&code) {
                Some(known) => known.name.to_string(),
                None => {
                    return Err(Error::validation(format!(
                        "a name is required for language '{}'",
                        code
                    )))
                }
            },
            name => name.to_string(),
        };

        if self.db.get_language_by_code(&code).await?.is_some() {
            return Err(Error::conflict(
                &format!("language '{}' already exists", code),
                Vec::new(),
            ));
        }

        let language = self
            .db
            .insert_language(
                &CreateLanguageParams {
                    code: code.clone(),
                    name,
                    is_default: params.is_default,
                },
                actor,
            )
            .await
            .map_err(|e| e.with_conflict_message(|| format!("language '{}' already exists", code)))?;
        info!(
            id = language.id,
            code = %language.code,
            is_default = language.is_default,
            "Created language"
        );
        Ok(language)
    }

    async fn get_by_id(&self, id: i64) -> Result<Language> {
        self.db
            .get_language(id)
            .await?
            .ok_or(Error::NotFound(Entity::Language(id)))
    }

    async fn get_all(&self) -> Result<Vec<Language>> {
        self.db.list_languages().await
    }

    async fn get_default(&self) -> Result<Language> {
        self.db
            .default_language()
            .await?
            .ok_or(Error::NotFound(Entity::DefaultLanguage))
    }

    async fn update(
        &self,
        id: i64,
        params: UpdateLanguageParams,
        actor: &Actor,
    ) -> Result<Language> {
        if let Some(name) = &params.name {
            if name.trim().is_empty() {
                return Err(Error::validation("language name must not be empty"));
            }
        }
        let language = self
            .db
            .update_language(id, &params, actor)
            .await?
            .ok_or(Error::NotFound(Entity::Language(id)))?;
        info!(id, code = %language.code, "Updated language");
        Ok(language)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        if !self.db.soft_delete_language(id).await? {
            return Err(Error::NotFound(Entity::Language(id)));
        }
        info!(id, "Deleted language");
        Ok(())
    }
}

/// Caches the full language list; any write also drops every matrix, whose
/// columns are derived from the directory.
pub struct CachedLanguageService<S> {
    inner: S,
    cache: Arc<CacheService>,
}

impl<S: LanguageService> CachedLanguageService<S> {
    pub fn new(inner: S, cache: Arc<CacheService>) -> Self {
        Self { inner, cache }
    }

    async fn invalidate(&self) {
        self.cache.invalidate(keys::LANGUAGES_ALL).await;
        self.cache.invalidate_prefix(keys::MATRIX_ALL_PROJECTS).await;
        self.cache.invalidate(keys::DASHBOARD_STATS).await;
    }
}

#[async_trait]
impl<S: LanguageService> LanguageService for CachedLanguageService<S> {
    async fn create(&self, params: CreateLanguageParams, actor: &Actor) -> Result<Language> {
        let language = self.inner.create(params, actor).await?;
        self.invalidate().await;
        Ok(language)
    }

    async fn get_by_id(&self, id: i64) -> Result<Language> {
        self.inner.get_by_id(id).await
    }

    async fn get_all(&self) -> Result<Vec<Language>> {
        self.cache
            .read_through(keys::LANGUAGES_ALL, self.cache.config().default_ttl, || {
                self.inner.get_all()
            })
            .await
    }

    async fn get_default(&self) -> Result<Language> {
        self.inner.get_default().await
    }

    async fn update(
        &self,
        id: i64,
        params: UpdateLanguageParams,
        actor: &Actor,
    ) -> Result<Language> {
        let language = self.inner.update(id, params, actor).await?;
        self.invalidate().await;
        Ok(language)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.inner.delete(id).await?;
        self.invalidate().await;
        Ok(())
    }
}

/// Add every catalogue language missing from the directory. Returns how many were added.
///
/// The catalogue default is only flagged when the directory has no default yet.
pub async fn seed_known_languages(service: &dyn LanguageService, actor: &Actor) -> Result<usize> {
    let existing = service.get_all().await?;
    let codes: HashSet<String> = existing.iter().map(|l| l.code.to_lowercase()).collect();
    let has_default = existing.iter().any(|l| l.is_default);

    let mut added = 0;
    for known in LanguageCatalog::get().list() {
        if codes.contains(&known.code.to_lowercase()) {
            continue;
        }
        service
            .create(
                CreateLanguageParams {
                    code: known.code.to_string(),
                    name: known.name.to_string(),
                    is_default: known.is_default && !has_default,
                },
                actor,
            )
            .await?;
        added += 1;
    }

    info!(added, "Seeded known languages");
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_support::test_config;
    use crate::cache::{CacheStore, MemoryCache};
    use crate::db::test_support::{create_test_db, seed};
    use crate::models::LanguageStatus;
    use std::time::Duration;

    fn params(code: &str, name: &str, is_default: bool) -> CreateLanguageParams {
        CreateLanguageParams {
            code: code.to_string(),
            name: name.to_string(),
            is_default,
        }
    }

    // ==================== LanguageManager Tests ====================

    #[tokio::test]
    async fn test_create_uses_catalog_name() {
        let (db, _temp_dir) = create_test_db().await;
        let service = LanguageManager::new(db);
        let language = service
            .create(params(" ja ", "", false), &Actor::system())
            .await
            .unwrap();
        assert_eq!(language.code, "ja");
        assert_eq!(language.name, "Japanese");
        assert_eq!(language.status, LanguageStatus::Active);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input() {
        let (db, _temp_dir) = create_test_db().await;
        let service = LanguageManager::new(db);

        let err = service
            .create(params("not a code", "X", false), &Actor::system())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = service
            .create(params("tlh", "", false), &Actor::system())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("name is required"));
    }

    #[tokio::test]
    async fn test_create_duplicate_code_conflicts() {
        let (db, _temp_dir) = create_test_db().await;
        seed(&db).await;
        let service = LanguageManager::new(db);
        let err = service
            .create(params("fr", "French", false), &Actor::system())
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "language 'fr' already exists");
    }

    #[tokio::test]
    async fn test_default_moves_and_missing_default() {
        let (db, _temp_dir) = create_test_db().await;
        let service = LanguageManager::new(db);
        assert!(service.get_default().await.unwrap_err().is_not_found());

        service
            .create(params("en", "English", true), &Actor::system())
            .await
            .unwrap();
        let de = service
            .create(params("de", "German", true), &Actor::system())
            .await
            .unwrap();
        assert_eq!(service.get_default().await.unwrap().id, de.id);
        let defaults = service
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .filter(|l| l.is_default)
            .count();
        assert_eq!(defaults, 1);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (db, _temp_dir) = create_test_db().await;
        let (_, _, fr) = seed(&db).await;
        let service = LanguageManager::new(db);

        let updated = service
            .update(
                fr.id,
                UpdateLanguageParams {
                    status: Some(LanguageStatus::Inactive),
                    ..Default::default()
                },
                &Actor::new(3, "dana"),
            )
            .await
            .unwrap();
        assert_eq!(updated.status, LanguageStatus::Inactive);
        assert_eq!(updated.name, "French");
        assert_eq!(updated.updated_by, 3);

        service.delete(fr.id).await.unwrap();
        assert!(service.get_by_id(fr.id).await.unwrap_err().is_not_found());
        assert!(service.delete(fr.id).await.unwrap_err().is_not_found());
        assert!(service
            .update(fr.id, UpdateLanguageParams::default(), &Actor::system())
            .await
            .unwrap_err()
            .is_not_found());
    }

    // ==================== Seeding Tests ====================

    #[tokio::test]
    async fn test_seed_known_languages_is_idempotent() {
        let (db, _temp_dir) = create_test_db().await;
        let service = LanguageManager::new(db);
        let total = LanguageCatalog::get().list().len();

        let added = seed_known_languages(&service, &Actor::system()).await.unwrap();
        assert_eq!(added, total);
        assert_eq!(service.get_default().await.unwrap().code, "en");

        let added = seed_known_languages(&service, &Actor::system()).await.unwrap();
        assert_eq!(added, 0);
        assert_eq!(service.get_all().await.unwrap().len(), total);
    }

    #[tokio::test]
    async fn test_seed_keeps_existing_default() {
        let (db, _temp_dir) = create_test_db().await;
        let service = LanguageManager::new(db);
        service
            .create(params("de", "German", true), &Actor::system())
            .await
            .unwrap();

        seed_known_languages(&service, &Actor::system()).await.unwrap();
        assert_eq!(service.get_default().await.unwrap().code, "de");
    }

    // ==================== Cache Tests ====================

    #[tokio::test]
    async fn test_cached_list_and_invalidation() {
        let (db, _temp_dir) = create_test_db().await;
        seed(&db).await;
        let store = Arc::new(MemoryCache::new());
        let cache = Arc::new(CacheService::new(store.clone(), test_config()));
        let service = CachedLanguageService::new(LanguageManager::new(db), cache.clone());

        assert_eq!(service.get_all().await.unwrap().len(), 2);
        assert_eq!(service.get_all().await.unwrap().len(), 2);
        assert_eq!(cache.metrics().hits, 1);
        let ttl = store.ttl("i18n:languages:all").unwrap();
        assert!(ttl > test_config().default_ttl);
        assert!(ttl <= test_config().default_ttl + Duration::from_secs(600));
        assert!(ttl < test_config().long_ttl);

        store
            .set("i18n:translation_matrix:1:all:-1:0", "empty", Duration::from_secs(60))
            .await
            .unwrap();
        service
            .create(params("de", "German", false), &Actor::system())
            .await
            .unwrap();

        assert!(store.keys().is_empty());
        assert_eq!(service.get_all().await.unwrap().len(), 3);
    }
}
