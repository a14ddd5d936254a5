//! Flows used by developer tooling: pushing keys from source code and
//! pulling the translated matrix back.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::{Actor, Language, SimpleMatrix, TranslationInput};
use crate::service::{LanguageService, ProjectService, TranslationService};

/// Keys pushed by a client.
///
/// With `keys` empty and `translations` non-empty the request is a bulk
/// create-or-update of `translations`; otherwise each listed key is created
/// in every language unless the project already has it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushRequest {
    pub project_id: i64,

    #[serde(default)]
    pub keys: Vec<String>,

    /// Values for the default language, by key
    #[serde(default)]
    pub defaults: HashMap<String, String>,

    /// `language_code -> key -> value`
    #[serde(default)]
    pub translations: HashMap<String, HashMap<String, String>>,
}

impl PushRequest {
    fn is_bulk(&self) -> bool {
        self.keys.is_empty() && !self.translations.is_empty()
    }
}

/// Per-key result of a push. Each list is sorted and free of duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushOutcome {
    pub added: Vec<String>,
    pub existed: Vec<String>,
    pub failed: Vec<String>,
}

pub struct SyncService {
    translations: Arc<dyn TranslationService>,
    projects: Arc<dyn ProjectService>,
    languages: Arc<dyn LanguageService>,
}

impl SyncService {
    pub fn new(
        translations: Arc<dyn TranslationService>,
        projects: Arc<dyn ProjectService>,
        languages: Arc<dyn LanguageService>,
    ) -> Self {
        Self {
            translations,
            projects,
            languages,
        }
    }

    pub async fn push_keys(&self, request: PushRequest, actor: &Actor) -> Result<PushOutcome> {
        self.projects.get_by_id(request.project_id).await?;
        let languages = self.languages.get_all().await?;
        let existing = self
            .translations
            .get_matrix(request.project_id, -1, 0, "")
            .await?
            .matrix;

        let outcome = if request.is_bulk() {
            self.push_bulk(&request, &languages, |key| existing.contains_key(key))
                .await
        } else {
            self.push_each(&request, &languages, |key| existing.contains_key(key), actor)
                .await
        };

        info!(
            project_id = request.project_id,
            added = outcome.added.len(),
            existed = outcome.existed.len(),
            failed = outcome.failed.len(),
            "Pushed keys"
        );
        Ok(outcome)
    }

    async fn push_bulk(
        &self,
        request: &PushRequest,
        languages: &[Language],
        exists: impl Fn(&str) -> bool,
    ) -> PushOutcome {
        let ids: HashMap<&str, i64> = languages.iter().map(|l| (l.code.as_str(), l.id)).collect();

        let mut added = BTreeSet::new();
        let mut existed = BTreeSet::new();
        let mut inputs = Vec::new();
        for (code, values) in &request.translations {
            let Some(&language_id) = ids.get(code.as_str()) else {
                warn!("Skipping unknown language code '{}' in push", code);
                continue;
            };
            for (key, value) in values {
                if value.is_empty() {
                    continue;
                }
                if exists(key.as_str()) {
                    existed.insert(key.clone());
                } else {
                    added.insert(key.clone());
                }
                inputs.push(TranslationInput::new(request.project_id, key, language_id, value));
            }
        }

        let mut failed = BTreeSet::new();
        if !inputs.is_empty() {
            if let Err(e) = self.translations.upsert_batch(&inputs).await {
                warn!("Bulk push to project {} failed: {}", request.project_id, e);
                failed = std::mem::take(&mut added);
            }
        }

        PushOutcome {
            added: added.into_iter().collect(),
            existed: existed.into_iter().collect(),
            failed: failed.into_iter().collect(),
        }
    }

    async fn push_each(
        &self,
        request: &PushRequest,
        languages: &[Language],
        exists: impl Fn(&str) -> bool,
        actor: &Actor,
    ) -> PushOutcome {
        let default_code = languages
            .iter()
            .find(|l| l.is_default)
            .or_else(|| languages.first())
            .map(|l| l.code.as_str());

        let keys: BTreeSet<&str> = request
            .keys
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .collect();

        let mut outcome = PushOutcome::default();
        for key in keys {
            if exists(key) {
                outcome.existed.push(key.to_string());
                continue;
            }

            let mut any_created = false;
            for language in languages {
                let value = request
                    .translations
                    .get(&language.code)
                    .and_then(|values| values.get(key))
                    .or_else(|| {
                        (Some(language.code.as_str()) == default_code)
                            .then(|| request.defaults.get(key))
                            .flatten()
                    })
                    .map(String::as_str)
                    .unwrap_or("");

                let input = TranslationInput::new(request.project_id, key, language.id, value);
                match self.translations.create(input, actor).await {
                    Ok(_) => any_created = true,
                    Err(e) => warn!("Failed to create '{}' for {}: {}", key, language.code, e),
                }
            }

            if any_created {
                outcome.added.push(key.to_string());
            } else {
                outcome.failed.push(key.to_string());
            }
        }
        outcome
    }

    /// The project's full matrix; with a locale, only keys translated into it.
    pub async fn pull_translations(
        &self,
        project_id: i64,
        locale: Option<&str>,
    ) -> Result<SimpleMatrix> {
        self.projects.get_by_id(project_id).await?;
        let matrix = self
            .translations
            .get_matrix(project_id, -1, 0, "")
            .await?
            .to_simple();

        let Some(locale) = locale.map(str::trim).filter(|l| !l.is_empty()) else {
            return Ok(matrix);
        };
        Ok(matrix
            .into_iter()
            .filter_map(|(key, mut values)| {
                values
                    .remove(locale)
                    .map(|value| (key, BTreeMap::from([(locale.to_string(), value)])))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{create_test_db, seed};
    use crate::db::Database;
    use crate::models::{Project, TranslationInput};
    use crate::service::{LanguageManager, ProjectManager, TranslationManager};
    use tempfile::TempDir;

    async fn setup() -> (SyncService, Arc<TranslationManager>, Database, Project, TempDir) {
        let (db, temp_dir) = create_test_db().await;
        let (project, _, _) = seed(&db).await;
        let translations = Arc::new(TranslationManager::new(db.clone()));
        let sync = SyncService::new(
            translations.clone(),
            Arc::new(ProjectManager::new(db.clone())),
            Arc::new(LanguageManager::new(db.clone())),
        );
        (sync, translations, db, project, temp_dir)
    }

    fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // ==================== Per-key Push Tests ====================

    #[tokio::test]
    async fn test_push_keys_creates_every_language() {
        let (sync, translations, _db, project, _temp_dir) = setup().await;
        translations
            .upsert_batch(&[TranslationInput::new(project.id, "old.key", 1, "Old")])
            .await
            .unwrap();

        let outcome = sync
            .push_keys(
                PushRequest {
                    project_id: project.id,
                    keys: vec!["new.b".into(), "old.key".into(), "new.a".into(), "new.a".into()],
                    defaults: values(&[("new.a", "Default A")]),
                    ..Default::default()
                },
                &Actor::system(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.added, vec!["new.a", "new.b"]);
        assert_eq!(outcome.existed, vec!["old.key"]);
        assert!(outcome.failed.is_empty());

        let pulled = sync.pull_translations(project.id, None).await.unwrap();
        assert_eq!(pulled["new.a"]["en"], "Default A");
        assert_eq!(pulled["new.a"]["fr"], "");
        assert_eq!(pulled["new.b"].len(), 2);
    }

    #[tokio::test]
    async fn test_push_keys_prefers_translations_over_defaults() {
        let (sync, _translations, _db, project, _temp_dir) = setup().await;
        sync.push_keys(
            PushRequest {
                project_id: project.id,
                keys: vec!["k".into()],
                defaults: values(&[("k", "from defaults")]),
                translations: HashMap::from([
                    ("en".to_string(), values(&[("k", "Hello")])),
                    ("fr".to_string(), values(&[("k", "Bonjour")])),
                ]),
            },
            &Actor::system(),
        )
        .await
        .unwrap();

        let pulled = sync.pull_translations(project.id, None).await.unwrap();
        assert_eq!(pulled["k"]["en"], "Hello");
        assert_eq!(pulled["k"]["fr"], "Bonjour");
    }

    #[tokio::test]
    async fn test_push_keys_without_languages_fails_every_key() {
        let (db, _temp_dir) = create_test_db().await;
        let project = db
            .insert_project(
                &crate::models::CreateProjectParams {
                    name: "Bare".to_string(),
                    description: String::new(),
                },
                "bare",
                &Actor::system(),
            )
            .await
            .unwrap();
        let sync = SyncService::new(
            Arc::new(TranslationManager::new(db.clone())),
            Arc::new(ProjectManager::new(db.clone())),
            Arc::new(LanguageManager::new(db)),
        );

        let outcome = sync
            .push_keys(
                PushRequest {
                    project_id: project.id,
                    keys: vec!["a".into()],
                    ..Default::default()
                },
                &Actor::system(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.failed, vec!["a"]);
        assert!(outcome.added.is_empty());
    }

    #[tokio::test]
    async fn test_push_to_missing_project() {
        let (sync, _translations, _db, _project, _temp_dir) = setup().await;
        let err = sync
            .push_keys(
                PushRequest {
                    project_id: 99,
                    keys: vec!["a".into()],
                    ..Default::default()
                },
                &Actor::system(),
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    // ==================== Bulk Push Tests ====================

    #[tokio::test]
    async fn test_bulk_push_upserts() {
        let (sync, translations, _db, project, _temp_dir) = setup().await;
        translations
            .upsert_batch(&[TranslationInput::new(project.id, "home.title", 1, "Home")])
            .await
            .unwrap();

        let outcome = sync
            .push_keys(
                PushRequest {
                    project_id: project.id,
                    translations: HashMap::from([
                        (
                            "en".to_string(),
                            values(&[("home.title", "Start"), ("home.body", "Body"), ("skip", "")]),
                        ),
                        ("fr".to_string(), values(&[("home.title", "Accueil")])),
                        ("xx".to_string(), values(&[("ignored", "x")])),
                    ]),
                    ..Default::default()
                },
                &Actor::system(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.added, vec!["home.body"]);
        assert_eq!(outcome.existed, vec!["home.title"]);
        assert!(outcome.failed.is_empty());

        let pulled = sync.pull_translations(project.id, None).await.unwrap();
        assert_eq!(pulled["home.title"]["en"], "Start");
        assert_eq!(pulled["home.title"]["fr"], "Accueil");
        assert!(!pulled.contains_key("skip"));
        assert!(!pulled.contains_key("ignored"));
    }

    // ==================== Pull Tests ====================

    #[tokio::test]
    async fn test_pull_filters_by_locale() {
        let (sync, translations, _db, project, _temp_dir) = setup().await;
        translations
            .upsert_batch(&[
                TranslationInput::new(project.id, "a", 1, "A-en"),
                TranslationInput::new(project.id, "a", 2, "A-fr"),
                TranslationInput::new(project.id, "b", 1, "B-en"),
            ])
            .await
            .unwrap();

        let fr = sync.pull_translations(project.id, Some("fr")).await.unwrap();
        assert_eq!(fr.len(), 1);
        assert_eq!(fr["a"].len(), 1);
        assert_eq!(fr["a"]["fr"], "A-fr");

        let all = sync.pull_translations(project.id, Some(" ")).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(sync.pull_translations(42, None).await.unwrap_err().is_not_found());
    }
}
