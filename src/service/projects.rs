use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::ProjectService;
use crate::cache::{keys, CacheService};
use crate::db::Database;
use crate::error::{Entity, Error, Result};
use crate::models::{Actor, CreateProjectParams, Project};

/// URL-safe slug: lowercase ASCII alphanumerics separated by single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[derive(Clone)]
pub struct ProjectManager {
    db: Database,
}

impl ProjectManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProjectService for ProjectManager {
    async fn create(&self, params: CreateProjectParams, actor: &Actor) -> Result<Project> {
        if params.name.trim().is_empty() {
            return Err(Error::validation("project name must not be empty"));
        }
        let slug = slugify(&params.name);
        if slug.is_empty() {
            return Err(Error::validation(format!(
                "project name '{}' does not produce a usable slug",
                params.name.trim()
            )));
        }
        if self.db.project_slug_taken(&slug).await? {
            return Err(Error::conflict(
                &format!("project slug '{}' already exists", slug),
                Vec::new(),
            ));
        }

        let project = self
            .db
            .insert_project(&params, &slug, actor)
            .await
            .map_err(|e| e.with_conflict_message(|| format!("project slug '{}' already exists", slug)))?;
        info!(id = project.id, slug = %project.slug, actor = %actor.name, "Created project");
        Ok(project)
    }

    async fn get_by_id(&self, id: i64) -> Result<Project> {
        self.db
            .get_project(id)
            .await?
            .ok_or(Error::NotFound(Entity::Project(id)))
    }

    async fn get_all(&self, limit: i64, offset: i64) -> Result<(Vec<Project>, i64)> {
        self.db.list_projects(limit, offset).await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        if !self.db.soft_delete_project(id).await? {
            return Err(Error::NotFound(Entity::Project(id)));
        }
        info!(id, "Deleted project");
        Ok(())
    }
}

pub struct CachedProjectService<S> {
    inner: S,
    cache: Arc<CacheService>,
}

impl<S: ProjectService> CachedProjectService<S> {
    pub fn new(inner: S, cache: Arc<CacheService>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl<S: ProjectService> ProjectService for CachedProjectService<S> {
    async fn create(&self, params: CreateProjectParams, actor: &Actor) -> Result<Project> {
        let project = self.inner.create(params, actor).await?;
        self.cache.invalidate(&keys::project(project.id)).await;
        self.cache.invalidate(keys::DASHBOARD_STATS).await;
        Ok(project)
    }

    async fn get_by_id(&self, id: i64) -> Result<Project> {
        let found: Option<Project> = self
            .cache
            .read_through(&keys::project(id), self.cache.config().default_ttl, || async move {
                match self.inner.get_by_id(id).await {
                    Ok(project) => Ok(Some(project)),
                    Err(e) if e.is_not_found() => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .await?;
        found.ok_or(Error::NotFound(Entity::Project(id)))
    }

    async fn get_all(&self, limit: i64, offset: i64) -> Result<(Vec<Project>, i64)> {
        self.inner.get_all(limit, offset).await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.inner.delete(id).await?;
        self.cache.invalidate(&keys::project(id)).await;
        self.cache.invalidate_prefix(&keys::matrix_prefix(id)).await;
        self.cache
            .invalidate_prefix(&keys::translation_list_prefix(id))
            .await;
        self.cache.invalidate(keys::DASHBOARD_STATS).await;
        Ok(())
    }
}
