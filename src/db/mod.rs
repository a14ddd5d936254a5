//! Relational store: schema bootstrap and the queries behind every service.
//!
//! All reads ignore soft-deleted rows (`deleted_at IS NOT NULL`). Queries are
//! split by entity across the submodules; they all hang off [`Database`].

mod history;
mod languages;
mod matrix;
mod projects;
mod stats;
mod translations;

pub use history::HistoryScope;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::error::Result;

/// Rows per multi-row statement, well under SQLite's bind-parameter limit.
pub(crate) const BATCH_CHUNK_SIZE: usize = 500;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open a pool on `database_url` and create tables.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL {}", database_url))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database at {}", database_url))?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// Open (creating if needed) a database file with default pool settings.
    pub async fn open_file(path: &Path) -> Result<Self> {
        let url = format!("sqlite://{}", path.display());
        Self::connect(&url, 5, Duration::from_secs(10)).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables and indexes. Safe to run on every start.
    pub async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to create schema")?;
        }
        debug!("Database schema ready");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS projects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        slug TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'active',
        created_by INTEGER NOT NULL DEFAULT 0,
        updated_by INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_project_slug
        ON projects(slug) WHERE deleted_at IS NULL",
    "CREATE TABLE IF NOT EXISTS languages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        code TEXT NOT NULL,
        name TEXT NOT NULL,
        is_default INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'active',
        created_by INTEGER NOT NULL DEFAULT 0,
        updated_by INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_language_code
        ON languages(code) WHERE deleted_at IS NULL",
    "CREATE TABLE IF NOT EXISTS translations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL REFERENCES projects(id),
        key_name TEXT NOT NULL,
        context TEXT NOT NULL DEFAULT '',
        language_id INTEGER NOT NULL REFERENCES languages(id),
        value TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'active',
        created_by INTEGER NOT NULL DEFAULT 0,
        updated_by INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_translation_unique
        ON translations(project_id, key_name, language_id) WHERE deleted_at IS NULL",
    "CREATE INDEX IF NOT EXISTS idx_translation_project_key
        ON translations(project_id, key_name)",
    "CREATE TABLE IF NOT EXISTS translation_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        translation_id INTEGER REFERENCES translations(id) ON DELETE SET NULL,
        project_id INTEGER NOT NULL,
        key_name TEXT NOT NULL,
        language_id INTEGER NOT NULL,
        old_value TEXT,
        new_value TEXT,
        operation TEXT NOT NULL,
        operated_by INTEGER NOT NULL DEFAULT 0,
        operated_at TEXT NOT NULL,
        metadata TEXT NOT NULL DEFAULT '{}'
    )",
    "CREATE INDEX IF NOT EXISTS idx_history_translation ON translation_history(translation_id)",
    "CREATE INDEX IF NOT EXISTS idx_history_project ON translation_history(project_id)",
    "CREATE INDEX IF NOT EXISTS idx_history_operator ON translation_history(operated_by)",
];
