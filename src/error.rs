//! Error taxonomy shared by the store, the services and the cache decorators.
//!
//! Validation and not-found errors are raised before any write happens.
//! Storage-level uniqueness violations are translated into [`Error::Conflict`]
//! so callers never see raw driver messages for duplicate keys.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Result type used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The entity a [`Error::NotFound`] refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Project(i64),
    Language(i64),
    LanguageCode(String),
    DefaultLanguage,
    Translation(i64),
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Project(id) => write!(f, "project {}", id),
            Entity::Language(id) => write!(f, "language {}", id),
            Entity::LanguageCode(code) => write!(f, "language '{}'", code),
            Entity::DefaultLanguage => write!(f, "default language"),
            Entity::Translation(id) => write!(f, "translation {}", id),
        }
    }
}

/// One `(project, key, language)` triple that collided with an existing row
/// or with another entry of the same batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConflictingKey {
    pub project_id: i64,
    pub key_name: String,
    pub language_id: i64,
}

impl fmt::Display for ConflictingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "project {}, key '{}', language {}",
            self.project_id, self.key_name, self.language_id
        )
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(Entity),

    #[error("{message}")]
    Conflict {
        message: String,
        conflicts: Vec<ConflictingKey>,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Conflict listing every colliding triple in the message.
    pub fn conflict(message: &str, conflicts: Vec<ConflictingKey>) -> Self {
        let listed = conflicts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        let message = if listed.is_empty() {
            message.to_string()
        } else {
            format!("{}: {}", message, listed)
        };
        Error::Conflict { message, conflicts }
    }

    /// Name the entity behind a conflict that came straight from a storage
    /// uniqueness violation. Other errors pass through unchanged.
    pub fn with_conflict_message(self, message: impl FnOnce() -> String) -> Self {
        match self {
            Error::Conflict { conflicts, .. } if conflicts.is_empty() => Error::Conflict {
                message: message(),
                conflicts,
            },
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        if is_duplicate_key_error(&err) {
            return Error::Conflict {
                message: "unique constraint violated".to_string(),
                conflicts: Vec::new(),
            };
        }
        Error::Internal(anyhow::Error::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(anyhow::Error::new(err))
    }
}

/// Whether a storage error is a uniqueness violation.
///
/// The driver flag is checked first; the message patterns cover engines that
/// only report the violation textually.
pub fn is_duplicate_key_error(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if db_err.is_unique_violation() {
            return true;
        }
    }
    let message = err.to_string().to_lowercase();
    message.contains("duplicate entry")
        || message.contains("duplicate key")
        || message.contains("unique constraint")
        || message.contains("idx_translation_unique")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = Error::NotFound(Entity::Project(7));
        assert_eq!(err.to_string(), "project 7 not found");
        assert!(err.is_not_found());
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_conflict_lists_triples() {
        let err = Error::conflict(
            "batch contains existing translations",
            vec![
                ConflictingKey {
                    project_id: 1,
                    key_name: "a.b".to_string(),
                    language_id: 2,
                },
                ConflictingKey {
                    project_id: 1,
                    key_name: "c.d".to_string(),
                    language_id: 3,
                },
            ],
        );
        let message = err.to_string();
        assert!(message.starts_with("batch contains existing translations: "));
        assert!(message.contains("key 'a.b', language 2"));
        assert!(message.contains("key 'c.d', language 3"));
        assert!(err.is_conflict());
    }

    #[test]
    fn test_conflict_without_triples_keeps_message() {
        let err = Error::conflict("duplicate", Vec::new());
        assert_eq!(err.to_string(), "duplicate");
    }

    #[test]
    fn test_with_conflict_message_names_bare_conflicts_only() {
        let err: Error = sqlx::Error::Protocol("UNIQUE constraint failed: projects.slug".into()).into();
        let err = err.with_conflict_message(|| "project slug 'web' already exists".to_string());
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "project slug 'web' already exists");

        let listed = Error::conflict(
            "translations already exist",
            vec![ConflictingKey {
                project_id: 1,
                key_name: "a".to_string(),
                language_id: 2,
            }],
        );
        let kept = listed.with_conflict_message(|| "replaced".to_string());
        assert!(kept.to_string().starts_with("translations already exist: "));

        let err = Error::validation("bad").with_conflict_message(|| "replaced".to_string());
        assert_eq!(err.to_string(), "validation failed: bad");
    }

    #[test]
    fn test_duplicate_key_detection_by_message() {
        let err = sqlx::Error::Protocol("UNIQUE constraint failed: translations.key_name".into());
        assert!(is_duplicate_key_error(&err));

        let err = sqlx::Error::Protocol("Duplicate entry '1-a-2' for key".into());
        assert!(is_duplicate_key_error(&err));

        let err = sqlx::Error::Protocol("connection reset".into());
        assert!(!is_duplicate_key_error(&err));
    }

    #[test]
    fn test_sqlx_error_conversion() {
        let err: Error = sqlx::Error::Protocol("UNIQUE constraint failed: languages.code".into()).into();
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "unique constraint violated");

        let err: Error = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, Error::Internal(_)));
    }
}
