//! Domain types: persisted entities, the derived matrix view and service inputs.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Lifecycle state of a translation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TranslationStatus {
    Active,
    Deprecated,
}

/// Availability of a language in the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum LanguageStatus {
    Active,
    Inactive,
}

/// Kind of change captured by a history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum HistoryOperation {
    Create,
    Update,
    Delete,
    Import,
    Export,
    MachineTranslate,
}

impl HistoryOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryOperation::Create => "create",
            HistoryOperation::Update => "update",
            HistoryOperation::Delete => "delete",
            HistoryOperation::Import => "import",
            HistoryOperation::Export => "export",
            HistoryOperation::MachineTranslate => "machine_translate",
        }
    }
}

impl fmt::Display for HistoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryOperation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(HistoryOperation::Create),
            "update" => Ok(HistoryOperation::Update),
            "delete" => Ok(HistoryOperation::Delete),
            "import" => Ok(HistoryOperation::Import),
            "export" => Ok(HistoryOperation::Export),
            "machine_translate" => Ok(HistoryOperation::MachineTranslate),
            other => Err(Error::validation(format!(
                "unknown history operation '{}'",
                other
            ))),
        }
    }
}

/// Who performs a mutation. Authentication happens upstream; only the id is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub name: String,
}

impl Actor {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Identity used for writes that arrive without a user (CLI pushes, imports by API key).
    pub fn system() -> Self {
        Self::new(0, "system")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub status: String,
    pub created_by: i64,
    pub updated_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Language {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub is_default: bool,
    pub status: LanguageStatus,
    pub created_by: i64,
    pub updated_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One stored `(project, key, language) -> value` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Translation {
    pub id: i64,
    pub project_id: i64,
    pub key_name: String,
    pub context: String,
    pub language_id: i64,
    pub value: String,
    pub status: TranslationStatus,
    pub created_by: i64,
    pub updated_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Append-only audit record. `old_value` is `None` for creates, `new_value` for deletes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TranslationHistory {
    pub id: i64,
    pub translation_id: Option<i64>,
    pub project_id: i64,
    pub key_name: String,
    pub language_id: i64,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub operation: HistoryOperation,
    pub operated_by: i64,
    pub operated_at: DateTime<Utc>,
    pub metadata: String,
}

/// A history record before it is written.
#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub translation_id: Option<i64>,
    pub project_id: i64,
    pub key_name: String,
    pub language_id: i64,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub operation: HistoryOperation,
    pub operated_by: i64,
    pub metadata: String,
}

impl NewHistoryEntry {
    pub fn for_translation(
        operation: HistoryOperation,
        translation: &Translation,
        old_value: Option<String>,
        new_value: Option<String>,
        actor: &Actor,
    ) -> Self {
        Self {
            translation_id: Some(translation.id),
            project_id: translation.project_id,
            key_name: translation.key_name.clone(),
            language_id: translation.language_id,
            old_value,
            new_value,
            operation,
            operated_by: actor.id,
            metadata: "{}".to_string(),
        }
    }
}

/// Filters for history listings. `limit <= 0` means unbounded.
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    pub limit: i64,
    pub offset: i64,
    pub operation: Option<HistoryOperation>,
    /// Inclusive.
    pub start_date: Option<NaiveDate>,
    /// Inclusive: the whole calendar day is covered.
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub records: Vec<TranslationHistory>,
    pub total: i64,
}

/// One translation viewed from the matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationCell {
    pub id: i64,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// `key_name -> language_code -> cell`.
pub type Matrix = BTreeMap<String, BTreeMap<String, TranslationCell>>;

/// `key_name -> language_code -> value`, the import/export shape.
pub type SimpleMatrix = BTreeMap<String, BTreeMap<String, String>>;

/// A page of the matrix plus the number of distinct keys matching the query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatrixPage {
    pub matrix: Matrix,
    pub total: i64,
}

impl MatrixPage {
    /// Drops cell metadata, keeping only values.
    pub fn to_simple(&self) -> SimpleMatrix {
        self.matrix
            .iter()
            .map(|(key, cells)| {
                let values = cells
                    .iter()
                    .map(|(code, cell)| (code.clone(), cell.value.clone()))
                    .collect();
                (key.clone(), values)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TranslationPage {
    pub translations: Vec<Translation>,
    pub total: i64,
}

/// Window over the ordered set of distinct key names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyWindow {
    All,
    Page { limit: usize, offset: usize },
}

impl KeyWindow {
    /// `limit <= 0` (conventionally `-1`) selects every key; a negative offset is clamped to zero.
    pub fn from_limit_offset(limit: i64, offset: i64) -> Self {
        if limit > 0 {
            KeyWindow::Page {
                limit: limit as usize,
                offset: offset.max(0) as usize,
            }
        } else {
            KeyWindow::All
        }
    }

    /// The part of `keys` covered by this window; empty when the offset is past the end.
    pub fn slice<'a>(&self, keys: &'a [String]) -> &'a [String] {
        match *self {
            KeyWindow::All => keys,
            KeyWindow::Page { limit, offset } => {
                if offset >= keys.len() {
                    return &[];
                }
                let end = offset.saturating_add(limit).min(keys.len());
                &keys[offset..end]
            }
        }
    }

    /// `(limit, offset)` as they appear in cache keys.
    pub fn cache_params(&self) -> (i64, i64) {
        match *self {
            KeyWindow::All => (-1, 0),
            KeyWindow::Page { limit, offset } => (limit as i64, offset as i64),
        }
    }
}

/// Input for single and batch writes. Strings are trimmed before storage.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TranslationInput {
    pub project_id: i64,
    pub language_id: i64,
    pub key_name: String,
    pub context: String,
    pub value: String,
}

impl TranslationInput {
    pub fn new(project_id: i64, key_name: &str, language_id: i64, value: &str) -> Self {
        Self {
            project_id,
            language_id,
            key_name: key_name.to_string(),
            context: String::new(),
            value: value.to_string(),
        }
    }

    pub fn with_context(mut self, context: &str) -> Self {
        self.context = context.to_string();
        self
    }

    pub(crate) fn normalized(&self) -> Self {
        Self {
            project_id: self.project_id,
            language_id: self.language_id,
            key_name: self.key_name.trim().to_string(),
            context: self.context.trim().to_string(),
            value: self.value.trim().to_string(),
        }
    }
}

/// Partial update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationPatch {
    pub project_id: Option<i64>,
    pub language_id: Option<i64>,
    pub key_name: Option<String>,
    pub context: Option<String>,
    pub value: Option<String>,
    /// `Deprecated` hides the row from the matrix without deleting it
    pub status: Option<TranslationStatus>,
}

/// One key with values for several languages, addressed by language code.
#[derive(Debug, Clone, Default)]
pub struct BatchTranslationParams {
    pub project_id: i64,
    pub key_name: String,
    pub context: String,
    pub translations: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateLanguageParams {
    pub code: String,
    pub name: String,
    pub is_default: bool,
}

/// Partial language update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateLanguageParams {
    pub name: Option<String>,
    pub is_default: Option<bool>,
    pub status: Option<LanguageStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateProjectParams {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_projects: i64,
    pub total_languages: i64,
    pub total_translations: i64,
    pub total_keys: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("key.{:02}", i)).collect()
    }

    #[test]
    fn test_window_all_for_non_positive_limit() {
        assert_eq!(KeyWindow::from_limit_offset(-1, 0), KeyWindow::All);
        assert_eq!(KeyWindow::from_limit_offset(0, 5), KeyWindow::All);
    }

    #[test]
    fn test_window_clamps_negative_offset() {
        assert_eq!(
            KeyWindow::from_limit_offset(10, -3),
            KeyWindow::Page {
                limit: 10,
                offset: 0
            }
        );
    }

    #[test]
    fn test_window_slice_middle_and_tail() {
        let all = keys(5);
        let window = KeyWindow::from_limit_offset(2, 1);
        assert_eq!(window.slice(&all), &all[1..3]);

        let tail = KeyWindow::from_limit_offset(10, 3);
        assert_eq!(tail.slice(&all), &all[3..]);
    }

    #[test]
    fn test_window_slice_past_end_is_empty() {
        let all = keys(2);
        assert!(KeyWindow::from_limit_offset(10, 100).slice(&all).is_empty());
        assert!(KeyWindow::from_limit_offset(1, 2).slice(&all).is_empty());
    }

    #[test]
    fn test_window_cache_params() {
        assert_eq!(KeyWindow::All.cache_params(), (-1, 0));
        assert_eq!(KeyWindow::from_limit_offset(20, 40).cache_params(), (20, 40));
    }

    #[test]
    fn test_history_operation_round_trip_names() {
        for op in [
            HistoryOperation::Create,
            HistoryOperation::Update,
            HistoryOperation::Delete,
            HistoryOperation::Import,
            HistoryOperation::Export,
            HistoryOperation::MachineTranslate,
        ] {
            assert_eq!(op.as_str().parse::<HistoryOperation>().unwrap(), op);
        }
        assert!("rename".parse::<HistoryOperation>().is_err());
    }

    #[test]
    fn test_input_normalization_trims() {
        let input = TranslationInput::new(1, "  home.title ", 2, " Hello ").with_context(" hero ");
        let normalized = input.normalized();
        assert_eq!(normalized.key_name, "home.title");
        assert_eq!(normalized.value, "Hello");
        assert_eq!(normalized.context, "hero");
    }

    #[test]
    fn test_matrix_page_to_simple() {
        let mut page = MatrixPage::default();
        page.matrix.entry("a.b".to_string()).or_default().insert(
            "en".to_string(),
            TranslationCell {
                id: 1,
                value: "Hello".to_string(),
                updated_at: Utc::now(),
            },
        );
        page.total = 1;
        let simple = page.to_simple();
        assert_eq!(simple["a.b"]["en"], "Hello");
    }
}
