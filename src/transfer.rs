//! Import/export file formats.
//!
//! Exports are always key-first: `{key: {language_code: value}}`, pretty
//! printed with sorted keys. Imports accept that layout or the transposed
//! language-first one (`{language_code: {key: value}}`).
//!
//! Layout detection is a best-effort convenience. A payload such as
//! `{"en": {"fr": "..."}}` is valid both ways and the shape guess decides;
//! producers should prefer key-first payloads with dotted key names.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::catalog::LanguageCatalog;
use crate::error::{Error, Result};
use crate::models::SimpleMatrix;
use crate::validation::looks_like_language_code;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            other => Err(Error::validation(format!("unsupported format: {}", other))),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Json => f.write_str("json"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportLayout {
    /// `{key: {language_code: value}}`
    KeyFirst,
    /// `{language_code: {key: value}}`
    LanguageFirst,
}

impl ImportLayout {
    fn other(self) -> Self {
        match self {
            ImportLayout::KeyFirst => ImportLayout::LanguageFirst,
            ImportLayout::LanguageFirst => ImportLayout::KeyFirst,
        }
    }
}

/// A parsed import payload, normalised to key-first.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDocument {
    pub layout: ImportLayout,
    pub matrix: SimpleMatrix,
}

pub fn export(matrix: &SimpleMatrix, format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_vec_pretty(matrix)?),
    }
}

/// Parse an import payload, detecting its layout.
///
/// The payload must be a two-level object of strings. The shape of the
/// top-level keys picks a first guess; the guess is accepted when its
/// language dimension names at least one code in `known_codes`, otherwise
/// the other layout is tried under the same rule.
pub fn parse_import(
    data: &[u8],
    format: ExportFormat,
    known_codes: &HashSet<String>,
) -> Result<ImportDocument> {
    let raw: SimpleMatrix = match format {
        ExportFormat::Json => serde_json::from_slice(data).map_err(|e| {
            Error::validation(format!(
                "import payload must be a JSON object of objects of strings: {}",
                e
            ))
        })?,
    };
    if raw.is_empty() {
        return Err(Error::validation("import payload is empty"));
    }

    let guess = guess_layout(&raw);
    for layout in [guess, guess.other()] {
        let matrix = normalize(&raw, layout);
        if language_codes(&matrix).any(|code| known_codes.contains(code)) {
            return Ok(ImportDocument { layout, matrix });
        }
    }

    Err(Error::validation(unknown_languages_message(&raw)))
}

fn guess_layout(raw: &SimpleMatrix) -> ImportLayout {
    if raw.keys().any(|key| key.contains('.')) {
        return ImportLayout::KeyFirst;
    }
    if raw.keys().all(|key| looks_like_language_code(key)) {
        return ImportLayout::LanguageFirst;
    }
    ImportLayout::KeyFirst
}

fn normalize(raw: &SimpleMatrix, layout: ImportLayout) -> SimpleMatrix {
    match layout {
        ImportLayout::KeyFirst => raw.clone(),
        ImportLayout::LanguageFirst => {
            let mut matrix = SimpleMatrix::new();
            for (code, values) in raw {
                for (key, value) in values {
                    matrix
                        .entry(key.clone())
                        .or_default()
                        .insert(code.clone(), value.clone());
                }
            }
            matrix
        }
    }
}

fn language_codes(matrix: &SimpleMatrix) -> impl Iterator<Item = &String> {
    matrix.values().flat_map(|values| values.keys())
}

/// Error text for a payload that names no directory language, pointing at
/// well-known codes that could be added.
fn unknown_languages_message(raw: &SimpleMatrix) -> String {
    let catalog = LanguageCatalog::get();
    let candidates: BTreeSet<&String> = raw
        .keys()
        .chain(language_codes(raw))
        .filter(|code| catalog.contains(code))
        .collect();

    if candidates.is_empty() {
        "no known language codes found in import payload".to_string()
    } else {
        let listed: Vec<&str> = candidates.iter().map(|c| c.as_str()).collect();
        format!(
            "no known language codes found in import payload; add these languages first: {}",
            listed.join(", ")
        )
    }
}
