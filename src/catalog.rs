//! Language catalogue: well-known language codes with their display names.
//!
//! The catalogue seeds an empty language directory and backs the shape
//! heuristics of import layout detection. It is initialised once and is
//! immutable afterwards.

use std::sync::OnceLock;

/// A well-known language.
#[derive(Debug, Clone)]
pub struct KnownLanguage {
    /// Code as stored in the directory (e.g. "en", "zh-CN")
    pub code: &'static str,

    /// English name (e.g. "Chinese (Simplified)")
    pub name: &'static str,

    /// Name in the language itself
    pub native_name: &'static str,

    /// Whether seeding marks this language as the project default
    pub is_default: bool,
}

/// Global catalogue singleton.
pub struct LanguageCatalog {
    languages: Vec<KnownLanguage>,
}

static CATALOG: OnceLock<LanguageCatalog> = OnceLock::new();

impl LanguageCatalog {
    /// Get the global catalogue, initialising it on first access.
    pub fn get() -> &'static LanguageCatalog {
        CATALOG.get_or_init(|| LanguageCatalog {
            languages: known_languages(),
        })
    }

    /// Look up a language by code. Matching ignores case and treats `_` and `-` alike.
    pub fn get_by_code(&self, code: &str) -> Option<&KnownLanguage> {
        let wanted = canonical_code(code);
        self.languages
            .iter()
            .find(|lang| canonical_code(lang.code) == wanted)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.get_by_code(code).is_some()
    }

    pub fn list(&self) -> &[KnownLanguage] {
        &self.languages
    }

    /// The language seeding marks as default.
    ///
    /// # Panics
    /// Panics if the built-in table does not flag exactly one default.
    pub fn default_language(&self) -> &KnownLanguage {
        let defaults: Vec<_> = self.languages.iter().filter(|l| l.is_default).collect();
        match defaults.as_slice() {
            [one] => one,
            [] => panic!("No default language in catalogue"),
            _ => panic!("Multiple default languages in catalogue"),
        }
    }
}

fn canonical_code(code: &str) -> String {
    code.to_ascii_lowercase().replace('_', "-")
}

fn known_languages() -> Vec<KnownLanguage> {
    let entry = |code, name, native_name| KnownLanguage {
        code,
        name,
        native_name,
        is_default: false,
    };
    vec![
        KnownLanguage {
            code: "en",
            name: "English",
            native_name: "English",
            is_default: true,
        },
        entry("zh-CN", "Chinese (Simplified)", "简体中文"),
        entry("zh-TW", "Chinese (Traditional)", "繁體中文"),
        entry("ja", "Japanese", "日本語"),
        entry("ko", "Korean", "한국어"),
        entry("fr", "French", "Français"),
        entry("de", "German", "Deutsch"),
        entry("es", "Spanish", "Español"),
        entry("pt", "Portuguese", "Português"),
        entry("pt-BR", "Portuguese (Brazil)", "Português (Brasil)"),
        entry("ru", "Russian", "Русский"),
        entry("ar", "Arabic", "العربية"),
        entry("hi", "Hindi", "हिन्दी"),
        entry("th", "Thai", "ไทย"),
        entry("vi", "Vietnamese", "Tiếng Việt"),
        entry("id", "Indonesian", "Bahasa Indonesia"),
        entry("ms", "Malay", "Bahasa Melayu"),
        entry("tr", "Turkish", "Türkçe"),
        entry("it", "Italian", "Italiano"),
        entry("pl", "Polish", "Polski"),
        entry("nl", "Dutch", "Nederlands"),
        entry("sv", "Swedish", "Svenska"),
        entry("da", "Danish", "Dansk"),
        entry("no", "Norwegian", "Norsk"),
        entry("fi", "Finnish", "Suomi"),
    ]
}
