//! Input rules for key names and language codes.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{Error, Result};

/// Maximum length of a key name, in characters.
pub const MAX_KEY_NAME_LEN: usize = 255;

/// Maximum length of a language code accepted by the directory.
pub const MAX_LANGUAGE_CODE_LEN: usize = 10;

// Compiled once, shared by every caller
static LANGUAGE_CODE_REGEX: OnceLock<Regex> = OnceLock::new();
static SHORT_CODE_REGEX: OnceLock<Regex> = OnceLock::new();

fn language_code_regex() -> &'static Regex {
    LANGUAGE_CODE_REGEX
        .get_or_init(|| Regex::new(r"^[A-Za-z]{2,3}([_-][A-Za-z0-9]{2,4})?$").expect("valid regex"))
}

fn short_code_regex() -> &'static Regex {
    SHORT_CODE_REGEX.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{2,5}$").expect("valid regex"))
}

/// Validate a (trimmed) key name.
pub fn validate_key_name(key_name: &str) -> Result<()> {
    if key_name.is_empty() {
        return Err(Error::validation("key name must not be empty"));
    }
    if key_name.chars().count() > MAX_KEY_NAME_LEN {
        return Err(Error::validation(format!(
            "key name exceeds {} characters",
            MAX_KEY_NAME_LEN
        )));
    }
    if key_name.chars().any(char::is_control) {
        return Err(Error::validation("key name must not contain control characters"));
    }
    Ok(())
}

/// Validate a code before it enters the language directory (e.g. `en`, `zh-CN`, `pt_BR`).
pub fn validate_language_code(code: &str) -> Result<()> {
    if code.len() > MAX_LANGUAGE_CODE_LEN || !language_code_regex().is_match(code) {
        return Err(Error::validation(format!(
            "'{}' is not a valid language code",
            code
        )));
    }
    Ok(())
}

/// Shape test used by import layout detection: 2-5 letters, digits, `-` or `_`.
pub fn looks_like_language_code(candidate: &str) -> bool {
    short_code_regex().is_match(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_name_accepts_dotted_keys() {
        assert!(validate_key_name("home.hero.title").is_ok());
        assert!(validate_key_name("a").is_ok());
    }

    #[test]
    fn test_key_name_rejects_empty() {
        let err = validate_key_name("").unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn test_key_name_length_limit_counts_chars() {
        let max = "é".repeat(MAX_KEY_NAME_LEN);
        assert!(validate_key_name(&max).is_ok());
        let over = "k".repeat(MAX_KEY_NAME_LEN + 1);
        assert!(validate_key_name(&over).is_err());
    }

    #[test]
    fn test_key_name_rejects_control_characters() {
        assert!(validate_key_name("line\nbreak").is_err());
    }

    #[test]
    fn test_language_codes() {
        for code in ["en", "fr", "zh-CN", "pt_BR", "yue", "zh-Hant"] {
            assert!(validate_language_code(code).is_ok(), "{} should be valid", code);
        }
        for code in ["", "e", "english", "en--US", "12", "en US"] {
            assert!(validate_language_code(code).is_err(), "{} should be invalid", code);
        }
    }

    #[test]
    fn test_looks_like_language_code() {
        assert!(looks_like_language_code("en"));
        assert!(looks_like_language_code("zh-CN"));
        assert!(looks_like_language_code("pt_BR"));
        assert!(!looks_like_language_code("home.title"));
        assert!(!looks_like_language_code("x"));
        assert!(!looks_like_language_code("greeting"));
    }
}
