//! Cache key builders. Keys here carry no namespace; the cache service adds it.
//!
//! Project-scoped prefixes end with `:` so that project 1 never matches project 10.

use sha2::{Digest, Sha256};

use crate::models::KeyWindow;

pub const LANGUAGES_ALL: &str = "languages:all";
pub const DASHBOARD_STATS: &str = "dashboard:stats";
pub const MATRIX_ALL_PROJECTS: &str = "translation_matrix:";
pub const TRANSLATION_ENTITIES: &str = "translation:";

pub fn translation(id: i64) -> String {
    format!("{}{}", TRANSLATION_ENTITIES, id)
}

pub fn translation_list(project_id: i64, limit: i64, offset: i64) -> String {
    format!("{}{}:{}", translation_list_prefix(project_id), limit, offset)
}

pub fn translation_list_prefix(project_id: i64) -> String {
    format!("translations:{}:", project_id)
}

pub fn matrix(project_id: i64, window: KeyWindow, keyword: &str) -> String {
    let (limit, offset) = window.cache_params();
    let keyword = keyword.trim();
    if keyword.is_empty() {
        format!("{}all:{}:{}", matrix_prefix(project_id), limit, offset)
    } else {
        format!(
            "{}search:{}:{}:{}",
            matrix_prefix(project_id),
            keyword_hash(keyword),
            limit,
            offset
        )
    }
}

pub fn matrix_prefix(project_id: i64) -> String {
    format!("{}{}:", MATRIX_ALL_PROJECTS, project_id)
}

pub fn project(id: i64) -> String {
    format!("project:{}", id)
}

/// First 16 hex digits of the keyword's SHA-256.
pub fn keyword_hash(keyword: &str) -> String {
    let digest = Sha256::digest(keyword.as_bytes());
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_key_shapes() {
        assert_eq!(
            matrix(7, KeyWindow::from_limit_offset(20, 40), ""),
            "translation_matrix:7:all:20:40"
        );
        assert_eq!(matrix(7, KeyWindow::All, "  "), "translation_matrix:7:all:-1:0");

        let search = matrix(7, KeyWindow::All, "Hello");
        assert!(search.starts_with("translation_matrix:7:search:"));
        assert!(search.ends_with(":-1:0"));
    }

    #[test]
    fn test_keyword_hash_is_stable_and_short() {
        let hash = keyword_hash("Hello");
        assert_eq!(hash.len(), 16);
        assert_eq!(hash, keyword_hash("Hello"));
        assert_ne!(hash, keyword_hash("hello"));
        // sha256("Hello") = 185f8db3...
        assert_eq!(hash, "185f8db32271fe25");
    }

    #[test]
    fn test_project_prefixes_do_not_overlap() {
        let key_for_10 = matrix(10, KeyWindow::All, "");
        assert!(!key_for_10.starts_with(&matrix_prefix(1)));
        assert!(key_for_10.starts_with(&matrix_prefix(10)));

        let list_for_10 = translation_list(10, 5, 0);
        assert!(!list_for_10.starts_with(&translation_list_prefix(1)));
    }

    #[test]
    fn test_entity_keys() {
        assert_eq!(translation(3), "translation:3");
        assert_eq!(project(4), "project:4");
        assert_eq!(translation_list(2, -1, 0), "translations:2:-1:0");
        assert!(matrix(1, KeyWindow::All, "").starts_with(MATRIX_ALL_PROJECTS));
    }
}
