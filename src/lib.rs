//! Translation matrix store.
//!
//! Translations are `(project, key, language) -> value` rows in SQLite. The
//! services aggregate them into a per-project key × language matrix with
//! key-level pagination and keyword search, write them in strict or
//! create-or-update batches, keep an audit trail, and sit behind a
//! read-through cache (Redis or in-process).

pub mod app;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod retry;
pub mod service;
pub mod sync;
pub mod transfer;
pub mod validation;

pub use app::App;
pub use error::{Error, Result};
