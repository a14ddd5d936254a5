use anyhow::{bail, Result};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,

    // Cache
    pub redis_url: Option<String>,
    pub cache: CacheConfig,

    // Actor recorded by the CLI
    pub actor_id: i64,
    pub actor_name: String,
}

/// Cache tuning. TTLs are base durations; jitter is added on write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub key_prefix: String,
    pub default_ttl: Duration,
    pub search_ttl: Duration,
    pub long_ttl: Duration,
    pub empty_ttl: Duration,
    pub op_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: "i18n:".to_string(),
            default_ttl: Duration::from_secs(1800),
            search_ttl: Duration::from_secs(300),
            long_ttl: Duration::from_secs(3600),
            empty_ttl: Duration::from_secs(300),
            op_timeout: Duration::from_millis(500),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = CacheConfig::default();

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://translations.db".to_string());
        if !database_url.starts_with("sqlite:") {
            bail!("DATABASE_URL must be a sqlite: URL, got '{}'", database_url);
        }

        Ok(Self {
            database_url,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 5),
            db_acquire_timeout: Duration::from_secs(env_or("DB_ACQUIRE_TIMEOUT_SECS", 10)),

            redis_url: std::env::var("REDIS_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            cache: CacheConfig {
                key_prefix: std::env::var("CACHE_KEY_PREFIX").unwrap_or(defaults.key_prefix),
                default_ttl: env_secs("CACHE_DEFAULT_TTL_SECS", defaults.default_ttl),
                search_ttl: env_secs("CACHE_SEARCH_TTL_SECS", defaults.search_ttl),
                long_ttl: env_secs("CACHE_LONG_TTL_SECS", defaults.long_ttl),
                empty_ttl: env_secs("CACHE_EMPTY_TTL_SECS", defaults.empty_ttl),
                op_timeout: std::env::var("CACHE_OP_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.op_timeout),
            },

            actor_id: env_or("ACTOR_ID", 0),
            actor_name: std::env::var("ACTOR_NAME").unwrap_or_else(|_| "cli".to_string()),
        })
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_secs(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}
