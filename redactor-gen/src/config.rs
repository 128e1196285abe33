//! Configuration resolution for redactor-gen
//!
//! The provider API key is resolved Database → ENV → TOML.

use redactor_common::config::TomlConfig;
use redactor_common::Result;
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

/// Environment variable holding the provider API key
pub const API_KEY_ENV: &str = "REDACTOR_API_KEY";

/// Older variable name, still honored
pub const LEGACY_API_KEY_ENV: &str = "api_key";

/// Resolve the provider API key
///
/// Returns `None` with a warning when no source defines one; the service still
/// starts, and generation calls fail until a key is configured.
pub async fn resolve_provider_api_key(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<Option<String>> {
    let db_key = crate::db::settings::get_provider_api_key(db)
        .await?
        .filter(|k| is_valid_key(k));

    let env_key = std::env::var(API_KEY_ENV)
        .ok()
        .or_else(|| std::env::var(LEGACY_API_KEY_ENV).ok())
        .filter(|k| is_valid_key(k));

    let toml_key = toml_config
        .provider
        .api_key
        .clone()
        .filter(|k| is_valid_key(k));

    let sources: Vec<&str> = [
        (db_key.is_some(), "database"),
        (env_key.is_some(), "environment"),
        (toml_key.is_some(), "TOML"),
    ]
    .iter()
    .filter(|(present, _)| *present)
    .map(|(_, name)| *name)
    .collect();

    if sources.len() > 1 {
        warn!(
            "Provider API key found in multiple sources: {}. Using {}.",
            sources.join(", "),
            sources[0]
        );
    }

    let resolved = db_key.or(env_key).or(toml_key);
    match (&resolved, sources.first()) {
        (Some(_), Some(source)) => info!("Provider API key loaded from {}", source),
        _ => warn!(
            "Provider API key not configured. Set {} or [provider] api_key in the TOML config.",
            API_KEY_ENV
        ),
    }

    Ok(resolved)
}

/// Non-empty, non-whitespace
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
