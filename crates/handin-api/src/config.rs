use std::collections::HashMap;
use std::env;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub db_path: String,
    /// Upper bound on documents accepted in one `_bulk_docs` request
    pub max_batch_docs: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "HANDIN_API_BIND_ADDR", "127.0.0.1:8080");
        let db_path = value_or_default(&lookup, "HANDIN_DB_PATH", "handin.db");

        let max_batch_docs = value_or_default(&lookup, "HANDIN_MAX_BATCH_DOCS", "500")
            .parse::<usize>()
            .map_err(|_| {
                ConfigError::Invalid("HANDIN_MAX_BATCH_DOCS must be an integer in [1, 5000]".to_string())
            })?;
        if !(1..=5_000).contains(&max_batch_docs) {
            return Err(ConfigError::Invalid(
                "HANDIN_MAX_BATCH_DOCS must be in [1, 5000]".to_string(),
            ));
        }

        Ok(Self {
            bind_addr,
            db_path,
            max_batch_docs,
        })
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    lookup(name)
        .and_then(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .unwrap_or_else(|| default.to_string())
}
