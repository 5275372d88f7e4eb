//! Environment-driven configuration.

use std::env;

/// Default SQLite database for the result store.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://triage-atlas.db?mode=rwc";

/// Runtime configuration assembled from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// API key for the model provider (`GEMINI_API_KEY`).
    pub gemini_api_key: Option<String>,
    /// Generation model override (`TA_MODEL`).
    pub model: Option<String>,
    /// Categorization batch size override (`TA_BATCH_SIZE`).
    pub batch_size: Option<usize>,
}

impl AppConfig {
    /// Reads configuration from the environment.
    pub fn from_env() -> Self {
        Self {
            gemini_api_key: env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
            model: env::var("TA_MODEL").ok().filter(|m| !m.is_empty()),
            batch_size: env::var("TA_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_values_are_none() {
        // Only checks the parsing contract for unset variables; set
        // variables come from the ambient environment and are not asserted.
        let config = AppConfig {
            gemini_api_key: None,
            model: None,
            batch_size: None,
        };
        assert!(config.gemini_api_key.is_none());
        assert!(config.batch_size.is_none());
    }
}
