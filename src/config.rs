// Engine configuration, read from the environment.
//
// Nothing here is mandatory: missing API keys simply disable the matching
// classifier, and every other setting has a default.

use crate::core::moderation::FuzzyConfig;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_VISION_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_TRUST_DB_PATH: &str = "data/trust.db";

/// `TRUST_DB_PATH` value that selects the in-memory trust store.
pub const IN_MEMORY_DB: &str = ":memory:";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub perspective_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_vision_model: String,
    pub classifier_timeout: Duration,
    pub trust_db_path: String,
    pub lexicon_file: Option<PathBuf>,
    pub fuzzy: FuzzyConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            perspective_api_key: None,
            gemini_api_key: None,
            gemini_vision_model: DEFAULT_VISION_MODEL.to_string(),
            classifier_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            trust_db_path: DEFAULT_TRUST_DB_PATH.to_string(),
            lexicon_file: None,
            fuzzy: FuzzyConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any `name -> value` lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        // Blank values count as unset
        let text = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let timeout_secs = parsed(&text, "CLASSIFIER_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);
        let timeout_secs = if timeout_secs == 0 {
            tracing::warn!("CLASSIFIER_TIMEOUT_SECS must be positive, using {}", DEFAULT_TIMEOUT_SECS);
            DEFAULT_TIMEOUT_SECS
        } else {
            timeout_secs
        };

        let threshold = parsed(
            &text,
            "FUZZY_SIMILARITY_THRESHOLD",
            defaults.fuzzy.similarity_threshold,
        );
        let threshold = if (0.0..=1.0).contains(&threshold) {
            threshold
        } else {
            tracing::warn!(
                "FUZZY_SIMILARITY_THRESHOLD must be within [0, 1], using {}",
                defaults.fuzzy.similarity_threshold
            );
            defaults.fuzzy.similarity_threshold
        };

        Self {
            perspective_api_key: text("PERSPECTIVE_API_KEY"),
            gemini_api_key: text("GEMINI_API_KEY"),
            gemini_vision_model: text("GEMINI_VISION_MODEL").unwrap_or(defaults.gemini_vision_model),
            classifier_timeout: Duration::from_secs(timeout_secs),
            trust_db_path: text("TRUST_DB_PATH").unwrap_or(defaults.trust_db_path),
            lexicon_file: text("LEXICON_FILE").map(PathBuf::from),
            fuzzy: FuzzyConfig {
                similarity_threshold: threshold,
                window_padding: parsed(&text, "FUZZY_WINDOW_PADDING", defaults.fuzzy.window_padding),
            },
        }
    }

    pub fn uses_in_memory_store(&self) -> bool {
        self.trust_db_path == IN_MEMORY_DB
    }
}

/// Parse `key`, falling back to `default` (with a warning) when the value
/// doesn't parse.
fn parsed<T>(text: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match text(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid {} value {:?}, using {}", key, raw, default);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> EngineConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EngineConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = config_from(&[]);

        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.classifier_timeout, Duration::from_secs(5));
        assert_eq!(config.fuzzy.similarity_threshold, 0.75);
        assert_eq!(config.fuzzy.window_padding, 2);
        assert_eq!(config.gemini_vision_model, "gemini-2.0-flash");
        assert!(!config.uses_in_memory_store());
    }

    #[test]
    fn test_values_are_read() {
        let config = config_from(&[
            ("PERSPECTIVE_API_KEY", "p-key"),
            ("GEMINI_API_KEY", "g-key"),
            ("GEMINI_VISION_MODEL", "gemini-2.5-flash"),
            ("CLASSIFIER_TIMEOUT_SECS", "12"),
            ("TRUST_DB_PATH", ":memory:"),
            ("LEXICON_FILE", "lexicon.json"),
            ("FUZZY_SIMILARITY_THRESHOLD", "0.8"),
            ("FUZZY_WINDOW_PADDING", "3"),
        ]);

        assert_eq!(config.perspective_api_key.as_deref(), Some("p-key"));
        assert_eq!(config.gemini_api_key.as_deref(), Some("g-key"));
        assert_eq!(config.gemini_vision_model, "gemini-2.5-flash");
        assert_eq!(config.classifier_timeout, Duration::from_secs(12));
        assert!(config.uses_in_memory_store());
        assert_eq!(config.lexicon_file, Some(PathBuf::from("lexicon.json")));
        assert_eq!(config.fuzzy.similarity_threshold, 0.8);
        assert_eq!(config.fuzzy.window_padding, 3);
    }

    #[test]
    fn test_blank_credentials_are_absent() {
        let config = config_from(&[("PERSPECTIVE_API_KEY", ""), ("GEMINI_API_KEY", "   ")]);

        assert_eq!(config.perspective_api_key, None);
        assert_eq!(config.gemini_api_key, None);
    }

    #[test]
    fn test_bad_numbers_fall_back_to_defaults() {
        let config = config_from(&[
            ("CLASSIFIER_TIMEOUT_SECS", "soon"),
            ("FUZZY_SIMILARITY_THRESHOLD", "1.5"),
            ("FUZZY_WINDOW_PADDING", "-1"),
        ]);

        assert_eq!(config.classifier_timeout, Duration::from_secs(5));
        assert_eq!(config.fuzzy.similarity_threshold, 0.75);
        assert_eq!(config.fuzzy.window_padding, 2);

        let config = config_from(&[("CLASSIFIER_TIMEOUT_SECS", "0")]);
        assert_eq!(config.classifier_timeout, Duration::from_secs(5));
    }
}
