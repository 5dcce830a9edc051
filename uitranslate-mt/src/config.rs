//! Application configuration
//!
//! Everything the pipeline needs is passed in explicitly through these
//! structs. Environment variables are only consulted by [`AppConfig::apply_env`],
//! which the binaries call at startup.
//!
//! ```toml
//! [gemini]
//! model = "gemini-2.0-flash"
//!
//! [batch]
//! batch_size = 40
//! concurrency = 2
//!
//! [single_call]
//! max_estimated_tokens = 20000
//! ```

use crate::batch::BatchConfig;
use crate::error::{MtError, MtResult};
use crate::gemini::GeminiConfig;
use crate::scanner::GithubConfig;
use crate::single_call::SingleCallConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

pub const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";
pub const GITHUB_TOKEN_VAR: &str = "GITHUB_TOKEN";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub gemini: GeminiConfig,
    pub github: GithubConfig,
    pub batch: BatchConfig,
    pub single_call: SingleCallConfig,
}

impl AppConfig {
    /// Read a TOML file; missing sections and fields take their defaults
    pub fn load(path: &Path) -> MtResult<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            MtError::ConfigError(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| MtError::ConfigError(format!("In '{}': {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> MtResult<Self> {
        toml::from_str(content).map_err(|e| MtError::ConfigError(e.to_string()))
    }

    /// Fill credentials from `GEMINI_API_KEY` and `GITHUB_TOKEN`
    pub fn apply_env(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    /// Same as [`apply_env`](Self::apply_env) with a custom variable lookup
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(GEMINI_API_KEY_VAR).filter(|v| !v.is_empty()) {
            self.gemini.api_key = key;
        }
        if let Some(token) = lookup(GITHUB_TOKEN_VAR).filter(|v| !v.is_empty()) {
            self.github.token = token;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.batch, BatchConfig::default());
        assert_eq!(config.single_call, SingleCallConfig::default());
        assert_eq!(config.gemini.model, "gemini-2.0-flash");
        assert!(config.github.token.is_empty());
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::from_toml(
            r#"
            [batch]
            batch_size = 40
            concurrency = 2

            [single_call]
            max_estimated_tokens = 20000
            "#,
        )
        .unwrap();
        assert_eq!(config.batch.batch_size, 40);
        assert_eq!(config.batch.concurrency, 2);
        assert_eq!(config.batch.max_attempts, 3);
        assert_eq!(config.single_call.max_estimated_tokens, 20_000);
        assert!(config.single_call.ensure_complete);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        assert!(matches!(
            AppConfig::from_toml("[batch]\nbatch_size = \"many\""),
            Err(MtError::ConfigError(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("uitranslate.toml");
        fs::write(&path, "[gemini]\nmodel = \"gemini-1.5-pro\"\n").unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.gemini.model, "gemini-1.5-pro");

        match AppConfig::load(&dir.path().join("missing.toml")) {
            Err(MtError::ConfigError(msg)) => assert!(msg.contains("missing.toml")),
            other => panic!("Expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_apply_env_with_lookup() {
        let vars: HashMap<&str, &str> =
            [(GEMINI_API_KEY_VAR, "gem-key"), (GITHUB_TOKEN_VAR, "")].into_iter().collect();
        let mut config = AppConfig::default();
        config.github.token = "from-file".to_string();

        config.apply_env_with(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.gemini.api_key, "gem-key");
        // Empty variables do not clear configured values
        assert_eq!(config.github.token, "from-file");
    }
}
