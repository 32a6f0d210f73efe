//! Runtime configuration, loaded from TOML with environment overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::app::OrchestratorConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing API key: set {env_var}")]
    MissingApiKey { env_var: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DepotConfig {
    pub database: DatabaseConfig,
    pub reasoning: ReasoningConfig,
    pub orchestrator: OrchestratorSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub transit_path: PathBuf,
    pub checkpoint_path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            transit_path: PathBuf::from("depot.db"),
            checkpoint_path: PathBuf::from("depot-threads.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReasoningConfig {
    pub model: String,
    /// Override for OpenAI-compatible endpoints; the provider default
    /// applies when unset.
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key. The key itself
    /// never lives in the config file.
    pub api_key_env: String,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl ReasoningConfig {
    pub fn api_key(&self) -> Result<String, ConfigError> {
        std::env::var(&self.api_key_env).map_err(|_| ConfigError::MissingApiKey {
            env_var: self.api_key_env.clone(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestratorSettings {
    pub max_reasoning_rounds: u32,
    pub dangerous_entity_param: String,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        let defaults = OrchestratorConfig::default();
        Self {
            max_reasoning_rounds: defaults.max_reasoning_rounds,
            dangerous_entity_param: defaults.dangerous_entity_param,
        }
    }
}

impl From<&OrchestratorSettings> for OrchestratorConfig {
    fn from(settings: &OrchestratorSettings) -> Self {
        Self {
            max_reasoning_rounds: settings.max_reasoning_rounds,
            dangerous_entity_param: settings.dangerous_entity_param.clone(),
        }
    }
}

impl DepotConfig {
    /// Load from an optional TOML file, then apply environment overrides
    /// (`DEPOT_TRANSIT_DB`, `DEPOT_CHECKPOINT_DB`, `DEPOT_REASONING_URL`,
    /// `DEPOT_REASONING_MODEL`).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                toml::from_str(&raw)?
            }
            None => Self::default(),
        };

        if let Ok(value) = std::env::var("DEPOT_TRANSIT_DB") {
            config.database.transit_path = PathBuf::from(value);
        }
        if let Ok(value) = std::env::var("DEPOT_CHECKPOINT_DB") {
            config.database.checkpoint_path = PathBuf::from(value);
        }
        if let Ok(value) = std::env::var("DEPOT_REASONING_URL") {
            config.reasoning.base_url = Some(value);
        }
        if let Ok(value) = std::env::var("DEPOT_REASONING_MODEL") {
            config.reasoning.model = value;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = DepotConfig::default();
        assert_eq!(config.reasoning.model, "gpt-4o-mini");
        assert_eq!(config.orchestrator.max_reasoning_rounds, 8);
        assert_eq!(config.orchestrator.dangerous_entity_param, "trip_id");
    }

    #[test]
    fn toml_overrides_defaults() {
        let raw = r#"
            [database]
            transit_path = "/var/lib/depot/transit.db"

            [reasoning]
            model = "gpt-4o"

            [orchestrator]
            max_reasoning_rounds = 4
        "#;
        let config: DepotConfig = toml::from_str(raw).unwrap();
        assert_eq!(
            config.database.transit_path,
            PathBuf::from("/var/lib/depot/transit.db")
        );
        // Unset fields keep their defaults.
        assert_eq!(
            config.database.checkpoint_path,
            PathBuf::from("depot-threads.db")
        );
        assert_eq!(config.reasoning.model, "gpt-4o");
        assert_eq!(config.orchestrator.max_reasoning_rounds, 4);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let raw = r#"
            [reasoning]
            api_key = "sk-not-here"
        "#;
        assert!(toml::from_str::<DepotConfig>(raw).is_err());
    }
}
