//! Configuration management for Palisade
//!
//! This module provides a centralized configuration system that supports:
//! - YAML configuration files
//! - Environment variable overrides
//! - Reasonable defaults
//! - Configuration validation

use config::{Config, ConfigError, Environment, File};
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Root configuration structure for Palisade
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PalisadeConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub environments: Vec<EnvironmentProfile>,
}

impl PalisadeConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest priority)
    /// 2. Config file specified by PALISADE_CONFIG env var
    /// 3. ./config/palisade.yaml
    /// 4. /etc/palisade/palisade.yaml
    /// 5. Hardcoded defaults (lowest priority)
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Set defaults
        builder = Self::set_defaults(builder)?;

        // Load from files (in order of precedence)
        if let Ok(config_path) = std::env::var("PALISADE_CONFIG") {
            builder = builder.add_source(File::with_name(&config_path).required(false));
        }

        builder = builder
            .add_source(File::with_name("./config/palisade").required(false))
            .add_source(File::with_name("/etc/palisade/palisade").required(false));

        // Override with environment variables
        // Example: PALISADE_DATABASE__MAX_CONNECTIONS=10
        builder = builder.add_source(
            Environment::with_prefix("PALISADE")
                .separator("__")
                .try_parsing(true),
        );

        let config: PalisadeConfig = builder.build()?.try_deserialize()?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Set default values for all configuration options
    fn set_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("database.url", "sqlite::memory:")?
            .set_default("database.max_connections", 5)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.is_empty() {
            return Err(ConfigError::Message(
                "database.url must not be empty".to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "database.max_connections must be > 0".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for environment in &self.environments {
            if environment.name.is_empty() {
                return Err(ConfigError::Message(
                    "environments[].name must not be empty".to_string(),
                ));
            }
            if environment.backend.is_empty() {
                return Err(ConfigError::Message(format!(
                    "environment `{}` has no backend",
                    environment.name
                )));
            }
            if !seen.insert(environment.name.as_str()) {
                return Err(ConfigError::Message(format!(
                    "duplicate environment name `{}`",
                    environment.name
                )));
            }
        }

        Ok(())
    }

    /// Load configuration from a specific file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Environments to route with, synthesizing a single catch-all
    /// `database` environment from the `[database]` section when none are
    /// configured.
    #[must_use]
    pub fn routing_environments(&self) -> Vec<EnvironmentProfile> {
        if !self.environments.is_empty() {
            return self.environments.clone();
        }

        let mut arguments = Map::new();
        arguments.insert("url".to_string(), Value::from(self.database.url.clone()));
        arguments.insert(
            "max_connections".to_string(),
            Value::from(self.database.max_connections),
        );

        vec![EnvironmentProfile {
            name: "default".to_string(),
            backend: "database".to_string(),
            targets: TargetSelector::All,
            arguments,
        }]
    }
}

/// Relational backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Connection URL for the SQLite backend
    pub url: String,

    /// Maximum pooled connections
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 5,
        }
    }
}

/// Routing entry mapping entity types to a named backend provider.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EnvironmentProfile {
    /// Environment name, unique within the configuration
    pub name: String,

    /// Backend provider name this environment opens
    pub backend: String,

    /// Entity types served by this environment
    #[serde(default)]
    pub targets: TargetSelector,

    /// Provider-specific settings (for the SQLite provider: `url`,
    /// `max_connections`)
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl EnvironmentProfile {
    /// Creates an environment covering all entity types.
    #[must_use]
    pub fn new(name: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            backend: backend.into(),
            targets: TargetSelector::All,
            arguments: Map::new(),
        }
    }

    /// Restricts the environment to the given entity types.
    #[must_use]
    pub fn with_targets(mut self, types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.targets = TargetSelector::Types(types.into_iter().map(Into::into).collect());
        self
    }

    /// Adds a provider argument.
    #[must_use]
    pub fn with_argument(mut self, key: impl Into<String>, value: Value) -> Self {
        self.arguments.insert(key.into(), value);
        self
    }

    /// Looks up a provider argument.
    #[must_use]
    pub fn argument(&self, key: &str) -> Option<&Value> {
        self.arguments.get(key)
    }
}

/// Entity types an environment serves: everything (`"*"`), or a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSelector {
    All,
    Types(Vec<String>),
}

impl TargetSelector {
    /// Whether this selector covers the given entity type.
    #[must_use]
    pub fn covers(&self, entity_type: &str) -> bool {
        match self {
            Self::All => true,
            Self::Types(types) => types.iter().any(|t| t == entity_type),
        }
    }
}

impl Default for TargetSelector {
    fn default() -> Self {
        Self::All
    }
}

impl Serialize for TargetSelector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::All => serializer.serialize_str("*"),
            Self::Types(types) => serializer.collect_seq(types),
        }
    }
}

impl<'de> Deserialize<'de> for TargetSelector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(text) if text == "*" => Ok(Self::All),
            Value::String(text) => Ok(Self::Types(vec![text])),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(text) => Ok(text),
                    other => Err(de::Error::custom(format!(
                        "target entries must be strings, got {other}"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Types),
            other => Err(de::Error::custom(format!(
                "targets must be \"*\" or a list of entity types, got {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_configuration() {
        let config = PalisadeConfig::default();

        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.database.max_connections, 5);
        assert!(config.environments.is_empty());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = PalisadeConfig::default();

        // Invalid: no pooled connections
        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        // Fix and validate again
        config.database.max_connections = 5;
        assert!(config.validate().is_ok());

        // Invalid: duplicate environment names
        config.environments = vec![
            EnvironmentProfile::new("main", "memory"),
            EnvironmentProfile::new("main", "database"),
        ];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_target_selector_covers() {
        assert!(TargetSelector::All.covers("widget"));

        let selector = TargetSelector::Types(vec!["widget".to_string()]);
        assert!(selector.covers("widget"));
        assert!(!selector.covers("gadget"));
    }

    #[test]
    fn test_target_selector_serde() {
        assert_eq!(serde_json::to_value(TargetSelector::All).unwrap(), json!("*"));

        let selector: TargetSelector = serde_json::from_value(json!("*")).unwrap();
        assert_eq!(selector, TargetSelector::All);

        let selector: TargetSelector = serde_json::from_value(json!(["widget", "gadget"])).unwrap();
        assert_eq!(
            selector,
            TargetSelector::Types(vec!["widget".to_string(), "gadget".to_string()])
        );

        let selector: TargetSelector = serde_json::from_value(json!("widget")).unwrap();
        assert_eq!(selector, TargetSelector::Types(vec!["widget".to_string()]));

        assert!(serde_json::from_value::<TargetSelector>(json!(42)).is_err());
    }

    #[test]
    fn test_routing_environments_fallback() {
        let config = PalisadeConfig::default();
        let environments = config.routing_environments();

        assert_eq!(environments.len(), 1);
        assert_eq!(environments[0].backend, "database");
        assert!(environments[0].targets.covers("anything"));
        assert_eq!(
            environments[0].argument("url"),
            Some(&json!("sqlite::memory:"))
        );
    }

    #[test]
    fn test_environment_builder() {
        let environment = EnvironmentProfile::new("volatile", "memory")
            .with_targets(["widget"])
            .with_argument("trace", json!(true));

        assert_eq!(environment.name, "volatile");
        assert!(environment.targets.covers("widget"));
        assert!(!environment.targets.covers("gadget"));
        assert_eq!(environment.argument("trace"), Some(&json!(true)));
    }
}
