//! Configuration loading and persistence.

use super::{Config, GenerationConfig, LogLevel, ProviderSettings};
use crate::env::{vars, Environment};
use crate::error::ConfigError;
use crate::paths;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Providers the config validator accepts as a default.
const KNOWN_PROVIDERS: &[&str] = &["anthropic", "openai", "bedrock", "vertex"];

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = paths::config_file()?;
        Self::load(&path)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        debug!("Loading config from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a string.
    ///
    /// Provider section names are lower-cased so lookups match regardless
    /// of how the file spells them.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self =
            json5::from_str(content).map_err(|e| ConfigError::Json5(e.to_string()))?;
        config.normalize_provider_names()?;
        Ok(config)
    }

    fn normalize_provider_names(&mut self) -> Result<(), ConfigError> {
        let settings = std::mem::take(&mut self.providers.settings);
        for (name, section) in settings {
            let key = name.to_lowercase();
            if self.providers.settings.insert(key.clone(), section).is_some() {
                return Err(ConfigError::Validation(format!(
                    "Provider '{}' is configured more than once",
                    key
                )));
            }
        }
        Ok(())
    }

    /// Save configuration to a file path.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_json5()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write atomically
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Serialize to JSON5 string.
    pub fn to_json5(&self) -> Result<String, ConfigError> {
        // json5 has no serializer; plain JSON is valid JSON5
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate the configuration, collecting all errors before returning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if let Some(default) = &self.providers.default {
            if default.trim().is_empty() {
                errors.push("Default provider must not be empty".to_string());
            } else if !KNOWN_PROVIDERS.contains(&default.to_lowercase().as_str())
                && !self.providers.settings.contains_key(&default.to_lowercase())
            {
                errors.push(format!(
                    "Default provider '{}' is neither built in nor configured",
                    default
                ));
            }
        }

        if self.generation.max_tokens == 0 {
            errors.push("generation.max_tokens must be greater than 0".to_string());
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            errors.push(format!(
                "generation.temperature must be between 0 and 2, got {}",
                self.generation.temperature
            ));
        }

        for (name, settings) in &self.providers.settings {
            if settings.timeout_secs == Some(0) {
                errors.push(format!("Provider '{}': timeout_secs must be greater than 0", name));
            }
            if let Some(model) = &settings.model {
                if model.trim().is_empty() {
                    errors.push(format!("Provider '{}': model must not be empty", name));
                }
            }
            if let Some(url) = &settings.base_url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    errors.push(format!(
                        "Provider '{}': base_url '{}' must start with http:// or https://",
                        name, url
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }

    /// Settings for a provider, or empty settings when it has no section.
    pub fn provider_settings(&self, name: &str) -> ProviderSettings {
        self.providers
            .settings
            .get(&name.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    /// Load configuration from the default path, falling back to defaults if no file exists.
    ///
    /// When no config file is found, environment variables are inspected to
    /// pick a default provider.
    pub fn load_or_default() -> Self {
        match Self::load_default() {
            Ok(config) => config,
            Err(ConfigError::NotFound(_)) => Self::from_env_defaults(),
            Err(e) => {
                tracing::warn!("Ignoring unreadable config: {}", e);
                Self::default()
            }
        }
    }

    /// Create a Config from defaults, enhanced by process environment detection.
    pub fn from_env_defaults() -> Self {
        Self::from_environment(&Environment::process())
    }

    /// Create a Config from defaults, picking a default provider from the
    /// credentials present in `env` (Anthropic first, then OpenAI).
    pub fn from_environment(env: &Environment) -> Self {
        let mut config = Self::default();

        config.providers.default = if env.get(vars::ANTHROPIC_API_KEY).is_some() {
            Some("anthropic".to_string())
        } else if env.get(vars::OPENAI_API_KEY).is_some() {
            Some("openai".to_string())
        } else if env.get(vars::AWS_ACCESS_KEY_ID).is_some() {
            Some("bedrock".to_string())
        } else if env.get(vars::GOOGLE_CLOUD_PROJECT).is_some() {
            Some("vertex".to_string())
        } else {
            None
        };

        config
    }

    /// The default provider name, falling back to "anthropic".
    pub fn default_provider(&self) -> &str {
        self.providers.default.as_deref().unwrap_or("anthropic")
    }
}

/// Configuration builder for creating configs programmatically.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new config builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default provider.
    pub fn default_provider(mut self, name: impl Into<String>) -> Self {
        self.config.providers.default = Some(name.into());
        self
    }

    /// Add settings for a provider.
    pub fn provider(mut self, name: impl Into<String>, settings: ProviderSettings) -> Self {
        self.config
            .providers
            .settings
            .insert(name.into().to_lowercase(), settings);
        self
    }

    /// Set the default generation parameters.
    pub fn generation(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.config.generation = GenerationConfig {
            max_tokens,
            temperature,
        };
        self
    }

    /// Set the log level.
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Build the config.
    pub fn build(self) -> Config {
        self.config
    }
}
