//! Configuration schema definitions.

use crate::secret::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main Atelier configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Provider selection and per-provider settings.
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Default generation parameters.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Providers configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Provider used when none is named explicitly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Settings keyed by provider name ("anthropic", "bedrock", ...).
    #[serde(default)]
    pub settings: HashMap<String, ProviderSettings>,
}

/// Settings for a single provider.
///
/// Every field is optional; an adapter falls back to environment variables
/// and its own defaults for anything left unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// API key (Anthropic/OpenAI), bearer token (Bedrock) or access token (Vertex).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<SecretString>,

    /// Model to select at construction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// API base URL override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Request timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// AWS region (Bedrock).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Google Cloud project (Vertex).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Google Cloud location (Vertex).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Default generation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Maximum tokens to generate.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.7
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// The level as a tracing filter directive.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}
