//! Provider registry: maps names to adapter constructors.

use crate::{Provider, ProviderError, ProviderInit, Result};
use atelier_core::config::ProviderSettings;
use atelier_core::env::vars;
use atelier_core::{Config, Environment, SecretString};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Builds a new adapter instance from construction inputs.
pub type ProviderConstructor = Arc<dyn Fn(ProviderInit) -> Box<dyn Provider> + Send + Sync>;

/// Registry of provider constructors, keyed by lower-case name.
///
/// Every `create` call builds a fresh adapter; nothing is cached.
#[derive(Clone)]
pub struct ProviderRegistry {
    constructors: HashMap<String, ProviderConstructor>,
    env: Environment,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.list_providers())
            .field("env", &self.env)
            .finish()
    }
}

impl ProviderRegistry {
    /// Registry with the built-in adapters, reading the process environment.
    pub fn new() -> Self {
        Self::with_environment(Environment::process())
    }

    /// Registry with the built-in adapters, reading the given environment.
    pub fn with_environment(env: Environment) -> Self {
        let mut registry = Self::empty(env);

        #[cfg(feature = "anthropic")]
        registry.register_provider(
            "anthropic",
            Arc::new(|init: ProviderInit| -> Box<dyn Provider> {
                Box::new(crate::anthropic::AnthropicProvider::from_init(init))
            }),
        );

        #[cfg(feature = "openai")]
        registry.register_provider(
            "openai",
            Arc::new(|init: ProviderInit| -> Box<dyn Provider> {
                Box::new(crate::openai::OpenAIProvider::from_init(init))
            }),
        );

        #[cfg(feature = "bedrock")]
        registry.register_provider(
            "bedrock",
            Arc::new(|init: ProviderInit| -> Box<dyn Provider> {
                Box::new(crate::bedrock::BedrockProvider::from_init(init))
            }),
        );

        #[cfg(feature = "vertex")]
        registry.register_provider(
            "vertex",
            Arc::new(|init: ProviderInit| -> Box<dyn Provider> {
                Box::new(crate::vertex::VertexProvider::from_init(init))
            }),
        );

        registry
    }

    /// Registry with no adapters at all.
    pub fn empty(env: Environment) -> Self {
        Self {
            constructors: HashMap::new(),
            env,
        }
    }

    /// Register (or replace) a constructor. The name is lower-cased.
    pub fn register_provider(&mut self, name: impl AsRef<str>, constructor: ProviderConstructor) {
        let key = name.as_ref().to_lowercase();
        debug!("Registering provider: {}", key);
        self.constructors.insert(key, constructor);
    }

    /// Registered names, sorted.
    pub fn list_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check whether a name is registered (case-insensitive).
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(&name.to_lowercase())
    }

    /// Create an adapter by name.
    ///
    /// Without an explicit key, `ANTHROPIC_API_KEY` or `OPENAI_API_KEY` is
    /// used for those two adapters; the others discover their own ambient
    /// credentials. A missing credential still yields an adapter, one that
    /// reports itself as not initialized when used.
    pub fn create(
        &self,
        provider_type: &str,
        api_key: Option<&str>,
        model: Option<&str>,
    ) -> Result<Box<dyn Provider>> {
        let init = ProviderInit {
            api_key: api_key.and_then(SecretString::non_empty),
            model: model.map(str::to_string),
            env: self.env.clone(),
            ..Default::default()
        };
        self.build(provider_type, init)
    }

    /// Create an adapter from a config section.
    pub fn create_with(
        &self,
        provider_type: &str,
        settings: &ProviderSettings,
    ) -> Result<Box<dyn Provider>> {
        let init = ProviderInit::from_settings(settings, self.env.clone());
        self.build(provider_type, init)
    }

    /// Create the config's default provider with its settings.
    pub fn create_default(&self, config: &Config) -> Result<Box<dyn Provider>> {
        let name = config.default_provider();
        self.create_with(name, &config.provider_settings(name))
    }

    fn build(&self, provider_type: &str, mut init: ProviderInit) -> Result<Box<dyn Provider>> {
        let key = provider_type.to_lowercase();
        let constructor = self
            .constructors
            .get(&key)
            .ok_or_else(|| ProviderError::UnknownProvider(provider_type.to_string()))?;

        if init.api_key.is_none() {
            init.api_key = self.ambient_api_key(&key);
        }

        info!("Creating provider: {}", key);
        Ok(constructor(init))
    }

    fn ambient_api_key(&self, key: &str) -> Option<SecretString> {
        let var = match key {
            "anthropic" => vars::ANTHROPIC_API_KEY,
            "openai" => vars::OPENAI_API_KEY,
            _ => return None,
        };
        self.env.get(var).and_then(SecretString::non_empty)
    }
}
