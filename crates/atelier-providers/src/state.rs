//! Per-instance provider state: construction inputs, model selection and
//! vendor client availability.

use crate::error::{ProviderError, Result};
use atelier_core::config::ProviderSettings;
use atelier_core::{Environment, SecretString};
use tracing::warn;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Everything an adapter constructor receives.
#[derive(Debug, Clone)]
pub struct ProviderInit {
    /// Explicit credential. Adapters that use ambient credentials may ignore it.
    pub api_key: Option<SecretString>,

    /// Model to select; the adapter's default when absent.
    pub model: Option<String>,

    /// API base URL override.
    pub base_url: Option<String>,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// AWS region override (Bedrock).
    pub region: Option<String>,

    /// Google Cloud project override (Vertex).
    pub project: Option<String>,

    /// Google Cloud location override (Vertex).
    pub location: Option<String>,

    /// Where ambient settings are read from.
    pub env: Environment,
}

impl Default for ProviderInit {
    fn default() -> Self {
        Self {
            api_key: None,
            model: None,
            base_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            region: None,
            project: None,
            location: None,
            env: Environment::process(),
        }
    }
}

impl ProviderInit {
    /// Inputs with an API key.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::non_empty(api_key),
            ..Default::default()
        }
    }

    /// Build from a config section.
    pub fn from_settings(settings: &ProviderSettings, env: Environment) -> Self {
        Self {
            api_key: settings
                .api_key
                .as_ref()
                .and_then(|k| SecretString::non_empty(k.expose_secret())),
            model: settings.model.clone(),
            base_url: settings.base_url.clone(),
            timeout_secs: settings.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            region: settings.region.clone(),
            project: settings.project.clone(),
            location: settings.location.clone(),
            env,
        }
    }

    /// Set the environment.
    pub fn env(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }
}

/// The model an adapter currently targets, plus its allow-list.
#[derive(Debug, Clone)]
pub struct ModelSelection {
    provider: &'static str,
    default_model: &'static str,
    supported: &'static [&'static str],
    current: String,
}

impl ModelSelection {
    /// Start with `model`, or the default when absent.
    ///
    /// The initial model is not checked against the allow-list; only
    /// [`ModelSelection::select`] enforces it.
    pub fn new(
        provider: &'static str,
        default_model: &'static str,
        supported: &'static [&'static str],
        model: Option<String>,
    ) -> Self {
        let current = model.unwrap_or_else(|| default_model.to_string());
        if !supported.contains(&current.as_str()) {
            warn!(provider, model = %current, "Constructed with a model outside the supported list");
        }
        Self {
            provider,
            default_model,
            supported,
            current,
        }
    }

    /// Model used when none is given.
    pub fn default_model(&self) -> &'static str {
        self.default_model
    }

    /// Allow-list for [`ModelSelection::select`].
    pub fn supported(&self) -> &'static [&'static str] {
        self.supported
    }

    /// Currently selected model.
    pub fn current(&self) -> &str {
        &self.current
    }

    /// Membership test against the allow-list.
    pub fn validate(&self, model: &str) -> bool {
        self.supported.contains(&model)
    }

    /// Switch models; leaves the current model untouched on error.
    pub fn select(&mut self, model: &str) -> Result<()> {
        if !self.validate(model) {
            return Err(ProviderError::invalid_model(model, self.provider));
        }
        self.current = model.to_string();
        Ok(())
    }
}

/// Whether the vendor client could be built.
///
/// Decided once at construction. An `Unavailable` instance stays that way;
/// create a new provider to try again.
#[derive(Debug, Clone)]
pub enum ClientState<C> {
    /// Client constructed and usable.
    Ready(C),

    /// Client could not be constructed, with the reason.
    Unavailable(String),
}

impl<C> ClientState<C> {
    /// Build from a fallible constructor, logging the reason on failure.
    pub fn from_result(display_name: &str, result: Result<C>) -> Self {
        match result {
            Ok(client) => Self::Ready(client),
            Err(e) => {
                let reason = e.message();
                warn!("{} client unavailable: {}", display_name, reason);
                Self::Unavailable(reason)
            }
        }
    }

    /// Check whether the client is ready.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Reason the client is unavailable.
    pub fn unavailable_reason(&self) -> Option<&str> {
        match self {
            Self::Ready(_) => None,
            Self::Unavailable(reason) => Some(reason),
        }
    }

    /// Borrow the client, or fail with `NotInitialized`.
    pub fn client(&self, display_name: &str) -> Result<&C> {
        match self {
            Self::Ready(client) => Ok(client),
            Self::Unavailable(_) => Err(ProviderError::not_initialized(display_name)),
        }
    }
}
