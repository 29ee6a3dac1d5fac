//! Error types for model providers.

use crate::types::ProviderResponse;
use thiserror::Error;

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Fixed content returned when an image is sent to a text-only model.
pub const UNSUPPORTED_IMAGE_INPUT: &str = "Current model does not support image input";

/// Provider error types.
///
/// `UnknownProvider` and `InvalidModel` are caller mistakes and are always
/// returned as errors. Everything else can also be folded into a
/// [`ProviderResponse`] through [`ProviderError::into_response`], which is
/// what the compatibility `generate` methods do.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No adapter is registered under this name.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Model is not in the adapter's supported list.
    #[error("Invalid model '{model}' for provider '{provider}'")]
    InvalidModel { model: String, provider: String },

    /// The vendor client could not be constructed for this instance.
    #[error("{provider} client not initialized")]
    NotInitialized { provider: String },

    /// The selected model cannot take this kind of input.
    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    /// Authentication error (invalid API key, etc.).
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded: {message}. Retry after {retry_after:?} seconds")]
    RateLimit {
        message: String,
        retry_after: Option<u64>,
    },

    /// Invalid request (bad parameters, etc.).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Server error from the provider.
    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    /// Network error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Image could not be decoded or encoded.
    #[error("Image error: {0}")]
    Image(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Any other failure reported by the vendor.
    #[error("Vendor error: {0}")]
    Vendor(String),
}

impl ProviderError {
    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Authentication(message.into())
    }

    /// Create a rate limit error.
    pub fn rate_limit(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Self::RateLimit {
            message: message.into(),
            retry_after,
        }
    }

    /// Create an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create a server error.
    pub fn server_error(status: u16, message: impl Into<String>) -> Self {
        Self::ServerError {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid model error.
    pub fn invalid_model(model: impl Into<String>, provider: impl Into<String>) -> Self {
        Self::InvalidModel {
            model: model.into(),
            provider: provider.into(),
        }
    }

    /// Create a not-initialized error for a vendor display name.
    pub fn not_initialized(provider: impl Into<String>) -> Self {
        Self::NotInitialized {
            provider: provider.into(),
        }
    }

    /// Create an image error.
    pub fn image(message: impl Into<String>) -> Self {
        Self::Image(message.into())
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a vendor error.
    pub fn vendor(message: impl Into<String>) -> Self {
        Self::Vendor(message.into())
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimit { .. } => true,
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::ServerError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Get retry delay if applicable.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimit { retry_after, .. } => *retry_after,
            Self::ServerError { status, .. } if *status >= 500 => Some(5),
            _ => None,
        }
    }

    /// The underlying message without the category prefix.
    pub fn message(&self) -> String {
        match self {
            Self::UnknownProvider(name) => format!("Unknown provider: {}", name),
            Self::InvalidModel { .. } | Self::NotInitialized { .. } => self.to_string(),
            Self::UnsupportedInput(m)
            | Self::Authentication(m)
            | Self::InvalidRequest(m)
            | Self::Image(m)
            | Self::Config(m)
            | Self::Vendor(m) => m.clone(),
            Self::RateLimit { message, .. } | Self::ServerError { message, .. } => message.clone(),
            Self::Network(e) => e.to_string(),
            Self::Serialization(e) => e.to_string(),
        }
    }

    /// Render the error the way it appears in a response's `content`.
    pub fn to_content(&self) -> String {
        match self {
            Self::NotInitialized { .. } => self.to_string(),
            Self::UnsupportedInput(_) => UNSUPPORTED_IMAGE_INPUT.to_string(),
            _ => format!("Error: {}", self.message()),
        }
    }

    /// Fold the error into a response carrying only `content`.
    pub fn into_response(self) -> ProviderResponse {
        ProviderResponse::text(self.to_content())
    }
}
