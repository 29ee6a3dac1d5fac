//! Uniform text generation over several model vendors.
//!
//! This crate provides one [`Provider`] contract and four adapters:
//! - Anthropic (Claude via the Messages API)
//! - OpenAI (Chat Completions)
//! - AWS Bedrock (Claude models via `InvokeModel`)
//! - Vertex AI (Claude models published on Google Cloud)
//!
//! Adapters are obtained from a [`ProviderRegistry`], which resolves
//! credentials from the environment when none are given.
//!
//! # Example
//!
//! ```rust,ignore
//! use atelier_providers::{GenerateOptions, Provider, ProviderRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = ProviderRegistry::new();
//!     let provider = registry.create("anthropic", None, None)?;
//!
//!     let response = provider.generate("Describe this mug", &GenerateOptions::default()).await;
//!     println!("{}", response.content);
//!
//!     Ok(())
//! }
//! ```

mod error;
mod http;
mod state;
mod types;

#[cfg(feature = "anthropic")]
pub mod anthropic;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "bedrock")]
pub mod bedrock;

#[cfg(feature = "vertex")]
pub mod vertex;

pub mod registry;

pub use error::{ProviderError, Result, UNSUPPORTED_IMAGE_INPUT};
pub use registry::{ProviderConstructor, ProviderRegistry};
pub use state::{ClientState, ModelSelection, ProviderInit, DEFAULT_TIMEOUT_SECS};
pub use types::*;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::warn;

/// A model vendor that turns a prompt, optionally with an image, into text.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Registry key, e.g. "openai".
    fn name(&self) -> &str;

    /// Human-readable vendor name used in status messages.
    fn display_name(&self) -> &str;

    /// Current model selection.
    fn models(&self) -> &ModelSelection;

    /// Mutable model selection.
    fn models_mut(&mut self) -> &mut ModelSelection;

    /// Whether the vendor client was constructed.
    fn is_ready(&self) -> bool;

    /// Model used when the caller specifies none.
    fn default_model(&self) -> &str {
        self.models().default_model()
    }

    /// Models accepted by [`Provider::set_model`].
    fn supported_models(&self) -> &[&'static str] {
        self.models().supported()
    }

    /// Currently selected model.
    fn model(&self) -> &str {
        self.models().current()
    }

    /// Check whether a model is in the supported list.
    fn validate_model(&self, model: &str) -> bool {
        self.models().validate(model)
    }

    /// Switch to another supported model.
    fn set_model(&mut self, model: &str) -> Result<()> {
        self.models_mut().select(model)
    }

    /// Generate text, reporting failures as errors.
    async fn try_generate(&self, prompt: &str, options: &GenerateOptions)
        -> Result<ProviderResponse>;

    /// Generate text from a prompt and an image, reporting failures as errors.
    async fn try_generate_with_image(
        &self,
        prompt: &str,
        image: &ImageInput,
        options: &GenerateOptions,
    ) -> Result<ProviderResponse>;

    /// Generate text; failures come back as sentinel text in `content`.
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> ProviderResponse {
        match self.try_generate(prompt, options).await {
            Ok(response) => response,
            Err(e) => {
                warn!(provider = self.name(), model = self.model(), "Generation failed: {}", e);
                e.into_response()
            }
        }
    }

    /// Image-conditioned generation; failures come back as sentinel text in `content`.
    async fn generate_with_image(
        &self,
        prompt: &str,
        image: &ImageInput,
        options: &GenerateOptions,
    ) -> ProviderResponse {
        match self.try_generate_with_image(prompt, image, options).await {
            Ok(response) => response,
            Err(e) => {
                warn!(provider = self.name(), model = self.model(), "Image generation failed: {}", e);
                e.into_response()
            }
        }
    }
}

/// Send the same prompt to every provider concurrently.
///
/// Results keep the order of `providers` and are paired with each provider's name.
pub async fn fan_out(
    providers: &[Box<dyn Provider>],
    prompt: &str,
    options: &GenerateOptions,
) -> Vec<(String, ProviderResponse)> {
    let calls = providers.iter().map(|provider| async move {
        let response = provider.generate(prompt, options).await;
        (provider.name().to_string(), response)
    });
    join_all(calls).await
}

/// Like [`fan_out`], with an image attached to every request.
pub async fn fan_out_with_image(
    providers: &[Box<dyn Provider>],
    prompt: &str,
    image: &ImageInput,
    options: &GenerateOptions,
) -> Vec<(String, ProviderResponse)> {
    let calls = providers.iter().map(|provider| async move {
        let response = provider.generate_with_image(prompt, image, options).await;
        (provider.name().to_string(), response)
    });
    join_all(calls).await
}
