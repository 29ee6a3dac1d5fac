//! Anthropic Claude provider implementation.
//!
//! Talks to the Messages API. The wire types and the [`MessagesApi`] seam are
//! shared with the Vertex adapter, which serves the same models and payloads
//! from Google Cloud.
//!
//! # Example
//!
//! ```rust,ignore
//! use atelier_providers::anthropic::AnthropicProvider;
//! use atelier_providers::{GenerateOptions, Provider};
//!
//! let provider = AnthropicProvider::new("your-api-key");
//! let response = provider.generate("Hello!", &GenerateOptions::default()).await;
//! ```

use crate::http::{build_client, read_json};
use crate::{
    Action, ClientState, EncodedImage, GenerateOptions, ImageInput, ModelSelection, Provider,
    ProviderError, ProviderInit, ProviderResponse, Result,
};
use async_trait::async_trait;
use atelier_core::env::vars;
use atelier_core::SecretString;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Default Anthropic API base URL.
const DEFAULT_API_BASE: &str = "https://api.anthropic.com";

/// Current API version.
const API_VERSION: &str = "2023-06-01";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Models accepted by `set_model`.
pub const SUPPORTED_MODELS: &[&str] = &[
    "claude-3-5-sonnet-20241022",
    "claude-3-5-haiku-20241022",
    "claude-3-opus-20240229",
    "claude-3-sonnet-20240229",
    "claude-3-haiku-20240307",
];

/// The vendor call behind the Anthropic and Vertex adapters.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagesApi: Send + Sync {
    /// Create a message (one non-streaming completion).
    async fn create_message(&self, request: &MessagesRequest) -> Result<MessagesResponse>;
}

/// Messages API client over HTTPS.
pub struct HttpMessagesClient {
    client: Client,
    api_key: SecretString,
    api_base: String,
}

impl HttpMessagesClient {
    /// Create a client; fails when the key is missing.
    pub fn new(api_key: Option<SecretString>, timeout_secs: u64) -> Result<Self> {
        let api_key = api_key
            .ok_or_else(|| ProviderError::config(format!("{} not set", vars::ANTHROPIC_API_KEY)))?;

        Ok(Self {
            client: build_client(timeout_secs)?,
            api_key,
            api_base: DEFAULT_API_BASE.to_string(),
        })
    }

    /// Set the API base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl MessagesApi for HttpMessagesClient {
    async fn create_message(&self, request: &MessagesRequest) -> Result<MessagesResponse> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.api_base))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await?;

        read_json(response).await
    }
}

/// Anthropic Claude provider.
pub struct AnthropicProvider {
    client: ClientState<Arc<dyn MessagesApi>>,
    models: ModelSelection,
}

impl AnthropicProvider {
    /// Create a provider with an API key and the default model.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::from_init(ProviderInit::with_api_key(api_key))
    }

    /// Create a provider from `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Self {
        let init = ProviderInit::default();
        let api_key = init.env.get(vars::ANTHROPIC_API_KEY);
        Self::from_init(ProviderInit {
            api_key: api_key.and_then(SecretString::non_empty),
            ..init
        })
    }

    /// Create a provider from construction inputs.
    ///
    /// A missing key leaves the provider constructed but unavailable.
    pub fn from_init(init: ProviderInit) -> Self {
        let client = HttpMessagesClient::new(init.api_key, init.timeout_secs).map(|c| {
            let c = match init.base_url {
                Some(url) => c.with_base_url(url),
                None => c,
            };
            Arc::new(c) as Arc<dyn MessagesApi>
        });

        Self {
            client: ClientState::from_result("Anthropic", client),
            models: ModelSelection::new("anthropic", DEFAULT_MODEL, SUPPORTED_MODELS, init.model),
        }
    }

    /// Create a provider around an existing client.
    pub fn with_client(client: Arc<dyn MessagesApi>, model: Option<String>) -> Self {
        Self {
            client: ClientState::Ready(client),
            models: ModelSelection::new("anthropic", DEFAULT_MODEL, SUPPORTED_MODELS, model),
        }
    }

    /// Create a provider whose client is unavailable.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            client: ClientState::Unavailable(reason.into()),
            models: ModelSelection::new("anthropic", DEFAULT_MODEL, SUPPORTED_MODELS, None),
        }
    }

    async fn send(
        &self,
        prompt: &str,
        image: Option<&EncodedImage>,
        options: &GenerateOptions,
    ) -> Result<ProviderResponse> {
        let client = self.client.client(self.display_name())?;
        let request = MessagesRequest {
            model: Some(self.model().to_string()),
            anthropic_version: None,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            messages: vec![user_message(prompt, image)],
        };

        debug!("Sending request to Anthropic: model={}", self.model());
        let response = client.create_message(&request).await?;

        let mut result =
            ProviderResponse::text(first_text(&response)).with_actions(tool_actions(&response));

        if let Some(u) = &response.usage {
            result = result.with_usage(HashMap::from([
                ("input_tokens".to_string(), u.input_tokens),
                ("output_tokens".to_string(), u.output_tokens),
            ]));
        }

        Ok(result)
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn display_name(&self) -> &str {
        "Anthropic"
    }

    fn models(&self) -> &ModelSelection {
        &self.models
    }

    fn models_mut(&mut self) -> &mut ModelSelection {
        &mut self.models
    }

    fn is_ready(&self) -> bool {
        self.client.is_ready()
    }

    async fn try_generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<ProviderResponse> {
        self.send(prompt, None, options).await
    }

    async fn try_generate_with_image(
        &self,
        prompt: &str,
        image: &ImageInput,
        options: &GenerateOptions,
    ) -> Result<ProviderResponse> {
        // Client check comes first so a degraded provider never encodes the image.
        self.client.client(self.display_name())?;
        let encoded = image.encode()?;
        self.send(prompt, Some(&encoded), options).await
    }
}

/// Build the single user turn: a plain string, or image block then text block.
pub(crate) fn user_message(prompt: &str, image: Option<&EncodedImage>) -> RequestMessage {
    let content = match image {
        None => MessageContent::Text(prompt.to_string()),
        Some(img) => MessageContent::Blocks(vec![
            ContentBlock::Image {
                source: ImageSource {
                    source_type: "base64".to_string(),
                    media_type: img.media_type.clone(),
                    data: img.data.clone(),
                },
            },
            ContentBlock::Text {
                text: prompt.to_string(),
            },
        ]),
    };

    RequestMessage {
        role: "user".to_string(),
        content,
    }
}

/// Text of the first content block; empty when there is none.
pub(crate) fn first_text(response: &MessagesResponse) -> String {
    match response.content.first() {
        Some(ResponseBlock::Text { text }) => text.clone(),
        _ => String::new(),
    }
}

/// Every `tool_use` block as an action.
pub(crate) fn tool_actions(response: &MessagesResponse) -> Vec<Action> {
    response
        .content
        .iter()
        .filter_map(|block| match block {
            ResponseBlock::ToolUse { id, name, input } => Some(Action {
                id: Some(id.clone()),
                name: name.clone(),
                input: input.clone(),
            }),
            _ => None,
        })
        .collect()
}

// Wire types for the Messages API

/// Messages API request body.
#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    /// Model id. Vertex carries the model in the URL and omits it here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Body-level API version (Vertex and Bedrock only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anthropic_version: Option<String>,

    pub max_tokens: u32,
    pub temperature: f32,
    pub messages: Vec<RequestMessage>,
}

/// One conversation turn.
#[derive(Debug, Clone, Serialize)]
pub struct RequestMessage {
    pub role: String,
    pub content: MessageContent,
}

/// Turn content: a bare string or a list of blocks.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// Request content block.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

/// Inline image source.
#[derive(Debug, Clone, Serialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub media_type: String,
    pub data: String,
}

/// Messages API response body.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub content: Vec<ResponseBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Option<MessagesUsage>,
}

/// Response content block.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

/// Token usage block.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}
