//! OpenAI GPT provider implementation.
//!
//! This module provides integration with OpenAI's Chat Completions API.

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
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Default OpenAI API base URL.
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Models accepted by `set_model`.
pub const SUPPORTED_MODELS: &[&str] =
    &["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "gpt-4", "gpt-3.5-turbo"];

/// The Chat Completions call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatCompletionsApi: Send + Sync {
    /// Create one chat completion.
    async fn create_chat_completion(&self, request: &OpenAIRequest) -> Result<OpenAIResponse>;
}

/// Chat Completions client over HTTPS.
pub struct HttpChatCompletionsClient {
    client: Client,
    api_key: SecretString,
    api_base: String,
    organization: Option<String>,
}

impl HttpChatCompletionsClient {
    /// Create a client; fails when the key is missing.
    pub fn new(api_key: Option<SecretString>, timeout_secs: u64) -> Result<Self> {
        let api_key = api_key
            .ok_or_else(|| ProviderError::config(format!("{} not set", vars::OPENAI_API_KEY)))?;

        Ok(Self {
            client: build_client(timeout_secs)?,
            api_key,
            api_base: DEFAULT_API_BASE.to_string(),
            organization: None,
        })
    }

    /// Set the API base URL (for Azure OpenAI or compatible APIs).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the organization ID.
    pub fn with_organization(mut self, org: impl Into<String>) -> Self {
        self.organization = Some(org.into());
        self
    }
}

#[async_trait]
impl ChatCompletionsApi for HttpChatCompletionsClient {
    async fn create_chat_completion(&self, request: &OpenAIRequest) -> Result<OpenAIResponse> {
        let mut req = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(self.api_key.expose_secret())
            .header("Content-Type", "application/json");

        if let Some(org) = &self.organization {
            req = req.header("OpenAI-Organization", org);
        }

        let response = req.json(request).send().await?;
        read_json(response).await
    }
}

/// OpenAI GPT provider.
pub struct OpenAIProvider {
    client: ClientState<Arc<dyn ChatCompletionsApi>>,
    models: ModelSelection,
}

impl OpenAIProvider {
    /// Create a provider with an API key and the default model.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::from_init(ProviderInit::with_api_key(api_key))
    }

    /// Create a provider from `OPENAI_API_KEY`.
    pub fn from_env() -> Self {
        let init = ProviderInit::default();
        let api_key = init.env.get(vars::OPENAI_API_KEY);
        Self::from_init(ProviderInit {
            api_key: api_key.and_then(SecretString::non_empty),
            ..init
        })
    }

    /// Create a provider from construction inputs.
    ///
    /// A missing key leaves the provider constructed but unavailable.
    pub fn from_init(init: ProviderInit) -> Self {
        let organization = init.env.get(vars::OPENAI_ORG_ID);
        let client = HttpChatCompletionsClient::new(init.api_key, init.timeout_secs).map(|c| {
            let c = match init.base_url {
                Some(url) => c.with_base_url(url),
                None => c,
            };
            let c = match organization {
                Some(org) => c.with_organization(org),
                None => c,
            };
            Arc::new(c) as Arc<dyn ChatCompletionsApi>
        });

        Self {
            client: ClientState::from_result("OpenAI", client),
            models: ModelSelection::new("openai", DEFAULT_MODEL, SUPPORTED_MODELS, init.model),
        }
    }

    /// Create a provider around an existing client.
    pub fn with_client(client: Arc<dyn ChatCompletionsApi>, model: Option<String>) -> Self {
        Self {
            client: ClientState::Ready(client),
            models: ModelSelection::new("openai", DEFAULT_MODEL, SUPPORTED_MODELS, model),
        }
    }

    /// Create a provider whose client is unavailable.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            client: ClientState::Unavailable(reason.into()),
            models: ModelSelection::new("openai", DEFAULT_MODEL, SUPPORTED_MODELS, None),
        }
    }

    async fn send(
        &self,
        prompt: &str,
        image: Option<&EncodedImage>,
        options: &GenerateOptions,
    ) -> Result<ProviderResponse> {
        let client = self.client.client(self.display_name())?;

        let content = match image {
            None => OpenAIContent::Text(prompt.to_string()),
            Some(img) => OpenAIContent::Parts(vec![
                OpenAIContentPart::Text {
                    text: prompt.to_string(),
                },
                OpenAIContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: img.data_uri(),
                    },
                },
            ]),
        };

        let request = OpenAIRequest {
            model: self.model().to_string(),
            messages: vec![OpenAIMessage {
                role: "user".to_string(),
                content,
            }],
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        debug!("Sending request to OpenAI: model={}", self.model());
        let response = client.create_chat_completion(&request).await?;
        parse_response(response)
    }
}

fn parse_response(response: OpenAIResponse) -> Result<ProviderResponse> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::vendor("no choices in response"))?;

    let actions = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| Action {
            id: Some(tc.id),
            name: tc.function.name,
            input: serde_json::from_str(&tc.function.arguments)
                .unwrap_or(Value::String(tc.function.arguments)),
        })
        .collect();

    let mut result = ProviderResponse::text(choice.message.content.unwrap_or_default())
        .with_actions(actions);

    if let Some(u) = response.usage {
        result = result.with_usage(HashMap::from([
            ("input_tokens".to_string(), u.prompt_tokens),
            ("output_tokens".to_string(), u.completion_tokens),
            ("total_tokens".to_string(), u.total_tokens),
        ]));
    }

    Ok(result)
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn display_name(&self) -> &str {
        "OpenAI"
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
        self.client.client(self.display_name())?;
        let encoded = image.encode()?;
        self.send(prompt, Some(&encoded), options).await
    }
}

// Wire types for the Chat Completions API

/// Chat Completions request body.
#[derive(Debug, Clone, Serialize)]
pub struct OpenAIRequest {
    pub model: String,
    pub messages: Vec<OpenAIMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// One request message.
#[derive(Debug, Clone, Serialize)]
pub struct OpenAIMessage {
    pub role: String,
    pub content: OpenAIContent,
}

/// Message content: a bare string or typed parts.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OpenAIContent {
    Text(String),
    Parts(Vec<OpenAIContentPart>),
}

/// Typed content part.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpenAIContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

/// Image reference, here always a `data:` URI.
#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Chat Completions response body.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<OpenAIChoice>,
    #[serde(default)]
    pub usage: Option<OpenAIUsage>,
}

/// One completion choice.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIChoice {
    pub message: OpenAIResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Assistant message in a choice.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<OpenAIToolCall>>,
}

/// Function call requested by the model.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIToolCall {
    pub id: String,
    pub function: OpenAIFunctionCall,
}

/// Function name and JSON-encoded arguments.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIFunctionCall {
    pub name: String,
    pub arguments: String,
}

/// Token usage block.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}
