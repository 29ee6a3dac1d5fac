//! AWS Bedrock provider implementation.
//!
//! Invokes Anthropic models hosted on Bedrock. Claude 3 models take the
//! Messages payload; older Claude models take the legacy completion prompt.
//!
//! Requests go through the AWS SDK, which resolves credentials from static
//! keys, shared profiles, SSO, web identity or instance and container roles.
//! An explicit API key is sent as a Bedrock bearer token instead.

use crate::anthropic::{first_text, tool_actions, user_message, MessagesRequest, MessagesResponse};
use crate::http::{build_client, read_json};
use crate::{
    ClientState, EncodedImage, GenerateOptions, ImageInput, ModelSelection, Provider,
    ProviderError, ProviderInit, ProviderResponse, Result,
};
use async_trait::async_trait;
use atelier_core::env::vars;
use atelier_core::{Environment, SecretString};
use aws_config::profile::profile_file::{ProfileFileKind, ProfileFiles};
use aws_config::profile::ProfileFileCredentialsProvider;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_bedrockruntime::config::Region;
use aws_sdk_bedrockruntime::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_bedrockruntime::operation::invoke_model::InvokeModelError;
use aws_sdk_bedrockruntime::primitives::Blob;
use reqwest::Client;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

/// Region used when neither the config nor `AWS_REGION` names one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Body-level version string for Messages payloads on Bedrock.
const BEDROCK_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "anthropic.claude-3-5-sonnet-20241022-v2:0";

/// Models accepted by `set_model`.
pub const SUPPORTED_MODELS: &[&str] = &[
    "anthropic.claude-3-5-sonnet-20241022-v2:0",
    "anthropic.claude-3-sonnet-20240229-v1:0",
    "anthropic.claude-3-haiku-20240307-v1:0",
    "anthropic.claude-3-opus-20240229-v1:0",
    "anthropic.claude-v2:1",
    "anthropic.claude-v2",
    "anthropic.claude-instant-v1",
];

/// The `InvokeModel` call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InvokeModelApi: Send + Sync {
    /// Invoke a model with a JSON body and return the JSON response body.
    async fn invoke_model(&self, model_id: &str, body: &Value) -> Result<Value>;
}

/// Where the SDK looks for AWS credentials.
#[derive(Debug, Clone, PartialEq)]
pub enum AwsCredentialSource {
    /// `AWS_ACCESS_KEY_ID` and `AWS_SECRET_ACCESS_KEY`, with an optional session token.
    Static {
        access_key_id: String,
        secret_access_key: SecretString,
        session_token: Option<SecretString>,
    },

    /// A shared-config profile, optionally read from non-default files.
    Profile {
        name: Option<String>,
        credentials_file: Option<PathBuf>,
        config_file: Option<PathBuf>,
    },

    /// The SDK's default provider chain.
    DefaultChain,
}

impl AwsCredentialSource {
    /// Resolve the source from the standard AWS variables in `env`.
    ///
    /// Static keys win over profile settings. With neither, the SDK's own
    /// chain runs (SSO, web identity, container and instance roles).
    pub fn from_env(env: &Environment) -> Self {
        if let (Some(access_key_id), Some(secret)) = (
            env.get(vars::AWS_ACCESS_KEY_ID),
            env.get(vars::AWS_SECRET_ACCESS_KEY),
        ) {
            return Self::Static {
                access_key_id,
                secret_access_key: SecretString::new(secret),
                session_token: env.get(vars::AWS_SESSION_TOKEN).map(SecretString::new),
            };
        }

        let name = env.get(vars::AWS_PROFILE);
        let credentials_file = env.get(vars::AWS_SHARED_CREDENTIALS_FILE).map(PathBuf::from);
        let config_file = env.get(vars::AWS_CONFIG_FILE).map(PathBuf::from);
        if name.is_some() || credentials_file.is_some() || config_file.is_some() {
            return Self::Profile {
                name,
                credentials_file,
                config_file,
            };
        }

        Self::DefaultChain
    }
}

/// Bedrock runtime client on the AWS SDK.
///
/// The SDK config is loaded on first use, since credential discovery is async.
pub struct SdkBedrockClient {
    region: String,
    endpoint: Option<String>,
    credentials: AwsCredentialSource,
    timeout_secs: u64,
    client: OnceCell<aws_sdk_bedrockruntime::Client>,
}

impl SdkBedrockClient {
    /// Create a client for a region.
    pub fn new(credentials: AwsCredentialSource, region: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            region: region.into(),
            endpoint: None,
            credentials,
            timeout_secs,
            client: OnceCell::new(),
        }
    }

    /// Override the runtime endpoint.
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    /// Region requests are signed for.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Where credentials are looked up.
    pub fn credentials(&self) -> &AwsCredentialSource {
        &self.credentials
    }

    async fn client(&self) -> &aws_sdk_bedrockruntime::Client {
        self.client
            .get_or_init(|| async {
                let timeouts = TimeoutConfig::builder()
                    .operation_timeout(Duration::from_secs(self.timeout_secs))
                    .build();
                let mut loader = aws_config::defaults(BehaviorVersion::latest())
                    .region(Region::new(self.region.clone()))
                    .timeout_config(timeouts);

                match &self.credentials {
                    AwsCredentialSource::Static {
                        access_key_id,
                        secret_access_key,
                        session_token,
                    } => {
                        loader = loader.credentials_provider(Credentials::new(
                            access_key_id.clone(),
                            secret_access_key.expose_secret().to_string(),
                            session_token.as_ref().map(|t| t.expose_secret().to_string()),
                            None,
                            "atelier-environment",
                        ));
                    }
                    AwsCredentialSource::Profile {
                        name,
                        credentials_file,
                        config_file,
                    } => {
                        let mut provider = ProfileFileCredentialsProvider::builder();
                        if let Some(name) = name {
                            loader = loader.profile_name(name);
                            provider = provider.profile_name(name);
                        }
                        if credentials_file.is_some() || config_file.is_some() {
                            let mut files = ProfileFiles::builder();
                            files = match credentials_file {
                                Some(path) => files.with_file(ProfileFileKind::Credentials, path),
                                None => files.include_default_credentials_file(true),
                            };
                            files = match config_file {
                                Some(path) => files.with_file(ProfileFileKind::Config, path),
                                None => files.include_default_config_file(true),
                            };
                            let files = files.build();
                            loader = loader.profile_files(files.clone());
                            provider = provider.profile_files(files);
                        }
                        loader = loader.credentials_provider(provider.build());
                    }
                    AwsCredentialSource::DefaultChain => {}
                }

                if let Some(url) = &self.endpoint {
                    loader = loader.endpoint_url(url);
                }

                debug!("Loading AWS config for region {}", self.region);
                aws_sdk_bedrockruntime::Client::new(&loader.load().await)
            })
            .await
    }
}

#[async_trait]
impl InvokeModelApi for SdkBedrockClient {
    async fn invoke_model(&self, model_id: &str, body: &Value) -> Result<Value> {
        let payload = serde_json::to_vec(body)?;

        let output = self
            .client()
            .await
            .invoke_model()
            .model_id(model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(payload))
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(serde_json::from_slice(output.body().as_ref())?)
    }
}

/// Map an SDK failure onto the provider error taxonomy.
fn sdk_error(err: SdkError<InvokeModelError>) -> ProviderError {
    match err.as_service_error() {
        Some(InvokeModelError::ThrottlingException(e)) => {
            ProviderError::rate_limit(e.message().unwrap_or("Too many requests"), None)
        }
        Some(InvokeModelError::AccessDeniedException(e)) => {
            ProviderError::auth(e.message().unwrap_or("Access denied"))
        }
        Some(InvokeModelError::ValidationException(e)) => {
            ProviderError::invalid_request(e.message().unwrap_or("Validation failed"))
        }
        Some(other) => {
            let message = other
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| DisplayErrorContext(other).to_string());
            ProviderError::vendor(message)
        }
        None => ProviderError::vendor(DisplayErrorContext(&err).to_string()),
    }
}

/// Bedrock runtime client authenticated with a Bedrock API key.
pub struct HttpBedrockClient {
    client: Client,
    api_key: SecretString,
    endpoint: String,
}

impl HttpBedrockClient {
    /// Create a client for a region.
    pub fn new(api_key: SecretString, region: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            endpoint: format!("https://bedrock-runtime.{}.amazonaws.com", region),
            api_key,
        })
    }

    /// Override the runtime endpoint.
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl InvokeModelApi for HttpBedrockClient {
    async fn invoke_model(&self, model_id: &str, body: &Value) -> Result<Value> {
        let url = format!(
            "{}/model/{}/invoke",
            self.endpoint,
            urlencoding::encode(model_id)
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .header("content-type", "application/json")
            .header("accept", "application/json")
            .json(body)
            .send()
            .await?;

        read_json(response).await
    }
}

/// AWS Bedrock provider.
pub struct BedrockProvider {
    client: ClientState<Arc<dyn InvokeModelApi>>,
    models: ModelSelection,
}

impl BedrockProvider {
    /// Create a provider from the process environment.
    pub fn from_env() -> Self {
        Self::from_init(ProviderInit::default())
    }

    /// Create a provider from construction inputs.
    ///
    /// An explicit key selects bearer auth. Otherwise credentials are
    /// discovered by the SDK at the first call, so a provider without them
    /// is ready and reports the failure in its response.
    pub fn from_init(init: ProviderInit) -> Self {
        let region = init
            .region
            .clone()
            .or_else(|| init.env.get(vars::AWS_REGION))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let client = match init.api_key {
            Some(key) => HttpBedrockClient::new(key, &region, init.timeout_secs).map(|c| {
                let c = match init.base_url.clone() {
                    Some(url) => c.with_endpoint(url),
                    None => c,
                };
                Arc::new(c) as Arc<dyn InvokeModelApi>
            }),
            None => {
                let credentials = AwsCredentialSource::from_env(&init.env);
                debug!("Bedrock credentials: {:?}", credentials);
                let c = SdkBedrockClient::new(credentials, region, init.timeout_secs);
                let c = match init.base_url.clone() {
                    Some(url) => c.with_endpoint(url),
                    None => c,
                };
                Ok(Arc::new(c) as Arc<dyn InvokeModelApi>)
            }
        };

        Self {
            client: ClientState::from_result("Bedrock", client),
            models: ModelSelection::new("bedrock", DEFAULT_MODEL, SUPPORTED_MODELS, init.model),
        }
    }

    /// Create a provider around an existing client.
    pub fn with_client(client: Arc<dyn InvokeModelApi>, model: Option<String>) -> Self {
        Self {
            client: ClientState::Ready(client),
            models: ModelSelection::new("bedrock", DEFAULT_MODEL, SUPPORTED_MODELS, model),
        }
    }

    /// Create a provider whose client is unavailable.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            client: ClientState::Unavailable(reason.into()),
            models: ModelSelection::new("bedrock", DEFAULT_MODEL, SUPPORTED_MODELS, None),
        }
    }

    async fn send(
        &self,
        prompt: &str,
        image: Option<&EncodedImage>,
        options: &GenerateOptions,
    ) -> Result<ProviderResponse> {
        let client = self.client.client(self.display_name())?;
        let model = self.model();
        let messages_api = is_messages_model(model);

        let body = if messages_api {
            serde_json::to_value(MessagesRequest {
                model: None,
                anthropic_version: Some(BEDROCK_ANTHROPIC_VERSION.to_string()),
                max_tokens: options.max_tokens,
                temperature: options.temperature,
                messages: vec![user_message(prompt, image)],
            })?
        } else {
            serde_json::json!({
                "prompt": format!("\n\nHuman: {}\n\nAssistant:", prompt),
                "max_tokens_to_sample": options.max_tokens,
                "temperature": options.temperature,
            })
        };

        debug!("Invoking Bedrock model: {}", model);
        let response = client.invoke_model(model, &body).await?;

        let result = if messages_api {
            let parsed: MessagesResponse = serde_json::from_value(response)?;
            ProviderResponse::text(first_text(&parsed)).with_actions(tool_actions(&parsed))
        } else {
            ProviderResponse::text(
                response
                    .get("completion")
                    .and_then(Value::as_str)
                    .unwrap_or_default(),
            )
        };

        Ok(result.with_model_metadata(model))
    }
}

/// Claude 3 models use the Messages payload and accept images.
fn is_messages_model(model: &str) -> bool {
    model.contains("claude-3")
}

#[async_trait]
impl Provider for BedrockProvider {
    fn name(&self) -> &str {
        "bedrock"
    }

    fn display_name(&self) -> &str {
        "Bedrock"
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
        // The capability check runs before the client check.
        if !is_messages_model(self.model()) {
            return Err(ProviderError::UnsupportedInput(self.model().to_string()));
        }
        self.client.client(self.display_name())?;
        let encoded = image.encode()?;
        self.send(prompt, Some(&encoded), options).await
    }
}
