//! Vertex AI provider implementation.
//!
//! Serves Anthropic models published on Google Cloud through the
//! `rawPredict` endpoint. Payloads are Messages API payloads with the model
//! moved into the URL.
//!
//! Access tokens come from the first of:
//! 1. an explicit key
//! 2. `GOOGLE_OAUTH_ACCESS_TOKEN`
//! 3. the JSON key named by `GOOGLE_APPLICATION_CREDENTIALS`
//! 4. gcloud's application default credentials file
//! 5. the GCE metadata server

use crate::anthropic::{
    first_text, tool_actions, user_message, MessagesApi, MessagesRequest, MessagesResponse,
};
use crate::http::{build_client, read_json};
use crate::{
    ClientState, EncodedImage, GenerateOptions, ImageInput, ModelSelection, Provider,
    ProviderError, ProviderInit, ProviderResponse, Result,
};
use async_trait::async_trait;
use atelier_core::env::vars;
use atelier_core::{Environment, SecretString};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Location used when neither the config nor `GOOGLE_CLOUD_LOCATION` names one.
pub const DEFAULT_LOCATION: &str = "us-central1";

/// Body-level version string for Messages payloads on Vertex.
const VERTEX_ANTHROPIC_VERSION: &str = "vertex-2023-10-16";

/// Default service account token endpoint on GCE, Cloud Run and GKE.
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Google's OAuth token endpoint.
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Scope requested for service-account and user tokens.
const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Grant type for signed service-account assertions.
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Tokens are refreshed this long before they expire.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-v2@20241022";

/// Models accepted by `set_model`.
pub const SUPPORTED_MODELS: &[&str] = &[
    "claude-3-5-sonnet-v2@20241022",
    "claude-3-5-sonnet@20240620",
    "claude-3-opus@20240229",
    "claude-3-haiku@20240307",
];

/// Where access tokens come from.
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// A fixed OAuth access token.
    Static(SecretString),

    /// A downloaded JSON credentials file.
    Credentials(GoogleCredentials),

    /// The metadata server at this URL.
    Metadata(String),
}

impl TokenSource {
    /// Resolve the token source for an adapter.
    pub fn resolve(api_key: Option<SecretString>, env: &Environment) -> Result<Self> {
        if let Some(key) = api_key {
            return Ok(Self::Static(key));
        }
        if let Some(token) = env
            .get(vars::GOOGLE_OAUTH_ACCESS_TOKEN)
            .and_then(SecretString::non_empty)
        {
            return Ok(Self::Static(token));
        }
        if let Some(path) = env
            .get(vars::GOOGLE_APPLICATION_CREDENTIALS)
            .filter(|p| !p.is_empty())
        {
            return GoogleCredentials::from_file(Path::new(&path)).map(Self::Credentials);
        }
        if let Some(path) = well_known_credentials_file(env).filter(|p| p.is_file()) {
            debug!("Using gcloud credentials at {}", path.display());
            return GoogleCredentials::from_file(&path).map(Self::Credentials);
        }
        Ok(Self::Metadata(METADATA_TOKEN_URL.to_string()))
    }
}

/// gcloud's application default credentials file.
fn well_known_credentials_file(env: &Environment) -> Option<PathBuf> {
    if let Some(dir) = env.get(vars::CLOUDSDK_CONFIG) {
        return Some(PathBuf::from(dir).join("application_default_credentials.json"));
    }
    env.get(vars::HOME).map(|home| {
        PathBuf::from(home)
            .join(".config")
            .join("gcloud")
            .join("application_default_credentials.json")
    })
}

/// A Google credentials JSON file.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GoogleCredentials {
    /// A service-account key, exchanged through a signed JWT.
    ServiceAccount(ServiceAccountKey),

    /// A user refresh token from `gcloud auth application-default login`.
    AuthorizedUser(AuthorizedUser),
}

impl GoogleCredentials {
    /// Read and parse a credentials file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ProviderError::config(format!(
                "Failed to read credentials file {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ProviderError::config(format!(
                "Invalid credentials file {}: {}",
                path.display(),
                e
            ))
        })
    }
}

/// Fields of a service-account key used for the JWT bearer grant.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: SecretString,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    fn token_uri(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(GOOGLE_TOKEN_URL)
    }

    /// Sign the assertion exchanged for an access token.
    fn assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: self.token_uri(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };
        let key = EncodingKey::from_rsa_pem(self.private_key.expose_secret().as_bytes())
            .map_err(|e| ProviderError::auth(format!("Invalid service account key: {}", e)))?;
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| ProviderError::auth(format!("Failed to sign token request: {}", e)))
    }
}

/// Fields of an authorized-user file used for the refresh-token grant.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: SecretString,
    pub refresh_token: SecretString,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: SecretString,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct FetchedToken {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Anthropic-on-Vertex client.
pub struct VertexMessagesClient {
    client: Client,
    project: String,
    location: String,
    api_base: String,
    tokens: TokenSource,
    cached: Mutex<Option<CachedToken>>,
}

impl VertexMessagesClient {
    /// Create a client for a project and location.
    pub fn new(
        project: impl Into<String>,
        location: impl Into<String>,
        tokens: TokenSource,
        timeout_secs: u64,
    ) -> Result<Self> {
        let location = location.into();
        let host = if location == "global" {
            "aiplatform.googleapis.com".to_string()
        } else {
            format!("{}-aiplatform.googleapis.com", location)
        };

        Ok(Self {
            client: build_client(timeout_secs)?,
            project: project.into(),
            api_base: format!("https://{}", host),
            location,
            tokens,
            cached: Mutex::new(None),
        })
    }

    /// Override the API base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/anthropic/models/{}:rawPredict",
            self.api_base, self.project, self.location, model
        )
    }

    async fn access_token(&self) -> Result<SecretString> {
        if let TokenSource::Static(token) = &self.tokens {
            return Ok(token.clone());
        }

        let mut cached = self.cached.lock().await;
        if let Some(entry) = cached.as_ref() {
            if entry.expires_at > Utc::now() {
                return Ok(entry.token.clone());
            }
        }

        let fetched = match &self.tokens {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::Credentials(GoogleCredentials::ServiceAccount(key)) => {
                debug!("Exchanging service account assertion for {}", key.client_email);
                let assertion = key.assertion(Utc::now())?;
                self.exchange(
                    key.token_uri(),
                    &[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())],
                )
                .await?
            }
            TokenSource::Credentials(GoogleCredentials::AuthorizedUser(user)) => {
                debug!("Refreshing user credentials");
                self.exchange(
                    user.token_uri.as_deref().unwrap_or(GOOGLE_TOKEN_URL),
                    &[
                        ("grant_type", "refresh_token"),
                        ("client_id", user.client_id.as_str()),
                        ("client_secret", user.client_secret.expose_secret()),
                        ("refresh_token", user.refresh_token.expose_secret()),
                    ],
                )
                .await?
            }
            TokenSource::Metadata(url) => {
                debug!("Fetching Vertex access token from metadata server");
                let response = self
                    .client
                    .get(url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await
                    .map_err(|e| {
                        ProviderError::auth(format!("Metadata server unreachable: {}", e))
                    })?;
                read_json(response).await?
            }
        };

        let lifetime = fetched.expires_in.unwrap_or(3600) - TOKEN_REFRESH_MARGIN_SECS;
        let token = SecretString::new(fetched.access_token);
        *cached = Some(CachedToken {
            token: token.clone(),
            expires_at: Utc::now() + Duration::seconds(lifetime.max(0)),
        });
        Ok(token)
    }

    /// POST a token grant to an OAuth endpoint.
    async fn exchange(&self, url: &str, form: &[(&str, &str)]) -> Result<FetchedToken> {
        let response = self.client.post(url).form(form).send().await?;
        read_json(response)
            .await
            .map_err(|e| ProviderError::auth(format!("Token exchange failed: {}", e.message())))
    }
}

#[async_trait]
impl MessagesApi for VertexMessagesClient {
    async fn create_message(&self, request: &MessagesRequest) -> Result<MessagesResponse> {
        let model = request
            .model
            .clone()
            .ok_or_else(|| ProviderError::invalid_request("model is required"))?;

        let mut body = request.clone();
        body.model = None;
        body.anthropic_version = Some(VERTEX_ANTHROPIC_VERSION.to_string());

        let token = self.access_token().await?;
        let response = self
            .client
            .post(self.endpoint(&model))
            .bearer_auth(token.expose_secret())
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        read_json(response).await
    }
}

/// Vertex AI provider for Claude models.
pub struct VertexProvider {
    client: ClientState<Arc<dyn MessagesApi>>,
    models: ModelSelection,
}

impl VertexProvider {
    /// Create a provider from the process environment.
    pub fn from_env() -> Self {
        Self::from_init(ProviderInit::default())
    }

    /// Create a provider from construction inputs.
    ///
    /// Without a project the provider is constructed but unavailable.
    pub fn from_init(init: ProviderInit) -> Self {
        let project = init
            .project
            .clone()
            .or_else(|| init.env.get(vars::GOOGLE_CLOUD_PROJECT));
        let location = init
            .location
            .clone()
            .or_else(|| init.env.get(vars::GOOGLE_CLOUD_LOCATION))
            .unwrap_or_else(|| DEFAULT_LOCATION.to_string());

        let client = TokenSource::resolve(init.api_key, &init.env).and_then(|tokens| {
            let project = project.ok_or_else(|| {
                ProviderError::config(format!("{} not set", vars::GOOGLE_CLOUD_PROJECT))
            })?;
            VertexMessagesClient::new(project, location, tokens, init.timeout_secs)
        });

        let client = client.map(|c| {
                let c = match init.base_url {
                    Some(url) => c.with_base_url(url),
                    None => c,
                };
                Arc::new(c) as Arc<dyn MessagesApi>
            });

        Self {
            client: ClientState::from_result("Vertex AI", client),
            models: ModelSelection::new("vertex", DEFAULT_MODEL, SUPPORTED_MODELS, init.model),
        }
    }

    /// Create a provider around an existing client.
    pub fn with_client(client: Arc<dyn MessagesApi>, model: Option<String>) -> Self {
        Self {
            client: ClientState::Ready(client),
            models: ModelSelection::new("vertex", DEFAULT_MODEL, SUPPORTED_MODELS, model),
        }
    }

    /// Create a provider whose client is unavailable.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            client: ClientState::Unavailable(reason.into()),
            models: ModelSelection::new("vertex", DEFAULT_MODEL, SUPPORTED_MODELS, None),
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

        debug!("Sending request to Vertex: model={}", self.model());
        let response = client.create_message(&request).await?;

        Ok(ProviderResponse::text(first_text(&response))
            .with_actions(tool_actions(&response))
            .with_model_metadata(self.model()))
    }
}

#[async_trait]
impl Provider for VertexProvider {
    fn name(&self) -> &str {
        "vertex"
    }

    fn display_name(&self) -> &str {
        "Vertex AI"
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
