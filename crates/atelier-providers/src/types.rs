//! Common types for model providers.

use crate::error::{ProviderError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

/// Media type used for every image sent to a vendor.
pub const DEFAULT_IMAGE_MEDIA_TYPE: &str = "image/png";

/// Normalized result of a generation call.
///
/// `content` is always present. It may be empty, or hold a sentinel such as
/// `"Error: ..."` when produced by a compatibility `generate` call. The other
/// fields are independently optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Generated text.
    pub content: String,

    /// Structured actions (tool calls), only when the vendor returned some.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<Action>>,

    /// Vendor-specific auxiliary data, e.g. the model that served the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,

    /// Token accounting (`input_tokens`, `output_tokens`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<HashMap<String, u64>>,
}

impl ProviderResponse {
    /// Create a response holding only text.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Attach usage counters.
    pub fn with_usage(mut self, usage: HashMap<String, u64>) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Attach `{"model": model}` metadata.
    pub fn with_model_metadata(self, model: &str) -> Self {
        let metadata = HashMap::from([("model".to_string(), Value::String(model.to_string()))]);
        self.with_metadata(metadata)
    }

    /// Attach actions. An empty list leaves `actions` absent.
    pub fn with_actions(mut self, actions: Vec<Action>) -> Self {
        self.actions = if actions.is_empty() {
            None
        } else {
            Some(actions)
        };
        self
    }

    /// Look up a usage counter.
    pub fn usage_of(&self, key: &str) -> Option<u64> {
        self.usage.as_ref().and_then(|u| u.get(key).copied())
    }

    /// Check whether the model actually produced any text or actions.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.actions.is_none()
    }
}

/// A structured action requested by the model (a tool call).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Vendor-assigned call id, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Action (tool) name.
    pub name: String,

    /// Arguments as JSON.
    pub input: Value,
}

/// Generation options.
///
/// Only `max_tokens` and `temperature` are sent to vendors. Any other key
/// given through [`GenerateOptions::from_value`] is kept in `extra` and ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Maximum tokens to generate.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Unrecognized options.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            extra: HashMap::new(),
        }
    }
}

impl GenerateOptions {
    /// Build options from a loose JSON object.
    ///
    /// Recognized keys with a usable value override the defaults; everything
    /// else, including a recognized key with the wrong type, is ignored.
    pub fn from_value(value: &Value) -> Self {
        let mut options = Self::default();
        let Some(map) = value.as_object() else {
            return options;
        };

        for (key, value) in map {
            match key.as_str() {
                "max_tokens" => {
                    if let Some(n) = value.as_u64().and_then(|n| u32::try_from(n).ok()) {
                        options.max_tokens = n;
                    }
                }
                "temperature" => {
                    if let Some(t) = value.as_f64() {
                        options.temperature = t as f32;
                    }
                }
                _ => {
                    options.extra.insert(key.clone(), value.clone());
                }
            }
        }
        options
    }

    /// Set max tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// An image attached to a prompt.
#[derive(Debug, Clone)]
pub enum ImageInput {
    /// A decoded bitmap; encoded to PNG before sending.
    Bitmap(DynamicImage),

    /// Base64 data, optionally wrapped in a `data:<type>;base64,` URI.
    Base64(String),
}

impl ImageInput {
    /// Decode an image file into a bitmap.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let img = image::open(path)
            .map_err(|e| ProviderError::image(format!("{}: {}", path.display(), e)))?;
        Ok(Self::Bitmap(img))
    }

    /// Base64 payload ready to embed in a request.
    pub fn to_base64(&self) -> Result<String> {
        match self {
            Self::Base64(data) => Ok(split_data_uri(data).1.to_string()),
            Self::Bitmap(img) => {
                let mut buf = Cursor::new(Vec::new());
                img.write_to(&mut buf, ImageFormat::Png)
                    .map_err(|e| ProviderError::image(format!("PNG encoding failed: {}", e)))?;
                Ok(STANDARD.encode(buf.into_inner()))
            }
        }
    }

    /// Media type of the payload.
    pub fn media_type(&self) -> &str {
        match self {
            Self::Base64(data) => split_data_uri(data).0.unwrap_or(DEFAULT_IMAGE_MEDIA_TYPE),
            Self::Bitmap(_) => DEFAULT_IMAGE_MEDIA_TYPE,
        }
    }

    /// Resolve into `(media_type, base64_data)`.
    pub fn encode(&self) -> Result<EncodedImage> {
        Ok(EncodedImage {
            media_type: self.media_type().to_string(),
            data: self.to_base64()?,
        })
    }
}

impl From<DynamicImage> for ImageInput {
    fn from(img: DynamicImage) -> Self {
        Self::Bitmap(img)
    }
}

impl From<String> for ImageInput {
    fn from(data: String) -> Self {
        Self::Base64(data)
    }
}

impl From<&str> for ImageInput {
    fn from(data: &str) -> Self {
        Self::Base64(data.to_string())
    }
}

/// An image ready for a vendor request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Media type, e.g. `image/png`.
    pub media_type: String,

    /// Base64 data without any URI prefix.
    pub data: String,
}

impl EncodedImage {
    /// Render as a `data:` URI.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

fn split_data_uri(data: &str) -> (Option<&str>, &str) {
    if let Some(rest) = data.strip_prefix("data:") {
        if let Some((media_type, payload)) = rest.split_once(";base64,") {
            return (Some(media_type), payload);
        }
    }
    (None, data)
}
