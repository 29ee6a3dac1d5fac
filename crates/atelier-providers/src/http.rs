//! Shared HTTP plumbing for the vendor clients.

use crate::error::{ProviderError, Result};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Build a reqwest client with the given timeout.
pub(crate) fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ProviderError::config(format!("Failed to create HTTP client: {}", e)))
}

/// Decode a successful JSON body, or map the failure status to an error.
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok());
    let body = response.text().await.unwrap_or_default();
    Err(error_from_status(status.as_u16(), &body, retry_after))
}

/// Classify an HTTP failure using the vendor's error message.
pub(crate) fn error_from_status(status: u16, body: &str, retry_after: Option<u64>) -> ProviderError {
    let message = error_message(body).unwrap_or_else(|| {
        reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown error")
            .to_string()
    });

    match status {
        401 | 403 => ProviderError::auth(message),
        429 => ProviderError::rate_limit(message, retry_after),
        400 | 404 | 413 | 422 => ProviderError::invalid_request(message),
        _ => ProviderError::server_error(status, message),
    }
}

/// Pull a human-readable message out of a vendor error body.
///
/// Anthropic and OpenAI use `{"error": {"message": ..}}`, Bedrock uses
/// `{"message": ..}` and Google sometimes `{"error": ".."}`.
fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Ok(json) = serde_json::from_str::<Value>(trimmed) else {
        return Some(trimmed.chars().take(500).collect());
    };

    json.pointer("/error/message")
        .or_else(|| json.get("message"))
        .or_else(|| json.get("Message"))
        .or_else(|| json.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
