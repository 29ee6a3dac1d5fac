//! Anthropic adapter against a mock Messages API.

use atelier_integration_tests::{mock_settings, registry_with, swatch};
use atelier_providers::{GenerateOptions, ProviderError, ProviderResponse};
use serde_json::json;
use std::collections::HashMap;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_text_generation_maps_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "model": "claude-3-5-sonnet-20241022",
            "max_tokens": 1000,
            "messages": [{"role": "user", "content": "hello"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "model": "claude-3-5-sonnet-20241022",
            "content": [{"type": "text", "text": "hi there"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 5, "output_tokens": 2}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let registry = registry_with(&[]);
    let provider = registry
        .create_with("anthropic", &mock_settings(server.uri(), Some("test-key")))
        .unwrap();
    let response = provider.generate("hello", &GenerateOptions::default()).await;

    let expected = ProviderResponse::text("hi there").with_usage(HashMap::from([
        ("input_tokens".to_string(), 5),
        ("output_tokens".to_string(), 2),
    ]));
    assert_eq!(response, expected);
}

#[tokio::test]
async fn test_rate_limit_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "30")
                .set_body_json(json!({
                    "type": "error",
                    "error": {"type": "rate_limit_error", "message": "rate limited"}
                })),
        )
        .mount(&server)
        .await;

    let registry = registry_with(&[]);
    let provider = registry
        .create_with("anthropic", &mock_settings(server.uri(), Some("test-key")))
        .unwrap();

    let folded = provider.generate("hello", &GenerateOptions::default()).await;
    assert_eq!(folded.content, "Error: rate limited");
    assert!(folded.usage.is_none());

    let err = provider
        .try_generate("hello", &GenerateOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::RateLimit { retry_after: Some(30), .. }));
}

#[tokio::test]
async fn test_bad_key_is_an_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "type": "error",
            "error": {"type": "authentication_error", "message": "invalid x-api-key"}
        })))
        .mount(&server)
        .await;

    let provider = registry_with(&[])
        .create_with("anthropic", &mock_settings(server.uri(), Some("wrong")))
        .unwrap();
    let err = provider
        .try_generate("hello", &GenerateOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Authentication(m) if m == "invalid x-api-key"));
}

#[tokio::test]
async fn test_image_block_precedes_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_partial_json(json!({
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "image", "source": {"type": "base64", "media_type": "image/png"}},
                    {"type": "text", "text": "what colour is this?"}
                ]
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "red"}],
            "usage": {"input_tokens": 40, "output_tokens": 1}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = registry_with(&[])
        .create_with("anthropic", &mock_settings(server.uri(), Some("test-key")))
        .unwrap();
    let response = provider
        .generate_with_image("what colour is this?", &swatch(), &GenerateOptions::default())
        .await;
    assert_eq!(response.content, "red");
    assert_eq!(response.usage_of("input_tokens"), Some(40));
}

#[tokio::test]
async fn test_env_key_is_picked_up() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-api-key", "sk-ant-env"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "ok"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let registry = registry_with(&[("ANTHROPIC_API_KEY", "sk-ant-env")]);
    let provider = registry
        .create_with("anthropic", &mock_settings(server.uri(), None))
        .unwrap();
    let response = provider.generate("ping", &GenerateOptions::default()).await;
    assert_eq!(response.content, "ok");
    assert!(response.usage.is_none());
}
