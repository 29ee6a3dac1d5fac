//! Bedrock adapter against a mock runtime endpoint.

use atelier_integration_tests::{mock_settings, registry_with, swatch};
use atelier_providers::{GenerateOptions, UNSUPPORTED_IMAGE_INPUT};
use serde_json::json;
use std::fs;
use tempfile::TempDir;
use wiremock::matchers::{
    body_partial_json, header, header_exists, header_regex, method, path_regex,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

const AWS_ENV: &[(&str, &str)] = &[
    ("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE"),
    ("AWS_SECRET_ACCESS_KEY", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY"),
    ("AWS_SESSION_TOKEN", "session-token"),
    ("AWS_REGION", "us-west-2"),
];

#[tokio::test]
async fn test_claude3_request_is_signed_with_static_keys() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/model/anthropic\.claude-3-haiku-20240307-v1.+0/invoke$"))
        .and(header_regex(
            "authorization",
            r"^AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/\d{8}/us-west-2/bedrock/aws4_request",
        ))
        .and(header_exists("x-amz-date"))
        .and(header("x-amz-security-token", "session-token"))
        .and(body_partial_json(json!({
            "anthropic_version": "bedrock-2023-05-31",
            "max_tokens": 1000,
            "messages": [{"role": "user", "content": "hello"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_bdrk_01",
            "content": [{"type": "text", "text": "hi from bedrock"}],
            "usage": {"input_tokens": 3, "output_tokens": 4}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let registry = registry_with(AWS_ENV);
    let mut settings = mock_settings(server.uri(), None);
    settings.model = Some("anthropic.claude-3-haiku-20240307-v1:0".to_string());
    let provider = registry.create_with("bedrock", &settings).unwrap();

    let response = provider.generate("hello", &GenerateOptions::default()).await;
    assert_eq!(response.content, "hi from bedrock");
    assert!(response.usage.is_none());
    assert_eq!(
        response.metadata.unwrap()["model"],
        json!("anthropic.claude-3-haiku-20240307-v1:0")
    );
}

#[tokio::test]
async fn test_legacy_model_uses_completion_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/model/anthropic\.claude-v2/invoke$"))
        .and(header("authorization", "Bearer bedrock-api-key"))
        .and(body_partial_json(json!({
            "prompt": "\n\nHuman: hello\n\nAssistant:",
            "max_tokens_to_sample": 1000
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "completion": " Hello there.",
            "stop_reason": "stop_sequence"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut settings = mock_settings(server.uri(), Some("bedrock-api-key"));
    settings.model = Some("anthropic.claude-v2".to_string());
    let provider = registry_with(&[]).create_with("bedrock", &settings).unwrap();

    let response = provider.generate("hello", &GenerateOptions::default()).await;
    assert_eq!(response.content, " Hello there.");
}

#[tokio::test]
async fn test_image_gate_makes_no_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut settings = mock_settings(server.uri(), Some("bedrock-api-key"));
    settings.model = Some("anthropic.claude-instant-v1".to_string());
    let provider = registry_with(&[]).create_with("bedrock", &settings).unwrap();

    let response = provider
        .generate_with_image("describe", &swatch(), &GenerateOptions::default())
        .await;
    assert_eq!(response.content, UNSUPPORTED_IMAGE_INPUT);
    assert!(response.metadata.is_none());
}

#[tokio::test]
async fn test_vendor_error_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(400)
                .insert_header("x-amzn-errortype", "ValidationException")
                .set_body_json(json!({
                    "message": "Malformed input request, please reformat your input and try again."
                })),
        )
        .mount(&server)
        .await;

    let provider = registry_with(AWS_ENV)
        .create_with("bedrock", &mock_settings(server.uri(), None))
        .unwrap();
    let response = provider.generate("hello", &GenerateOptions::default()).await;
    assert_eq!(
        response.content,
        "Error: Malformed input request, please reformat your input and try again."
    );
}

#[tokio::test]
async fn test_shared_profile_credentials_are_discovered() {
    let dir = TempDir::new().unwrap();
    let credentials = dir.path().join("credentials");
    fs::write(
        &credentials,
        "[default]\naws_access_key_id = AKIDPROFILE\naws_secret_access_key = profile-secret\n",
    )
    .unwrap();
    let config = dir.path().join("config");
    fs::write(&config, "").unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header_regex(
            "authorization",
            r"Credential=AKIDPROFILE/\d{8}/eu-west-1/bedrock/aws4_request",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "signed with the profile"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let credentials = credentials.to_str().unwrap();
    let config = config.to_str().unwrap();
    let registry = registry_with(&[
        ("AWS_SHARED_CREDENTIALS_FILE", credentials),
        ("AWS_CONFIG_FILE", config),
        ("AWS_PROFILE", "default"),
        ("AWS_REGION", "eu-west-1"),
    ]);
    let provider = registry
        .create_with("bedrock", &mock_settings(server.uri(), None))
        .unwrap();
    assert!(provider.is_ready());

    let response = provider.generate("hello", &GenerateOptions::default()).await;
    assert_eq!(response.content, "signed with the profile");
}

#[tokio::test]
async fn test_missing_profile_is_reported_at_call_time() {
    let dir = TempDir::new().unwrap();
    let empty = dir.path().join("empty");
    fs::write(&empty, "").unwrap();
    let empty = empty.to_str().unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let provider = registry_with(&[
        ("AWS_SHARED_CREDENTIALS_FILE", empty),
        ("AWS_CONFIG_FILE", empty),
        ("AWS_PROFILE", "nowhere"),
    ])
    .create_with("bedrock", &mock_settings(server.uri(), None))
    .unwrap();
    assert!(provider.is_ready());

    let response = provider.generate("hello", &GenerateOptions::default()).await;
    assert!(response.content.starts_with("Error: "), "{}", response.content);
}
