//! Config file persistence and validation.

use atelier_core::config::{Config, ConfigBuilder, LogLevel, ProviderSettings};
use atelier_core::error::ConfigError;
use atelier_core::{Environment, SecretString};
use tempfile::TempDir;

#[test]
fn test_save_then_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("atelier.json5");

    let config = ConfigBuilder::new()
        .default_provider("bedrock")
        .provider(
            "bedrock",
            ProviderSettings {
                region: Some("eu-west-1".to_string()),
                model: Some("anthropic.claude-3-haiku-20240307-v1:0".to_string()),
                ..Default::default()
            },
        )
        .provider(
            "openai",
            ProviderSettings {
                api_key: Some(SecretString::new("sk-saved-key")),
                ..Default::default()
            },
        )
        .generation(256, 0.2)
        .log_level(LogLevel::Debug)
        .build();
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.default_provider(), "bedrock");
    assert_eq!(loaded.provider_settings("bedrock"), config.provider_settings("bedrock"));
    assert_eq!(
        loaded.provider_settings("OpenAI").api_key.unwrap().expose_secret(),
        "sk-saved-key"
    );
    assert_eq!(loaded.generation.max_tokens, 256);
    assert_eq!(loaded.logging.level, LogLevel::Debug);
    assert!(!path.with_extension("tmp").exists());
}

#[test]
fn test_hand_written_json5() {
    let config = Config::parse(
        r#"{
            // edited by hand
            providers: {
                default: 'vertex',
                settings: {
                    vertex: { project: 'shop-ai', location: 'europe-west1' },
                },
            },
            generation: { temperature: 0.0 },
        }"#,
    )
    .unwrap();

    assert_eq!(config.default_provider(), "vertex");
    let vertex = config.provider_settings("vertex");
    assert_eq!(vertex.project.as_deref(), Some("shop-ai"));
    assert_eq!(vertex.location.as_deref(), Some("europe-west1"));
    assert_eq!(config.generation.max_tokens, 1000);
    assert_eq!(config.generation.temperature, 0.0);
    assert!(config.validate().is_ok());
}

#[test]
fn test_missing_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let err = Config::load(&dir.path().join("absent.json5")).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound(_)));
}

#[test]
fn test_validation_collects_every_problem() {
    let config = Config::parse(
        r#"{
            providers: {
                default: 'llama',
                settings: { openai: { base_url: 'localhost:8080', timeout_secs: 0 } },
            },
            generation: { max_tokens: 0, temperature: 3.5 },
        }"#,
    )
    .unwrap();

    let message = config.validate().unwrap_err().to_string();
    assert!(message.contains("'llama'"));
    assert!(message.contains("max_tokens"));
    assert!(message.contains("temperature"));
    assert!(message.contains("timeout_secs"));
    assert!(message.contains("base_url"));
}

#[test]
fn test_default_provider_from_credentials() {
    let cases = [
        (vec![("OPENAI_API_KEY", "sk"), ("AWS_ACCESS_KEY_ID", "AKID")], Some("openai")),
        (vec![("AWS_ACCESS_KEY_ID", "AKID")], Some("bedrock")),
        (vec![("GOOGLE_CLOUD_PROJECT", "shop-ai")], Some("vertex")),
        (vec![], None),
    ];

    for (pairs, expected) in cases {
        let config = Config::from_environment(&Environment::from_pairs(pairs));
        assert_eq!(config.providers.default.as_deref(), expected);
    }
}
