//! Provider registry behavior across all built-in adapters.

use atelier_core::config::{ConfigBuilder, ProviderSettings};
use atelier_core::SecretString;
use atelier_integration_tests::registry_with;
use atelier_providers::{
    fan_out, GenerateOptions, ImageInput, ModelSelection, Provider, ProviderError, ProviderInit,
    ProviderResponse, Result,
};
use std::sync::Arc;

struct Shouty {
    models: ModelSelection,
}

#[async_trait::async_trait]
impl Provider for Shouty {
    fn name(&self) -> &str {
        "shouty"
    }

    fn display_name(&self) -> &str {
        "Shouty"
    }

    fn models(&self) -> &ModelSelection {
        &self.models
    }

    fn models_mut(&mut self) -> &mut ModelSelection {
        &mut self.models
    }

    fn is_ready(&self) -> bool {
        true
    }

    async fn try_generate(&self, prompt: &str, _options: &GenerateOptions) -> Result<ProviderResponse> {
        Ok(ProviderResponse::text(prompt.to_uppercase()))
    }

    async fn try_generate_with_image(
        &self,
        _prompt: &str,
        _image: &ImageInput,
        _options: &GenerateOptions,
    ) -> Result<ProviderResponse> {
        Err(ProviderError::UnsupportedInput("shouty-1".to_string()))
    }
}

#[test]
fn test_builtin_keys() {
    let registry = registry_with(&[]);
    assert_eq!(
        registry.list_providers(),
        vec!["anthropic", "bedrock", "openai", "vertex"]
    );
}

#[test]
fn test_case_insensitive_create() {
    let registry = registry_with(&[]);
    for name in ["ANTHROPIC", "OpenAI", "Bedrock", "vErTeX"] {
        let provider = registry.create(name, None, None).unwrap();
        assert_eq!(provider.name(), name.to_lowercase());
    }
}

#[test]
fn test_unknown_provider_type() {
    let err = registry_with(&[]).create("llama", None, None).err().unwrap();
    assert_eq!(err.to_string(), "Unknown provider: llama");
}

#[test]
fn test_default_models() {
    let registry = registry_with(&[]);
    let expected = [
        ("anthropic", "claude-3-5-sonnet-20241022"),
        ("openai", "gpt-4o"),
        ("bedrock", "anthropic.claude-3-5-sonnet-20241022-v2:0"),
        ("vertex", "claude-3-5-sonnet-v2@20241022"),
    ];
    for (name, model) in expected {
        let provider = registry.create(name, None, None).unwrap();
        assert_eq!(provider.model(), model);
        assert_eq!(provider.default_model(), model);
        assert!(provider.validate_model(model));
        assert!(!provider.validate_model(""));
    }
}

#[test]
fn test_set_model_validation_per_adapter() {
    let registry = registry_with(&[]);

    let mut anthropic = registry.create("anthropic", None, None).unwrap();
    assert!(anthropic.set_model("gpt-4o").is_err());
    assert_eq!(anthropic.model(), "claude-3-5-sonnet-20241022");

    let mut openai = registry.create("openai", None, None).unwrap();
    openai.set_model("gpt-3.5-turbo").unwrap();
    assert_eq!(openai.model(), "gpt-3.5-turbo");

    let mut bedrock = registry.create("bedrock", None, None).unwrap();
    let err = bedrock.set_model("claude-3-opus@20240229").unwrap_err();
    assert!(matches!(err, ProviderError::InvalidModel { provider, .. } if provider == "bedrock"));
}

#[test]
fn test_unvalidated_construction_model() {
    // Only set_model checks the allow-list.
    let provider = registry_with(&[])
        .create("openai", Some("sk"), Some("gpt-5-preview"))
        .unwrap();
    assert_eq!(provider.model(), "gpt-5-preview");
}

#[tokio::test]
async fn test_register_custom_provider() {
    let mut registry = registry_with(&[]);
    registry.register_provider(
        "Shouty",
        Arc::new(|init: ProviderInit| -> Box<dyn Provider> {
            Box::new(Shouty {
                models: ModelSelection::new("shouty", "shouty-1", &["shouty-1"], init.model),
            })
        }),
    );

    assert_eq!(
        registry.list_providers(),
        vec!["anthropic", "bedrock", "openai", "shouty", "vertex"]
    );

    let providers = vec![
        registry.create("shouty", None, None).unwrap(),
        registry.create("openai", None, None).unwrap(),
    ];
    let results = fan_out(&providers, "hello", &GenerateOptions::default()).await;
    assert_eq!(results[0], ("shouty".to_string(), ProviderResponse::text("HELLO")));
    assert_eq!(results[1].0, "openai");
    assert_eq!(results[1].1.content, "OpenAI client not initialized");
}

#[test]
fn test_create_default_uses_config_section() {
    let config = ConfigBuilder::new()
        .default_provider("Anthropic")
        .provider(
            "anthropic",
            ProviderSettings {
                api_key: Some(SecretString::new("sk-ant-config")),
                model: Some("claude-3-haiku-20240307".to_string()),
                ..Default::default()
            },
        )
        .build();

    let provider = registry_with(&[]).create_default(&config).unwrap();
    assert_eq!(provider.name(), "anthropic");
    assert_eq!(provider.model(), "claude-3-haiku-20240307");
    assert!(provider.is_ready());
}
