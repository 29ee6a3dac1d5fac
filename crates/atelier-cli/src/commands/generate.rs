//! Single-provider generation command.

use super::{generate_options, load_image};
use crate::render;
use atelier_core::Config;
use atelier_providers::{Provider, ProviderRegistry};
use clap::Args;
use std::path::PathBuf;
use tracing::info;

/// Generate command arguments.
#[derive(Args)]
pub struct GenerateArgs {
    /// Provider to use (defaults to the configured provider)
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Model to use (defaults to the provider's configured or default model)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Maximum tokens to generate
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Sampling temperature
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Image file to attach
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Print the full response as JSON
    #[arg(long)]
    pub json: bool,

    /// Prompt text
    pub prompt: String,
}

/// Build the provider a generate call should use.
pub fn build_provider(
    registry: &ProviderRegistry,
    config: &Config,
    provider: Option<&str>,
    model: Option<&str>,
) -> anyhow::Result<Box<dyn Provider>> {
    let name = provider.unwrap_or_else(|| config.default_provider());
    let mut provider = registry.create_with(name, &config.provider_settings(name))?;

    // An explicit model goes through validation; a configured one does not.
    if let Some(model) = model {
        provider.set_model(model)?;
    }
    Ok(provider)
}

/// Run the generate command.
pub async fn run(args: GenerateArgs, config: &Config) -> anyhow::Result<()> {
    let registry = ProviderRegistry::new();
    let provider = build_provider(
        &registry,
        config,
        args.provider.as_deref(),
        args.model.as_deref(),
    )?;
    let options = generate_options(config, args.max_tokens, args.temperature);
    let image = load_image(args.image.as_deref())?;

    info!(provider = provider.name(), model = provider.model(), "Generating");
    let response = match &image {
        Some(image) => provider.generate_with_image(&args.prompt, image, &options).await,
        None => provider.generate(&args.prompt, &options).await,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        render::render_response(&response);
    }

    Ok(())
}
