//! Multi-provider comparison command.

use super::{generate_options, load_image};
use crate::render;
use atelier_core::Config;
use atelier_providers::{fan_out, fan_out_with_image, Provider, ProviderRegistry};
use clap::Args;
use std::path::PathBuf;

/// Compare command arguments.
#[derive(Args)]
pub struct CompareArgs {
    /// Providers to ask, comma separated (defaults to every registered provider)
    #[arg(long, value_delimiter = ',')]
    pub providers: Vec<String>,

    /// Maximum tokens to generate
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Sampling temperature
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Image file to attach
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Skip providers whose client is not ready
    #[arg(long)]
    pub ready_only: bool,

    /// Prompt text
    pub prompt: String,
}

/// Instantiate the requested providers, in the order given.
pub fn build_providers(
    registry: &ProviderRegistry,
    config: &Config,
    names: &[String],
    ready_only: bool,
) -> anyhow::Result<Vec<Box<dyn Provider>>> {
    let names = if names.is_empty() {
        registry.list_providers()
    } else {
        names.to_vec()
    };

    let mut providers = Vec::with_capacity(names.len());
    for name in &names {
        let provider = registry.create_with(name, &config.provider_settings(name))?;
        if ready_only && !provider.is_ready() {
            continue;
        }
        providers.push(provider);
    }

    if providers.is_empty() {
        anyhow::bail!("No providers to compare");
    }
    Ok(providers)
}

/// Run the compare command.
pub async fn run(args: CompareArgs, config: &Config) -> anyhow::Result<()> {
    let registry = ProviderRegistry::new();
    let providers = build_providers(&registry, config, &args.providers, args.ready_only)?;
    let options = generate_options(config, args.max_tokens, args.temperature);
    let image = load_image(args.image.as_deref())?;

    let results = match &image {
        Some(image) => fan_out_with_image(&providers, &args.prompt, image, &options).await,
        None => fan_out(&providers, &args.prompt, &options).await,
    };

    for (name, response) in &results {
        render::render_heading(name);
        render::render_response(response);
    }

    Ok(())
}
