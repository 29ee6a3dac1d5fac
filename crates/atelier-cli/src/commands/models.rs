//! Model listing command.

use atelier_core::Environment;
use atelier_providers::ProviderRegistry;
use console::style;

/// Supported models of a provider, with the default flagged.
pub fn list(registry: &ProviderRegistry, provider: &str) -> anyhow::Result<Vec<(String, bool)>> {
    let provider = registry.create(provider, None, None)?;
    let default = provider.default_model();
    Ok(provider
        .supported_models()
        .iter()
        .map(|m| (m.to_string(), *m == default))
        .collect())
}

/// Run the models command.
pub fn run(provider: &str) -> anyhow::Result<()> {
    // Credentials do not matter for listing models.
    let registry = ProviderRegistry::with_environment(Environment::empty());

    for (model, is_default) in list(&registry, provider)? {
        if is_default {
            println!("{} {}", model, style("(default)").dim());
        } else {
            println!("{}", model);
        }
    }
    Ok(())
}
