//! Provider listing command.

use crate::render::ready_marker;
use atelier_core::Config;
use atelier_providers::ProviderRegistry;
use console::style;

/// One row of the provider listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRow {
    pub name: String,
    pub ready: bool,
    pub model: String,
    pub is_default: bool,
}

/// Build a fresh instance of every registered provider and report on it.
pub fn collect(registry: &ProviderRegistry, config: &Config) -> anyhow::Result<Vec<ProviderRow>> {
    let default = config.default_provider().to_lowercase();
    registry
        .list_providers()
        .into_iter()
        .map(|name| -> anyhow::Result<ProviderRow> {
            let provider = registry.create_with(&name, &config.provider_settings(&name))?;
            Ok(ProviderRow {
                ready: provider.is_ready(),
                model: provider.model().to_string(),
                is_default: name == default,
                name,
            })
        })
        .collect()
}

/// Run the providers command.
pub fn run(config: &Config) -> anyhow::Result<()> {
    let registry = ProviderRegistry::new();

    for row in collect(&registry, config)? {
        let default_tag = if row.is_default {
            style(" (default)").dim().to_string()
        } else {
            String::new()
        };
        println!(
            "{} {:<10} {}{}",
            ready_marker(row.ready),
            row.name,
            style(&row.model).dim(),
            default_tag
        );
    }

    Ok(())
}
