//! CLI command implementations.

pub mod compare;
pub mod config;
pub mod generate;
pub mod models;
pub mod providers;

use atelier_core::Config;
use atelier_providers::{GenerateOptions, ImageInput};
use std::path::Path;

/// Generation options from the config, overridden by command-line flags.
pub(crate) fn generate_options(
    config: &Config,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
) -> GenerateOptions {
    GenerateOptions::default()
        .with_max_tokens(max_tokens.unwrap_or(config.generation.max_tokens))
        .with_temperature(temperature.unwrap_or(config.generation.temperature))
}

/// Decode an optional image file.
pub(crate) fn load_image(path: Option<&Path>) -> anyhow::Result<Option<ImageInput>> {
    path.map(|p| ImageInput::from_path(p).map_err(anyhow::Error::from))
        .transpose()
}
