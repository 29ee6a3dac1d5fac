//! Configuration management commands.

use atelier_core::config::Config;
use atelier_core::paths;
use clap::Args;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Config command arguments.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(clap::Subcommand)]
pub enum ConfigCommand {
    /// Show configuration (API keys masked)
    Show,

    /// Get a configuration value
    Get {
        /// Configuration key (dot-separated path)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,

        /// Value to set
        value: String,
    },

    /// Initialize configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Show configuration file path
    Path,

    /// Validate configuration
    Validate,
}

/// Run the config command against `path`, or the default config file.
pub fn run(args: ConfigArgs, path: Option<&Path>) -> anyhow::Result<()> {
    let path = resolve_path(path)?;

    match args.command {
        ConfigCommand::Show => {
            let config = load_or_env_defaults(&path)?;
            println!("{}", serde_json::to_string_pretty(&redacted(&config)?)?);
        }

        ConfigCommand::Get { key } => {
            let config = load_or_env_defaults(&path)?;
            let json = redacted(&config)?;

            match get_path(&json, &key) {
                Some(v) => println!("{}", serde_json::to_string_pretty(v)?),
                None => anyhow::bail!("Key not found: {}", key),
            }
        }

        ConfigCommand::Set { key, value } => {
            let config = load_or_env_defaults(&path)?;
            let updated = set_path(&config, &key, &value)?;
            updated.save(&path)?;

            println!("Set {} = {}", key, value);
        }

        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists: {:?}. Use --force to overwrite.",
                    path
                );
            }

            // Picks a default provider from whichever credentials are present
            let config = Config::from_env_defaults();
            config.save(&path)?;

            println!("Created config file: {:?}", path);
        }

        ConfigCommand::Path => {
            println!("{}", path.display());
        }

        ConfigCommand::Validate => match Config::load(&path) {
            Ok(config) => match config.validate() {
                Ok(_) => println!("Configuration is valid"),
                Err(e) => anyhow::bail!("Configuration error: {}", e),
            },
            Err(e) => anyhow::bail!("Failed to load config: {}", e),
        },
    }

    Ok(())
}

fn resolve_path(path: Option<&Path>) -> anyhow::Result<PathBuf> {
    match path {
        Some(p) => Ok(p.to_path_buf()),
        None => Ok(paths::config_file()?),
    }
}

fn load_or_env_defaults(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        Ok(Config::load(path)?)
    } else {
        Ok(Config::from_env_defaults())
    }
}

/// The config as JSON with every API key masked.
pub fn redacted(config: &Config) -> anyhow::Result<Value> {
    let mut json = serde_json::to_value(config)?;
    for (name, settings) in &config.providers.settings {
        if let Some(key) = &settings.api_key {
            json["providers"]["settings"][name]["api_key"] = Value::String(key.masked());
        }
    }
    Ok(json)
}

/// Walk a dot-separated key path.
pub fn get_path<'a>(json: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.').try_fold(json, |acc, k| acc.get(k))
}

/// Set a dot-separated key and re-check the result against the schema.
///
/// The value is parsed as JSON first (numbers, booleans), falling back to a
/// plain string.
pub fn set_path(config: &Config, key: &str, value: &str) -> anyhow::Result<Config> {
    let mut json = serde_json::to_value(config)?;

    let parts: Vec<&str> = key.split('.').collect();
    let mut current = &mut json;
    for (i, part) in parts.iter().enumerate() {
        if i == parts.len() - 1 {
            let parsed: Value = serde_json::from_str(value)
                .unwrap_or_else(|_| Value::String(value.to_string()));
            current[part] = parsed;
        } else {
            if !current.get(part).map_or(false, |v| v.is_object()) {
                current[part] = serde_json::json!({});
            }
            current = &mut current[part];
        }
    }

    serde_json::from_value(json)
        .map_err(|e| anyhow::anyhow!("Invalid configuration after set: {}", e))
}
