//! Atelier command-line interface.

pub mod commands;
pub mod render;

use atelier_core::config::{Config, LogLevel};
use atelier_core::error::ConfigError;
use atelier_core::env::{self, vars};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Atelier - one prompt, many model vendors
#[derive(Parser)]
#[command(name = "atelier")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to config file
    #[arg(short, long, env = "ATELIER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// List registered providers and whether they are ready
    Providers,

    /// List the models a provider accepts
    Models {
        /// Provider name
        provider: String,
    },

    /// Generate text with one provider
    Generate(commands::generate::GenerateArgs),

    /// Send one prompt to several providers and compare the answers
    Compare(commands::compare::CompareArgs),

    /// Configuration management
    Config(commands::config::ConfigArgs),

    /// Show version information
    Version,
}

/// Run the CLI with the given arguments and loaded config.
pub async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    match cli.command {
        Commands::Providers => commands::providers::run(&config),
        Commands::Models { provider } => commands::models::run(&provider),
        Commands::Generate(args) => commands::generate::run(args, &config).await,
        Commands::Compare(args) => commands::compare::run(args, &config).await,
        Commands::Config(args) => commands::config::run(args, cli.config.as_deref()),
        Commands::Version => {
            println!("atelier {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Load the config file, or defaults when there is none.
///
/// A missing file is not an error; an unreadable one is.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => match Config::load(path) {
            Ok(config) => Ok(config),
            Err(ConfigError::NotFound(_)) => Ok(Config::from_env_defaults()),
            Err(e) => Err(e.into()),
        },
        None => Ok(Config::load_or_default()),
    }
}

/// Filter directive for the log subscriber.
///
/// `ATELIER_LOG` wins, then `-v` flags, then the configured level.
pub fn log_filter(verbose: u8, env_filter: Option<String>, level: LogLevel) -> String {
    if let Some(filter) = env_filter {
        return filter;
    }
    match verbose {
        0 => format!("atelier={}", level.as_str()),
        1 => "atelier=debug".to_string(),
        _ => "atelier=trace".to_string(),
    }
}

/// Load a dotenv file, returning a warning to show when it cannot be read.
///
/// Runs before logging is installed, so the caller prints the warning.
pub fn load_env_file(path: &Path) -> Option<String> {
    env::load_dotenv_from(path)
        .err()
        .map(|e| format!("Ignoring unreadable {}: {}", path.display(), e))
}

/// Install the global tracing subscriber. Logs go to stderr.
pub fn init_logging(verbose: u8, config: &Config) {
    let directive = log_filter(
        verbose,
        env::get_var(vars::ATELIER_LOG),
        config.logging.level,
    );
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("atelier=info"));

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
