//! Atelier CLI entry point.

use atelier_cli::{init_logging, load_config, load_env_file, run, Cli};
use clap::Parser;
use console::style;
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A .env file may carry provider credentials and ATELIER_CONFIG
    if let Some(warning) = load_env_file(Path::new(".env")) {
        eprintln!("{} {}", style("warning:").yellow().bold(), warning);
    }

    // Parse CLI arguments
    let cli = Cli::parse();

    // The config file can set the log level, so it is read first.
    let config = load_config(cli.config.as_deref())?;
    init_logging(cli.verbose, &config);

    // Run the command
    run(cli, config).await
}
