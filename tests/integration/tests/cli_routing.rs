//! Command-line parsing and dispatch.

use atelier_cli::commands::config::{ConfigArgs, ConfigCommand};
use atelier_cli::{run, Cli, Commands};
use atelier_core::Config;
use clap::error::ErrorKind;
use clap::Parser;
use tempfile::TempDir;

#[test]
fn test_help_lists_commands() {
    let err = Cli::try_parse_from(["atelier", "--help"]).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::DisplayHelp);

    let help = err.to_string();
    for command in ["providers", "models", "generate", "compare", "config", "version"] {
        assert!(help.contains(command), "help is missing {}", command);
    }
}

#[test]
fn test_generate_flags() {
    let cli = Cli::try_parse_from([
        "atelier",
        "-vv",
        "generate",
        "-p",
        "openai",
        "-m",
        "gpt-4o-mini",
        "--max-tokens",
        "64",
        "--json",
        "Name three teapots",
    ])
    .unwrap();

    assert_eq!(cli.verbose, 2);
    let Commands::Generate(args) = cli.command else {
        panic!("expected generate");
    };
    assert_eq!(args.provider.as_deref(), Some("openai"));
    assert_eq!(args.model.as_deref(), Some("gpt-4o-mini"));
    assert_eq!(args.max_tokens, Some(64));
    assert!(args.json);
    assert_eq!(args.prompt, "Name three teapots");
}

#[test]
fn test_compare_provider_list() {
    let cli = Cli::try_parse_from([
        "atelier",
        "compare",
        "--providers",
        "anthropic,bedrock",
        "--ready-only",
        "hi",
    ])
    .unwrap();

    let Commands::Compare(args) = cli.command else {
        panic!("expected compare");
    };
    assert_eq!(args.providers, vec!["anthropic", "bedrock"]);
    assert!(args.ready_only);
}

#[test]
fn test_generate_requires_prompt() {
    let err = Cli::try_parse_from(["atelier", "generate"]).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
}

#[tokio::test]
async fn test_run_version_and_models() {
    let cli = Cli::try_parse_from(["atelier", "version"]).unwrap();
    run(cli, Config::default()).await.unwrap();

    let cli = Cli::try_parse_from(["atelier", "models", "Vertex"]).unwrap();
    run(cli, Config::default()).await.unwrap();

    let cli = Cli::try_parse_from(["atelier", "models", "llama"]).unwrap();
    let err = run(cli, Config::default()).await.unwrap_err();
    assert!(err.to_string().contains("llama"));
}

#[tokio::test]
async fn test_config_set_writes_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("atelier.json5");

    let cli = Cli::try_parse_from([
        "atelier",
        "--config",
        path.to_str().unwrap(),
        "config",
        "set",
        "generation.max_tokens",
        "512",
    ])
    .unwrap();
    assert!(matches!(
        &cli.command,
        Commands::Config(ConfigArgs { command: ConfigCommand::Set { .. } })
    ));
    run(cli, Config::default()).await.unwrap();

    let saved = Config::load(&path).unwrap();
    assert_eq!(saved.generation.max_tokens, 512);
}
