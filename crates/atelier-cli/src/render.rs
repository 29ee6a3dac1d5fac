//! Terminal rendering utilities.
//!
//! Generated text goes to stdout; usage, metadata and status lines go to stderr.

use atelier_providers::{Action, ProviderResponse};
use console::style;
use std::collections::HashMap;

/// Readiness indicator for a provider.
pub fn ready_marker(ready: bool) -> String {
    if ready {
        style("*").green().to_string()
    } else {
        style("x").red().to_string()
    }
}

/// Print a response: content, then any actions, usage and metadata.
pub fn render_response(response: &ProviderResponse) {
    println!("{}", response.content);

    if let Some(actions) = &response.actions {
        for action in actions {
            render_action(action);
        }
    }
    if let Some(usage) = &response.usage {
        render_usage(usage);
    }
    if let Some(model) = response
        .metadata
        .as_ref()
        .and_then(|m| m.get("model"))
        .and_then(|v| v.as_str())
    {
        eprintln!("  {} {}", style("model").dim(), style(model).cyan());
    }
}

/// Render a heading that introduces one provider's answer.
pub fn render_heading(name: &str) {
    println!();
    println!("{}", style(format!("== {} ==", name)).bold().cyan());
}

/// Render token usage in a compact format.
pub fn render_usage(usage: &HashMap<String, u64>) {
    eprintln!("  {} {}", style("tokens").dim(), format_usage(usage));
}

/// Format usage counters as `input: N | output: N[ | total: N]`.
pub fn format_usage(usage: &HashMap<String, u64>) -> String {
    let mut parts = Vec::new();
    for (key, label) in [
        ("input_tokens", "input"),
        ("output_tokens", "output"),
        ("total_tokens", "total"),
    ] {
        if let Some(n) = usage.get(key) {
            parts.push(format!("{}: {}", label, n));
        }
    }
    parts.join(" | ")
}

/// Render a tool call requested by the model.
fn render_action(action: &Action) {
    let args = serde_json::to_string(&action.input).unwrap_or_else(|_| action.input.to_string());
    eprintln!(
        "  {} {} {}",
        style("~").yellow(),
        style(&action.name).bold(),
        style(truncate(&args, 200)).dim()
    );
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}
