//! Display utilities for CLI output formatting
//!
//! Provides formatted output for the method catalog, call results and the
//! token state

use chrono::{DateTime, Utc};
use colored::Colorize;

use rustore_client::TokenState;
use rustore_common::{CallResult, MethodDescriptor, ParamSpec};

/// Display methods grouped by their catalog group
pub fn method_list(methods: &[MethodDescriptor]) {
    if methods.is_empty() {
        println!("{}", "No methods found".dimmed());
        return;
    }

    let mut current_group = None;
    for method in methods {
        if current_group != Some(&method.group_key) {
            current_group = Some(&method.group_key);
            println!("\n{}", method.group_title.bright_cyan().bold());
        }
        println!(
            "  {:<40} {:<7} {}",
            method.id().bright_white(),
            method.http_method.yellow(),
            method.title
        );
    }
}

/// Display a method's paths and parameters
pub fn method_details(method: &MethodDescriptor) {
    println!(
        "{} {} {}",
        method.http_method.yellow(),
        method.id().bright_white().bold(),
        method.title.dimmed()
    );

    for (environment, path) in &method.paths {
        println!("  {:<8} {path}", environment.cyan());
    }

    let sections = [
        ("path", &method.params.path),
        ("query", &method.params.query),
        ("body", &method.params.body),
    ];
    for (section, params) in sections {
        if params.is_empty() {
            continue;
        }
        println!("{}", format!("{section} parameters:").bright_blue());
        for (name, spec) in params {
            println!("  {}", param_line(name, spec));
        }
    }
    println!();
}

fn param_line(name: &str, spec: &ParamSpec) -> String {
    let marker = if spec.required { "*".bright_red() } else { " ".normal() };
    let hint = spec
        .hint
        .as_deref()
        .map(|hint| format!("  e.g. {hint}"))
        .unwrap_or_default();
    format!("{marker}{name:<28} {:<12}{}", spec.param_type.to_string(), hint.dimmed())
}

/// Display the outcome of an API call
pub fn call_result(method: &MethodDescriptor, url: &str, result: &CallResult) {
    let status = result.status_code.to_string();
    let status = match result.status_code {
        200..=299 => status.bright_green(),
        400..=499 => status.yellow(),
        _ => status.bright_red(),
    };

    println!("{} {} {url}", status.bold(), method.http_method.dimmed());
    let body = result.pretty_body();
    if !body.is_empty() {
        println!("{body}");
    }
}

/// Display the token cache state
pub fn token_state(state: TokenState, expires_at: Option<DateTime<Utc>>) {
    let label = match state {
        TokenState::Valid => "valid".bright_green(),
        TokenState::Expired => "expired".yellow(),
        TokenState::NoToken => "none".bright_red(),
    };
    match expires_at {
        Some(at) => {
            let remaining = at - Utc::now();
            println!(
                "{} token {label}, expires {} (in {}s)",
                "○".bright_blue(),
                at.to_rfc3339(),
                remaining.num_seconds()
            );
        }
        None => println!("{} token {label}", "○".bright_blue()),
    }
}
