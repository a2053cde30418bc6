//! Shared helper functions for CLI commands
//!
//! Database resolution, output format selection and a few formatting
//! utilities used across the command modules.

use std::path::PathBuf;

use clap::ValueEnum;
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm};
use miette::{IntoDiagnostic, Result};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{Config, Database, Project};

/// Resolve the database path: `--db`/`ROSTER_DB`, then config, then project default
pub fn database_path(global: &GlobalOpts) -> Result<PathBuf> {
    if let Some(ref path) = global.db {
        return Ok(path.clone());
    }

    let project = Project::discover();
    let config = Config::load_for(project.as_ref().ok());
    match (config.database_path(project.as_ref().ok()), project) {
        (Some(path), _) => Ok(path),
        (None, Err(e)) => Err(miette::miette!("{}", e)),
        (None, Ok(project)) => Ok(project.database_path()),
    }
}

/// Open (and migrate) the database the command operates on
pub fn open_database(global: &GlobalOpts) -> Result<Database> {
    let path = database_path(global)?;
    tracing::debug!(path = %path.display(), "opening database");
    Ok(Database::open(&path)?)
}

/// Output format after applying the configured default to `auto`
pub fn output_format(global: &GlobalOpts) -> OutputFormat {
    if global.format != OutputFormat::Auto {
        return global.format;
    }
    Config::load()
        .default_format
        .and_then(|f| OutputFormat::from_str(&f, true).ok())
        .unwrap_or(OutputFormat::Auto)
}

/// Ask before a destructive action; `yes` skips the prompt
pub fn confirm(prompt: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()
        .into_diagnostic()
}

/// Print a success line unless `--quiet`
pub fn success(global: &GlobalOpts, message: impl std::fmt::Display) {
    if !global.quiet {
        println!("{} {}", style("✓").green(), message);
    }
}

/// Print a warning line to stderr
pub fn warning(message: impl std::fmt::Display) {
    eprintln!("{} {}", style("!").yellow(), message);
}

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Escape a string for CSV output
///
/// Handles commas, quotes, and newlines according to RFC 4180.
pub fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Render an optional id for tables
pub fn opt_id(id: Option<i64>) -> String {
    id.map(|i| i.to_string()).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("hi", 2), "hi");
        assert_eq!(truncate_str("台北市中正區", 5), "台北...");
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("simple"), "simple");
        assert_eq!(escape_csv("with,comma"), "\"with,comma\"");
        assert_eq!(escape_csv("with\"quote"), "\"with\"\"quote\"");
        assert_eq!(escape_csv("with\nnewline"), "\"with\nnewline\"");
    }

    #[test]
    fn test_opt_id() {
        assert_eq!(opt_id(Some(3)), "3");
        assert_eq!(opt_id(None), "-");
    }
}
