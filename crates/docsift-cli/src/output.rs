//! Output layer shared by `search` and `context`.
//!
//! Pretty output is for humans at a terminal, text is compact and
//! line-oriented for pipes and agents, JSON is the stable response envelope.
//!
//! # Output mode resolution
//!
//! Precedence (highest wins):
//! 1. `--format`
//! 2. `DOCSIFT_FORMAT` env var: `"pretty"` | `"text"` | `"json"`
//! 3. Default: [`OutputMode::Pretty`] if stdout is a TTY; [`OutputMode::Text`] if piped.

use clap::ValueEnum;
use docsift_core::SearchError;
use serde::Serialize;
use std::io::{self, IsTerminal, Write};

pub const PRETTY_RULE_WIDTH: usize = 72;

pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{:-<width$}", "", width = PRETTY_RULE_WIDTH)
}

/// Section heading followed by a separator.
pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

/// Left-aligned key/value line.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "  {:<12} {}", format!("{key}:"), value.as_ref())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Human-oriented sections with framing.
    Pretty,
    /// One line per result, tab separated.
    Text,
    /// The full response envelope as JSON.
    Json,
}

impl OutputMode {
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

fn resolve_output_mode_inner(
    format_flag: Option<OutputMode>,
    format_env: Option<&str>,
    is_tty: bool,
) -> OutputMode {
    if let Some(mode) = format_flag {
        return mode;
    }
    if let Some(val) = format_env {
        match val.trim().to_lowercase().as_str() {
            "json" => return OutputMode::Json,
            "text" => return OutputMode::Text,
            "pretty" => return OutputMode::Pretty,
            _ => {}
        }
    }
    if is_tty {
        OutputMode::Pretty
    } else {
        OutputMode::Text
    }
}

/// Resolve the output mode from the flag, environment and TTY default.
pub fn resolve_output_mode(format_flag: Option<OutputMode>) -> OutputMode {
    let env_val = std::env::var("DOCSIFT_FORMAT").ok();
    resolve_output_mode_inner(format_flag, env_val.as_deref(), io::stdout().is_terminal())
}

/// Render a serializable value with explicit pretty/text renderers.
pub fn render_mode<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Text => text_fn(value, &mut out)?,
        OutputMode::Pretty => pretty_fn(value, &mut out)?,
    }
    Ok(())
}

/// A failure as reported to the user.
#[derive(Debug, Serialize)]
pub struct CliError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Stable machine code such as `E2001`.
    pub error_code: String,
}

impl CliError {
    pub fn with_details(
        message: impl Into<String>,
        suggestion: Option<&str>,
        error_code: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            suggestion: suggestion.map(String::from),
            error_code: error_code.into(),
        }
    }
}

impl From<&SearchError> for CliError {
    fn from(err: &SearchError) -> Self {
        let code = err.code();
        Self::with_details(err.to_string(), code.hint(), code.code())
    }
}

fn write_error(w: &mut dyn Write, mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    if mode.is_json() {
        serde_json::to_writer_pretty(&mut *w, &serde_json::json!({ "error": error }))?;
        writeln!(w)?;
    } else {
        writeln!(w, "error[{}]: {}", error.error_code, error.message)?;
        if let Some(suggestion) = &error.suggestion {
            writeln!(w, "  suggestion: {suggestion}")?;
        }
    }
    Ok(())
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    write_error(&mut out, mode, error)
}

/// First `max` characters of `text` on one line, with an ellipsis when cut.
pub fn snippet(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsift_core::SearchError;

    #[test]
    fn format_flag_wins_over_env() {
        let mode = resolve_output_mode_inner(Some(OutputMode::Text), Some("json"), true);
        assert_eq!(mode, OutputMode::Text);
    }

    #[test]
    fn env_applies_without_flag() {
        assert_eq!(resolve_output_mode_inner(None, Some("JSON"), true), OutputMode::Json);
        assert_eq!(resolve_output_mode_inner(None, Some("bogus"), false), OutputMode::Text);
    }

    #[test]
    fn tty_picks_pretty() {
        assert_eq!(resolve_output_mode_inner(None, None, true), OutputMode::Pretty);
        assert_eq!(resolve_output_mode_inner(None, None, false), OutputMode::Text);
    }

    #[test]
    fn search_error_carries_code_and_hint() {
        let err = SearchError::validation("limit", "0 is outside 1..=100");
        let cli = CliError::from(&err);
        assert_eq!(cli.error_code, "E2001");
        assert!(cli.message.contains("limit"));

        let mut buf = Vec::new();
        write_error(&mut buf, OutputMode::Text, &cli).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.starts_with("error[E2001]: invalid limit"));

        let mut buf = Vec::new();
        write_error(&mut buf, OutputMode::Json, &cli).expect("write");
        let json: serde_json::Value = serde_json::from_slice(&buf).expect("json");
        assert_eq!(json["error"]["error_code"], "E2001");
    }

    #[test]
    fn snippet_flattens_and_cuts() {
        assert_eq!(snippet("a\n  b", 10), "a b");
        assert_eq!(snippet("abcdefghij", 5), "abcd…");
    }
}
