//! Output layer shared by every command.
//!
//! Commands receive an [`OutputMode`] and render through it: pretty output
//! for humans, compact text rows for pipes, or the raw JSON envelope.
//!
//! The mode itself is resolved by `civic_core::config` (flag, `FORMAT`,
//! config file, then TTY detection); this module only maps the resolved
//! name back to the enum.

use civic_core::api::{Envelope, Reply};
use civic_core::error::ErrorCode;
use clap::ValueEnum;
use serde::Serialize;
use std::io::{self, Write};

/// Shared width for pretty separators.
pub const PRETTY_RULE_WIDTH: usize = 72;

pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{:-<width$}", "", width = PRETTY_RULE_WIDTH)
}

/// Write a heading followed by a separator.
pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

/// Left-aligned key/value line.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<12} {}", format!("{key}:"), value.as_ref())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Human-oriented sections.
    Pretty,
    /// Plain rows for pipes and scripts.
    Text,
    /// The response envelope as JSON.
    Json,
}

impl OutputMode {
    /// Map a resolved output name; anything unknown falls back to text.
    pub fn from_resolved(name: &str) -> Self {
        match name {
            "json" => Self::Json,
            "pretty" => Self::Pretty,
            _ => Self::Text,
        }
    }

    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

/// A structured CLI failure with an optional remediation hint.
#[derive(Debug, Serialize)]
pub struct CliError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            error_code: None,
        }
    }

    pub fn from_code(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: code.hint().map(str::to_string),
            error_code: Some(code.code().to_string()),
        }
    }
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, &serde_json::json!({ "error": error }))?;
            writeln!(out)?;
        }
        OutputMode::Pretty | OutputMode::Text => {
            writeln!(out, "error: {}", error.message)?;
            if let Some(ref suggestion) = error.suggestion {
                writeln!(out, "  suggestion: {suggestion}")?;
            }
        }
    }
    Ok(())
}

/// Render a serializable value with distinct text and pretty renderers.
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

/// Render a request-layer reply.
///
/// JSON mode prints the envelope unchanged, success or not. Otherwise a
/// successful reply's payload goes to `render_data` and a failed one is
/// written to stderr. A failed reply always becomes an `Err` so the
/// process exits non-zero.
pub fn render_reply(
    mode: OutputMode,
    reply: &Reply,
    render_data: impl FnOnce(&serde_json::Value, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    if !reply.is_success() {
        let message = reply
            .error()
            .map_or_else(|| reply.envelope.message.clone(), |body| body.message);
        if mode.is_json() {
            write_envelope(&reply.envelope)?;
        } else {
            render_error(mode, &CliError::new(message.clone()))?;
        }
        anyhow::bail!("request failed with status {}: {message}", reply.status);
    }

    if mode.is_json() {
        return write_envelope(&reply.envelope);
    }
    let stdout = io::stdout();
    let mut out = stdout.lock();
    render_data(&reply.envelope.data, &mut out)?;
    Ok(())
}

/// Write a plain acknowledgement payload such as `"upvoted"`.
pub fn write_ack(data: &serde_json::Value, w: &mut dyn Write) -> io::Result<()> {
    match data.as_str() {
        Some(message) => writeln!(w, "✓ {message}"),
        None => writeln!(w, "{data}"),
    }
}

fn write_envelope(envelope: &Envelope) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, envelope)?;
    writeln!(out)?;
    Ok(())
}
