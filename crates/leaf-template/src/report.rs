/*
 * report.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Source-annotated error reports.
//!
//! Renders a [`LeafError`] that carries a span as an ariadne report with the
//! offending template text underlined. Errors inside embedded templates are
//! reported against the innermost template, so callers pass that template's
//! name and source (see [`crate::Renderer::load_source`]).

use crate::error::{ErrorKind, LeafError};
use ariadne::{Color, Config, Label, Report, ReportKind, Source};

/// Render `err` against `source` as a multi-line diagnostic.
///
/// Returns `None` when the error has no source location (e.g. a missing
/// template); callers fall back to the error's `Display` output.
pub fn render_report(err: &LeafError, name: &str, source: &str, color: bool) -> Option<String> {
    let cause = err.root_cause();
    let span = cause.span()?;

    // ariadne counts characters, spans count bytes
    let start = char_offset(source, span.start.offset);
    let end = char_offset(source, span.end.offset).max(start + 1);

    let mut builder = Report::build(ReportKind::Error, name.to_string(), start)
        .with_config(Config::default().with_color(color))
        .with_message(title(cause))
        .with_label(
            Label::new((name.to_string(), start..end))
                .with_message(cause.message())
                .with_color(Color::Red),
        );
    if !err.chain().is_empty() {
        builder = builder.with_note(format!("embedded via {}", err.chain().join(" -> ")));
    }

    let mut output = Vec::new();
    builder
        .finish()
        .write((name.to_string(), Source::from(source)), &mut output)
        .ok()?;
    String::from_utf8(output).ok()
}

fn title(err: &LeafError) -> &'static str {
    match err.kind() {
        ErrorKind::Lex => "Invalid token",
        ErrorKind::Parse => "Invalid template syntax",
        ErrorKind::Evaluation => "Template evaluation failed",
        ErrorKind::NotFound => "Template not found",
        ErrorKind::Embed => "Embed failed",
        ErrorKind::Io => "I/O error",
    }
}

fn char_offset(source: &str, byte_offset: usize) -> usize {
    let end = byte_offset.min(source.len());
    source
        .char_indices()
        .take_while(|(i, _)| *i < end)
        .count()
}
