/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template lexing, parsing, evaluation and embedding.

use crate::source::Span;
use thiserror::Error;

/// Errors that can occur during template operations.
#[derive(Debug, Error)]
pub enum LeafError {
    /// Malformed token inside a tag expression.
    #[error("Lex error at {span}: {message}")]
    Lex { message: String, span: Span },

    /// Error parsing the template syntax.
    #[error("Parse error at {span}: {message} (in `{snippet}`)")]
    Parse {
        message: String,
        span: Span,
        snippet: String,
    },

    /// Error evaluating the template.
    #[error("Evaluation error at {span}: {message}")]
    Evaluation { message: String, span: Span },

    /// The loader has no template with this name.
    #[error("Template not found: {name}")]
    TemplateNotFound { name: String },

    /// Embeds nested deeper than the configured limit.
    #[error("Recursive embed detected (depth > {max_depth}): {name}")]
    RecursiveEmbed { name: String, max_depth: usize },

    /// Failure inside an embedded template, annotated with the inclusion chain.
    #[error("In embedded template {}: {source}", .chain.join(" -> "))]
    Embed {
        chain: Vec<String>,
        source: Box<LeafError>,
    },

    /// I/O error (e.g., reading a template file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Broad classification of a [`LeafError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lex,
    Parse,
    Evaluation,
    NotFound,
    Embed,
    Io,
}

impl LeafError {
    pub(crate) fn evaluation(message: impl Into<String>, span: Span) -> Self {
        LeafError::Evaluation {
            message: message.into(),
            span,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LeafError::Lex { .. } => ErrorKind::Lex,
            LeafError::Parse { .. } => ErrorKind::Parse,
            LeafError::Evaluation { .. } => ErrorKind::Evaluation,
            LeafError::TemplateNotFound { .. } => ErrorKind::NotFound,
            LeafError::RecursiveEmbed { .. } | LeafError::Embed { .. } => ErrorKind::Embed,
            LeafError::Io(_) => ErrorKind::Io,
        }
    }

    /// Source span of the failure, looking through embed wrappers.
    pub fn span(&self) -> Option<Span> {
        match self {
            LeafError::Lex { span, .. }
            | LeafError::Parse { span, .. }
            | LeafError::Evaluation { span, .. } => Some(*span),
            LeafError::Embed { source, .. } => source.span(),
            _ => None,
        }
    }

    /// Inclusion chain for errors raised inside embedded templates.
    pub fn chain(&self) -> &[String] {
        match self {
            LeafError::Embed { chain, .. } => chain,
            _ => &[],
        }
    }

    /// The innermost error, with embed annotations removed.
    pub fn root_cause(&self) -> &LeafError {
        match self {
            LeafError::Embed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Short human-readable message without the location prefix.
    pub fn message(&self) -> String {
        match self.root_cause() {
            LeafError::Lex { message, .. }
            | LeafError::Parse { message, .. }
            | LeafError::Evaluation { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type for template operations.
pub type LeafResult<T> = Result<T, LeafError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceIndex;

    #[test]
    fn test_parse_error_display() {
        let index = SourceIndex::new("Fine\n##bad()\nGood");
        let err = LeafError::Parse {
            message: "unknown tag `bad`".to_string(),
            span: index.span(5, 10),
            snippet: "##bad".to_string(),
        };
        insta::assert_snapshot!(err.to_string(), @"Parse error at 2:1: unknown tag `bad` (in `##bad`)");
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_embed_error_chain() {
        let inner = LeafError::TemplateNotFound {
            name: "footer".to_string(),
        };
        let err = LeafError::Embed {
            chain: vec!["layout".to_string(), "footer".to_string()],
            source: Box::new(inner),
        };
        assert_eq!(
            err.to_string(),
            "In embedded template layout -> footer: Template not found: footer"
        );
        assert_eq!(err.kind(), ErrorKind::Embed);
        assert_eq!(err.chain(), ["layout", "footer"]);
        assert_eq!(err.root_cause().kind(), ErrorKind::NotFound);
        assert!(err.span().is_none());
    }

    #[test]
    fn test_message_strips_location() {
        let err = LeafError::evaluation("cannot compare int with string", Span::default());
        assert_eq!(err.message(), "cannot compare int with string");
        assert_eq!(err.span(), Some(Span::default()));
    }
}
