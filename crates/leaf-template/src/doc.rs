/*
 * doc.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Document type for structured template output.
//!
//! Evaluation builds a `Doc` rather than a `String` so that block tags can
//! nest their output at the indentation of the line they start on. Nesting is
//! structural: a `Prefixed` node prefixes every line of its content after the
//! first, and nested prefixes accumulate.

/// A structured document representation.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Doc {
    /// Empty document (produces no output).
    #[default]
    Empty,

    /// Literal text.
    Text(String),

    /// Concatenation of documents, kept flat.
    Concat(Vec<Doc>),

    /// Prefix each line after the first of the inner document.
    Prefixed(String, Box<Doc>),

    /// A hard newline.
    NewLine,
}

impl Doc {
    /// Create a text document from a string.
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() { Doc::Empty } else { Doc::Text(s) }
    }

    /// Concatenate two documents. Empty documents are dropped.
    ///
    /// Concatenations are flattened, so long runs of siblings never nest.
    pub fn concat(self, other: Doc) -> Self {
        match (self, other) {
            (Doc::Empty, other) => other,
            (this, Doc::Empty) => this,
            (Doc::Concat(mut parts), Doc::Concat(more)) => {
                parts.extend(more);
                Doc::Concat(parts)
            }
            (Doc::Concat(mut parts), other) => {
                parts.push(other);
                Doc::Concat(parts)
            }
            (this, Doc::Concat(mut more)) => {
                more.insert(0, this);
                Doc::Concat(more)
            }
            (this, other) => Doc::Concat(vec![this, other]),
        }
    }

    /// Check if this document is empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Doc::Empty => true,
            Doc::Text(s) => s.is_empty(),
            Doc::Concat(parts) => parts.iter().all(Doc::is_empty),
            Doc::Prefixed(_, inner) => inner.is_empty(),
            Doc::NewLine => false,
        }
    }

    /// Nest `inner` under `prefix`. An empty prefix is a no-op.
    pub fn prefixed(prefix: impl Into<String>, inner: Doc) -> Self {
        let prefix = prefix.into();
        if inner.is_empty() {
            Doc::Empty
        } else if prefix.is_empty() {
            inner
        } else {
            Doc::Prefixed(prefix, Box::new(inner))
        }
    }

    pub fn newline() -> Self {
        Doc::NewLine
    }

    /// Render this document to a string.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }

    fn render_into(&self, out: &mut String) {
        match self {
            Doc::Empty => {}
            Doc::Text(s) => out.push_str(s),
            Doc::Concat(parts) => {
                for part in parts {
                    part.render_into(out);
                }
            }
            Doc::Prefixed(prefix, inner) => {
                let inner = inner.render();
                apply_prefix(&inner, prefix, out);
            }
            Doc::NewLine => out.push('\n'),
        }
    }
}

/// Append `s` to `out`, prefixing each non-empty line after the first.
fn apply_prefix(s: &str, prefix: &str, out: &mut String) {
    for (i, line) in s.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
            if !line.is_empty() {
                out.push_str(prefix);
            }
        }
        out.push_str(line);
    }
}

/// Concatenate multiple documents.
pub fn concat_docs(docs: impl IntoIterator<Item = Doc>) -> Doc {
    docs.into_iter().fold(Doc::Empty, Doc::concat)
}

/// Intersperse documents with a separator, skipping empty ones.
pub fn intersperse_docs(docs: impl IntoIterator<Item = Doc>, sep: Doc) -> Doc {
    let mut result = Doc::Empty;
    let mut first = true;

    for doc in docs {
        if doc.is_empty() {
            continue;
        }
        if first {
            first = false;
        } else {
            result = result.concat(sep.clone());
        }
        result = result.concat(doc);
    }

    result
}
