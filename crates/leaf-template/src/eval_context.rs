/*
 * eval_context.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Evaluation context for template rendering.
//!
//! [`EvalContext`] is threaded through all evaluation functions. It owns the
//! render's [`Scope`] stack, tracks the chain of embedded templates for
//! recursion protection and error reporting, and carries the render options.

use crate::context::{Context, Scope};
use crate::error::LeafResult;
use crate::parser::Template;
use std::sync::Arc;

/// Default limit on nested `#embed`s.
pub const DEFAULT_MAX_EMBED_DEPTH: usize = 50;

/// Source of templates for `#embed`.
///
/// [`crate::Renderer`] implements this on top of its loader and cache.
pub trait EmbedSource {
    /// Load and compile the template registered under `name`.
    fn load_embed(&self, name: &str) -> LeafResult<Arc<Template>>;
}

/// Context for template evaluation.
pub struct EvalContext<'a> {
    /// Variable bindings, layered over the caller's context.
    pub scope: Scope<'a>,

    /// Where `#embed` finds templates. `None` makes every embed fail with
    /// "template not found".
    pub embeds: Option<&'a dyn EmbedSource>,

    /// Names of the templates currently being embedded, outermost first.
    pub embed_stack: Vec<String>,

    /// Maximum embed nesting depth before error.
    pub max_embed_depth: usize,

    /// Strict mode: undefined variables are errors instead of null.
    pub strict_mode: bool,
}

impl<'a> EvalContext<'a> {
    /// Create a new evaluation context over the given variables.
    pub fn new(context: &'a Context) -> Self {
        Self {
            scope: Scope::new(context),
            embeds: None,
            embed_stack: Vec::new(),
            max_embed_depth: DEFAULT_MAX_EMBED_DEPTH,
            strict_mode: false,
        }
    }

    /// Enable or disable strict mode.
    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    /// Set the maximum embed nesting depth.
    pub fn with_max_embed_depth(mut self, depth: usize) -> Self {
        self.max_embed_depth = depth;
        self
    }

    pub fn with_embeds(mut self, embeds: &'a dyn EmbedSource) -> Self {
        self.embeds = Some(embeds);
        self
    }

    pub fn embed_depth(&self) -> usize {
        self.embed_stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LeafError;
    use crate::value::Value;

    struct OneTemplate;

    impl EmbedSource for OneTemplate {
        fn load_embed(&self, name: &str) -> LeafResult<Arc<Template>> {
            if name == "hello" {
                Ok(Arc::new(Template::compile("Hello!")?))
            } else {
                Err(LeafError::TemplateNotFound {
                    name: name.to_string(),
                })
            }
        }
    }

    #[test]
    fn test_defaults() {
        let context = Context::new();
        let ctx = EvalContext::new(&context);
        assert!(!ctx.strict_mode);
        assert_eq!(ctx.max_embed_depth, DEFAULT_MAX_EMBED_DEPTH);
        assert!(ctx.embeds.is_none());
        assert_eq!(ctx.embed_depth(), 0);
    }

    #[test]
    fn test_builders() {
        let context = Context::new();
        let source = OneTemplate;
        let ctx = EvalContext::new(&context)
            .with_strict_mode(true)
            .with_max_embed_depth(3)
            .with_embeds(&source);
        assert!(ctx.strict_mode);
        assert_eq!(ctx.max_embed_depth, 3);
        assert!(ctx.embeds.is_some_and(|e| e.load_embed("hello").is_ok()));
    }

    #[test]
    fn test_scope_reads_context() {
        let context = Context::new().with("x", 1);
        let ctx = EvalContext::new(&context);
        assert_eq!(ctx.scope.lookup("x"), Some(&Value::Int(1)));
    }
}
