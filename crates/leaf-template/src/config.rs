/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Renderer configuration.

use crate::eval_context::DEFAULT_MAX_EMBED_DEPTH;
use crate::parser::DEFAULT_MAX_NESTING_DEPTH;
use serde::{Deserialize, Serialize};

/// Options for a [`crate::Renderer`].
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// extension = "html"
/// strict_variables = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RendererConfig {
    /// Extension appended to template names that have none.
    pub extension: String,

    /// Maximum nesting of tags and bodies accepted by the parser.
    pub max_nesting_depth: usize,

    /// Maximum nesting of `#embed`s before `RecursiveEmbed`.
    pub max_embed_depth: usize,

    /// Undefined variables are errors instead of null.
    pub strict_variables: bool,

    /// Keep compiled templates in a [`crate::cache::MemoryCache`].
    pub cache: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            extension: "leaf".to_string(),
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            max_embed_depth: DEFAULT_MAX_EMBED_DEPTH,
            strict_variables: false,
            cache: true,
        }
    }
}

impl RendererConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    pub fn with_max_embed_depth(mut self, depth: usize) -> Self {
        self.max_embed_depth = depth;
        self
    }

    pub fn with_strict_variables(mut self, strict: bool) -> Self {
        self.strict_variables = strict;
        self
    }

    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }
}
