/*
 * loader.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template source loading.
//!
//! This module provides the [`TemplateLoader`] trait used by
//! [`crate::Renderer`] to turn template names into source text, with
//! filesystem, in-memory and empty implementations.

use crate::error::{LeafError, LeafResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Trait for loading template sources.
///
/// Names arrive already resolved by [`resolve_template_path`], so they
/// carry an extension (e.g. `"header.leaf"`).
pub trait TemplateLoader: Send + Sync {
    /// Load a template's source text.
    ///
    /// Returns [`LeafError::TemplateNotFound`] when no template has this name.
    fn load(&self, name: &str) -> LeafResult<String>;
}

/// Loader that reads templates from files under a root directory.
#[derive(Debug, Clone)]
pub struct FileSystemLoader {
    root: PathBuf,
}

impl FileSystemLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TemplateLoader for FileSystemLoader {
    fn load(&self, name: &str) -> LeafResult<String> {
        let path = self.root.join(name);
        match std::fs::read_to_string(&path) {
            Ok(source) => Ok(source),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(LeafError::TemplateNotFound {
                    name: name.to_string(),
                })
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to read template");
                Err(err.into())
            }
        }
    }
}

/// Loader that knows no templates.
///
/// Use this loader for renderers whose templates never use `#embed`.
#[derive(Debug, Clone, Default)]
pub struct NullLoader;

impl TemplateLoader for NullLoader {
    fn load(&self, name: &str) -> LeafResult<String> {
        Err(LeafError::TemplateNotFound {
            name: name.to_string(),
        })
    }
}

/// Loader that serves templates from an in-memory map.
///
/// Useful for testing and for templates bundled into an application.
/// Templates may be registered with or without their extension.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    templates: HashMap<String, String>,
}

impl MemoryLoader {
    /// Create a new empty memory loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template to the loader.
    pub fn add(&mut self, name: impl Into<String>, source: impl Into<String>) -> &mut Self {
        self.templates.insert(name.into(), source.into());
        self
    }

    /// Create a loader with the given templates.
    pub fn with_templates(
        templates: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        let mut loader = Self::new();
        for (name, source) in templates {
            loader.add(name, source);
        }
        loader
    }
}

impl TemplateLoader for MemoryLoader {
    fn load(&self, name: &str) -> LeafResult<String> {
        let stem = Path::new(name).with_extension("");
        self.templates
            .get(name)
            .or_else(|| stem.to_str().and_then(|stem| self.templates.get(stem)))
            .cloned()
            .ok_or_else(|| LeafError::TemplateNotFound {
                name: name.to_string(),
            })
    }
}

/// Resolve a template name to the name passed to the loader.
///
/// A name without an extension gets `extension`; a name that already has
/// one is used as-is.
///
/// ```ignore
/// // "header" + "leaf"        -> "header.leaf"
/// // "partials/nav" + "leaf"  -> "partials/nav.leaf"
/// // "page.html" + "leaf"     -> "page.html"
/// ```
pub fn resolve_template_path(name: &str, extension: &str) -> String {
    if extension.is_empty() || Path::new(name).extension().is_some() {
        name.to_string()
    } else {
        format!("{}.{}", name, extension)
    }
}
