/*
 * renderer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template rendering with named templates and `#embed`.
//!
//! A [`Renderer`] ties together a [`TemplateLoader`] that finds template
//! sources, a [`TemplateCache`] that keeps compiled templates, and a
//! [`RendererConfig`]. It is `Send + Sync`, so one renderer can serve
//! concurrent renders; every render owns its own scope stack.

use crate::cache::{MemoryCache, NoCache, TemplateCache};
use crate::config::RendererConfig;
use crate::context::Context;
use crate::error::LeafResult;
use crate::eval_context::{EmbedSource, EvalContext};
use crate::loader::{TemplateLoader, resolve_template_path};
use crate::parser::Template;
use std::sync::Arc;

/// Renders templates by source text or by name.
#[derive(Clone)]
pub struct Renderer {
    loader: Arc<dyn TemplateLoader>,
    cache: Arc<dyn TemplateCache>,
    config: RendererConfig,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Renderer {
    /// Create a renderer with the default configuration.
    pub fn new(loader: impl TemplateLoader + 'static) -> Self {
        Self::with_config(loader, RendererConfig::default())
    }

    /// Create a renderer with the given configuration.
    ///
    /// The cache is a [`MemoryCache`] when `config.cache` is set and
    /// [`NoCache`] otherwise.
    pub fn with_config(loader: impl TemplateLoader + 'static, config: RendererConfig) -> Self {
        let cache: Arc<dyn TemplateCache> = if config.cache {
            Arc::new(MemoryCache::new())
        } else {
            Arc::new(NoCache)
        };
        Self {
            loader: Arc::new(loader),
            cache,
            config,
        }
    }

    /// Replace the template cache.
    pub fn with_cache(mut self, cache: Arc<dyn TemplateCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Compile template source text with this renderer's nesting limit.
    pub fn compile(&self, source: &str) -> LeafResult<Template> {
        Template::compile_with_depth(source, self.config.max_nesting_depth)
    }

    /// Compile and render template source text.
    ///
    /// The source itself is not cached; templates it embeds are.
    pub fn render(&self, source: &str, context: &Context) -> LeafResult<String> {
        let template = self.compile(source)?;
        self.render_template(&template, context)
    }

    /// Render an already compiled template.
    pub fn render_template(&self, template: &Template, context: &Context) -> LeafResult<String> {
        let mut ctx = EvalContext::new(context)
            .with_strict_mode(self.config.strict_variables)
            .with_max_embed_depth(self.config.max_embed_depth)
            .with_embeds(self);
        Ok(template.evaluate(&mut ctx)?.render())
    }

    /// Load and compile the template registered under `name`, through the cache.
    pub fn compile_path(&self, name: &str) -> LeafResult<Arc<Template>> {
        let path = resolve_template_path(name, &self.config.extension);
        self.cache.get_or_compile(&path, &|| {
            let source = self.loader.load(&path)?;
            tracing::debug!(template = %path, bytes = source.len(), "compiling template");
            Ok(self.compile(&source)?.with_name(path.clone()))
        })
    }

    /// Render the template registered under `name`.
    pub fn render_path(&self, name: &str, context: &Context) -> LeafResult<String> {
        let template = self.compile_path(name)?;
        self.render_template(&template, context)
    }

    /// Load the source text of the template registered under `name`.
    ///
    /// Returns the resolved name along with the source, for diagnostics.
    pub fn load_source(&self, name: &str) -> LeafResult<(String, String)> {
        let path = resolve_template_path(name, &self.config.extension);
        let source = self.loader.load(&path)?;
        Ok((path, source))
    }
}

impl EmbedSource for Renderer {
    fn load_embed(&self, name: &str) -> LeafResult<Arc<Template>> {
        self.compile_path(name)
    }
}
