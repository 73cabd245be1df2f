/*
 * mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Command implementations for the Leaf CLI
//!
//! Each command module handles the CLI interface and delegates to
//! leaf-template for the actual work. Shared setup (configuration, loaders,
//! diagnostics) lives here.

pub mod check;
pub mod render;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use leaf_template::{FileSystemLoader, LeafError, Renderer, RendererConfig, render_report};
use tracing::debug;

/// Configuration file looked up in the template root when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "leaf.toml";

/// Load the renderer configuration.
///
/// An explicit path must exist; otherwise `leaf.toml` in `root` is used when
/// present, and the defaults when not.
pub fn load_config(explicit: Option<&Path>, root: &Path) -> Result<RendererConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let candidate = root.join(DEFAULT_CONFIG_FILE);
            if !candidate.is_file() {
                return Ok(RendererConfig::default());
            }
            candidate
        }
    };
    debug!("Loading configuration from {}", path.display());
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    RendererConfig::from_toml_str(&text)
        .with_context(|| format!("Invalid config file {}", path.display()))
}

/// Directory templates resolve against: `root` if given, else the
/// template's own directory.
pub fn template_root(template: &Path, root: Option<&Path>) -> PathBuf {
    match root {
        Some(root) => root.to_path_buf(),
        None => match template.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        },
    }
}

/// Name of `template` relative to `root`, as passed to the renderer.
pub fn template_name(template: &Path, root: &Path) -> Result<String> {
    let relative = template.strip_prefix(root).unwrap_or(template);
    let name = relative
        .to_str()
        .with_context(|| format!("Template path is not valid UTF-8: {}", template.display()))?;
    Ok(name.replace('\\', "/"))
}

/// Build a filesystem-backed renderer rooted at `root`.
pub fn make_renderer(root: &Path, config: RendererConfig) -> Renderer {
    Renderer::with_config(FileSystemLoader::new(root), config)
}

/// Human-readable diagnostic for an error raised while handling `name`.
///
/// Errors with a source location are drawn against the template they occurred
/// in, which for embed failures is the innermost embedded template.
pub fn format_diagnostic(renderer: &Renderer, name: &str, err: &LeafError, color: bool) -> String {
    let failing = err.chain().last().map_or(name, String::as_str);
    match renderer.load_source(failing) {
        Ok((resolved, source)) => {
            render_report(err, &resolved, &source, color)
                .unwrap_or_else(|| err.to_string())
        }
        Err(_) => err.to_string(),
    }
}

/// Print a diagnostic to stderr, colored when stderr is a terminal.
pub fn print_diagnostic(renderer: &Renderer, name: &str, err: &LeafError) {
    let stderr = std::io::stderr();
    let color = stderr.is_terminal();
    eprintln!("{}", format_diagnostic(renderer, name, err, color));
}
