/*
 * render.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Render command implementation
 */

//! Render command implementation.
//!
//! `leaf render TEMPLATE` renders one template against a JSON or TOML
//! context file. `#embed` names resolve against the template root.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use leaf_template::Context as TemplateContext;
use tracing::{debug, info};

use super::{load_config, make_renderer, print_diagnostic, template_name, template_root};

/// Arguments for the render command
#[derive(Debug)]
pub struct RenderArgs {
    /// Template file to render
    pub template: PathBuf,
    /// JSON or TOML file with the template's variables
    pub context: Option<PathBuf>,
    /// Directory that embeds resolve against
    pub root: Option<PathBuf>,
    /// Renderer configuration file
    pub config: Option<PathBuf>,
    /// Output file path (stdout when absent)
    pub output: Option<PathBuf>,
}

/// Execute the render command
pub fn execute(args: RenderArgs) -> Result<()> {
    let root = template_root(&args.template, args.root.as_deref());
    let config = load_config(args.config.as_deref(), &root)?;
    let name = template_name(&args.template, &root)?;

    let context = match &args.context {
        Some(path) => load_context(path)?,
        None => TemplateContext::new(),
    };

    debug!("Rendering {} from root {}", name, root.display());
    let renderer = make_renderer(&root, config);
    let output = match renderer.render_path(&name, &context) {
        Ok(output) => output,
        Err(err) => {
            print_diagnostic(&renderer, &name, &err);
            anyhow::bail!("Failed to render {}", args.template.display());
        }
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write output file {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => print!("{}", output),
    }

    Ok(())
}

/// Read template variables from a `.json` or `.toml` file.
pub fn load_context(path: &Path) -> Result<TemplateContext> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read context file {}", path.display()))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => TemplateContext::from_json(&text)
            .with_context(|| format!("Invalid JSON context {}", path.display())),
        Some("toml") => toml::from_str(&text)
            .with_context(|| format!("Invalid TOML context {}", path.display())),
        _ => anyhow::bail!(
            "Unsupported context file {} (expected .json or .toml)",
            path.display()
        ),
    }
}
