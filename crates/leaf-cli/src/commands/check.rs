/*
 * check.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Check command implementation
 */

//! Check command implementation.
//!
//! `leaf check TEMPLATE...` compiles each template without rendering it and
//! prints a diagnostic for every one that fails. Embedded templates are not
//! followed, since embed names may depend on render-time variables.

use std::path::PathBuf;

use anyhow::Result;
use tracing::debug;

use super::{load_config, make_renderer, print_diagnostic, template_name, template_root};

/// Arguments for the check command
#[derive(Debug)]
pub struct CheckArgs {
    /// Template files to check
    pub templates: Vec<PathBuf>,
    /// Renderer configuration file
    pub config: Option<PathBuf>,
}

/// Execute the check command
pub fn execute(args: CheckArgs) -> Result<()> {
    let mut failures = 0;

    for template in &args.templates {
        let root = template_root(template, None);
        let config = load_config(args.config.as_deref(), &root)?;
        let name = template_name(template, &root)?;
        let renderer = make_renderer(&root, config);

        debug!("Checking {}", template.display());
        match renderer.compile_path(&name) {
            Ok(_) => println!("{}: ok", template.display()),
            Err(err) => {
                failures += 1;
                print_diagnostic(&renderer, &name, &err);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!(
            "{} of {} template(s) failed to compile",
            failures,
            args.templates.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_all_valid() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.leaf");
        let b = dir.path().join("b.leaf");
        std::fs::write(&a, "#if(x) {\n    y\n}").unwrap();
        std::fs::write(&b, "#embed(\"not-checked\")").unwrap();

        execute(CheckArgs {
            templates: vec![a, b],
            config: None,
        })
        .unwrap();
    }

    #[test]
    fn test_check_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.leaf");
        let bad = dir.path().join("bad.leaf");
        std::fs::write(&good, "#(x)").unwrap();
        std::fs::write(&bad, "#if() { }").unwrap();

        let err = execute(CheckArgs {
            templates: vec![good, bad],
            config: None,
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "1 of 2 template(s) failed to compile");
    }

    #[test]
    fn test_check_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = execute(CheckArgs {
            templates: vec![dir.path().join("missing.leaf")],
            config: None,
        })
        .unwrap_err();
        assert!(err.to_string().contains("failed to compile"));
    }
}
