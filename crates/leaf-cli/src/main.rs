/*
 * main.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Leaf CLI - Main entry point

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "leaf")]
#[command(version)]
#[command(about = "Render and check Leaf templates", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template to stdout or a file
    Render {
        /// Template file to render
        template: PathBuf,

        /// JSON or TOML file with the template's variables
        #[arg(short, long)]
        context: Option<PathBuf>,

        /// Directory that `#embed` names are resolved against
        /// (defaults to the template's directory)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Renderer configuration file (defaults to `leaf.toml` in the root, if present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write output to FILE instead of stdout
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Compile templates and report syntax errors
    Check {
        /// Template files to check
        #[arg(required = true)]
        templates: Vec<PathBuf>,

        /// Renderer configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn log_filter(verbose: u8) -> tracing_subscriber::EnvFilter {
    match verbose {
        0 => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "leaf=warn".into()),
        1 => "leaf=debug".into(),
        _ => "leaf=trace".into(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging on stderr; stdout carries rendered output
    tracing_subscriber::registry()
        .with(log_filter(cli.verbose))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Render {
            template,
            context,
            root,
            config,
            output,
        } => commands::render::execute(commands::render::RenderArgs {
            template,
            context,
            root,
            config,
            output,
        }),
        Commands::Check { templates, config } => {
            commands::check::execute(commands::check::CheckArgs { templates, config })
        }
    }
}
