/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Leaf-compatible tag template engine.
//!
//! Templates are plain text with `#` tags. The engine supports:
//!
//! - Print tags: `#(user.name)`, `#(count + 1)`
//! - Conditionals: `#if(x) { ... } else { ... }`, chained `##ifElse(y) { ... }`
//!   and `##else() { ... }`
//! - Loops: `#for(item in items) { ... }` with `loop.index`, `loop.isFirst`, ...
//! - Local variables: `#var(name, value)`
//! - Embedding other templates: `#embed("header")`
//! - Raw bodies: `#raw() { #not(a tag) }`
//! - Function tags: `#lowercase(x)`, `#count(items)`, `#contains(list, x)`
//! - Comments: `#// line` and `#/* block */`
//! - Escaped hashes inside strings: `#("\#(literal)")`
//!
//! Bodies whose `{` ends its line are laid out as blocks: their first and
//! last lines are dropped and the remaining lines are dedented and re-indented
//! at the tag's position.
//!
//! # Example
//!
//! ```ignore
//! use leaf_template::{Context, Template};
//!
//! let template = Template::compile("Hello, #(name)!")?;
//! let context = Context::new().with("name", "World");
//! assert_eq!(template.render(&context)?, "Hello, World!");
//! ```
//!
//! Templates that embed others are rendered through a [`Renderer`], which
//! finds sources with a [`TemplateLoader`] and keeps compiled templates in a
//! [`TemplateCache`]:
//!
//! ```ignore
//! use leaf_template::{Context, MemoryLoader, Renderer};
//!
//! let loader = MemoryLoader::with_templates([("header", "<h1>#(title)</h1>")]);
//! let renderer = Renderer::new(loader);
//! let context = Context::new().with("title", "Home");
//! assert_eq!(renderer.render("#embed(\"header\")", &context)?, "<h1>Home</h1>");
//! ```

pub mod ast;
pub mod cache;
pub mod config;
pub mod context;
pub mod doc;
pub mod error;
pub mod eval_context;
pub mod evaluator;
pub mod functions;
mod layout;
pub mod lexer;
pub mod loader;
pub mod parser;
pub mod renderer;
pub mod report;
pub mod source;
pub mod value;

// Re-export main types at crate root
pub use ast::{
    BinaryOp, Body, Comment, Conditional, Embed, Expr, ExprKind, ForLoop, Literal, PathSegment,
    Print, Raw, StringPart, TagCall, TemplateNode, UnaryOp, VarDecl,
};
pub use cache::{MemoryCache, NoCache, TemplateCache};
pub use config::RendererConfig;
pub use context::{Context, Scope};
pub use doc::Doc;
pub use error::{ErrorKind, LeafError, LeafResult};
pub use eval_context::{EmbedSource, EvalContext};
pub use functions::Function;
pub use loader::{FileSystemLoader, MemoryLoader, NullLoader, TemplateLoader};
pub use parser::Template;
pub use renderer::Renderer;
pub use report::render_report;
pub use source::{Location, Span};
pub use value::Value;
