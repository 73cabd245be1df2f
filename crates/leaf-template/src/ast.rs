/*
 * ast.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template AST types.
//!
//! This module defines the abstract syntax tree for parsed templates.
//! Each node includes source location information for error reporting.

use crate::source::Span;
use crate::value::Value;

/// A node in the template AST.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateNode {
    /// Literal text to be output as-is.
    Literal(Literal),

    /// Print expression: `#(expr)` or a function tag like `#lowercase(x)`
    Print(Print),

    /// Conditional chain: `#if(c) {...} else if (c) {...} else {...}`
    Conditional(Conditional),

    /// Loop: `#for(item in items) {...}`
    ForLoop(ForLoop),

    /// Scope-local binding: `#var("name", expr)`
    Var(VarDecl),

    /// Sub-template inclusion: `#embed("name")`
    Embed(Embed),

    /// Unparsed body: `#raw() {...}`
    Raw(Raw),

    /// Comment (not rendered): `#// ...` or `#/* ... */`
    Comment(Comment),
}

impl TemplateNode {
    pub fn span(&self) -> Span {
        match self {
            TemplateNode::Literal(n) => n.span,
            TemplateNode::Print(n) => n.span,
            TemplateNode::Conditional(n) => n.span,
            TemplateNode::ForLoop(n) => n.span,
            TemplateNode::Var(n) => n.span,
            TemplateNode::Embed(n) => n.span,
            TemplateNode::Raw(n) => n.span,
            TemplateNode::Comment(n) => n.span,
        }
    }

    /// Indentation slot for tags whose output is nested at their line's indent.
    pub(crate) fn indent_mut(&mut self) -> Option<&mut String> {
        match self {
            TemplateNode::Conditional(n) => Some(&mut n.indent),
            TemplateNode::ForLoop(n) => Some(&mut n.indent),
            TemplateNode::Raw(n) => Some(&mut n.indent),
            _ => None,
        }
    }
}

/// Literal text node.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub text: String,
    pub span: Span,
}

/// Print node.
#[derive(Debug, Clone, PartialEq)]
pub struct Print {
    pub expr: Expr,
    pub span: Span,
}

/// A tag body: `{ ... }`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Body {
    pub nodes: Vec<TemplateNode>,
    /// True when the opening `{` ends its line. Block bodies render as
    /// whole lines and are nested at the tag's indentation.
    pub block: bool,
}

/// Conditional chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    /// List of (condition, body) pairs for if/else-if branches.
    pub branches: Vec<(Expr, Body)>,
    /// Optional else branch.
    pub else_branch: Option<Body>,
    /// Whitespace preceding the tag on its source line.
    pub indent: String,
    pub span: Span,
}

/// Loop over an array or dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct ForLoop {
    /// Name bound to the current item.
    pub binding: String,
    /// Collection being iterated.
    pub source: Expr,
    pub body: Body,
    pub indent: String,
    pub span: Span,
}

/// `#var(name, value)` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub value: Expr,
    pub span: Span,
}

/// `#embed(path)` inclusion.
#[derive(Debug, Clone, PartialEq)]
pub struct Embed {
    pub path: Expr,
    pub span: Span,
}

/// `#raw() { ... }` body kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct Raw {
    pub text: String,
    pub block: bool,
    pub indent: String,
    pub span: Span,
}

/// Comment text (without delimiters).
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub text: String,
    /// `#//` comment, which also ends its line.
    pub line: bool,
    pub span: Span,
}

/// An expression inside a tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Literal value: `42`, `"text"`, `true`, `nil`
    Constant(Value),

    /// Variable reference: `name`, `user.address.city`, `items[0]`
    Variable(Vec<PathSegment>),

    /// String with embedded tags: `"foo: #(foo)"`
    Interpolated(Vec<StringPart>),

    /// Unary operation: `!x`, `-x`
    Unary(UnaryOp, Box<Expr>),

    /// Binary operation: `a > b`, `a && b`
    Binary(BinaryOp, Box<Expr>, Box<Expr>),

    /// Nested tag: `#(expr)` or `#name(args)` inside an expression.
    Tag(TagCall),

    /// Bare function call: `lowercase(name)`
    Call(String, Vec<Expr>),
}

/// A tag invoked inside an expression.
#[derive(Debug, Clone, PartialEq)]
pub struct TagCall {
    /// `None` for the bare print form `#(...)`.
    pub name: Option<String>,
    pub args: Vec<Expr>,
}

/// One piece of an interpolated string.
#[derive(Debug, Clone, PartialEq)]
pub enum StringPart {
    Text(String),
    Expr(Expr),
}

/// One step of a variable path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{}", key),
            PathSegment::Index(i) => write!(f, "[{}]", i),
        }
    }
}

/// Render a path as it would be written in a template (`a.b[0]`).
pub fn path_to_string(path: &[PathSegment]) -> String {
    let mut out = String::new();
    for (i, segment) in path.iter().enumerate() {
        if i > 0 && matches!(segment, PathSegment::Key(_)) {
            out.push('.');
        }
        out.push_str(&segment.to_string());
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl BinaryOp {
    /// Binding strength; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Equal | BinaryOp::NotEqual => 3,
            BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => 4,
            BinaryOp::Add | BinaryOp::Subtract => 5,
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => 6,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
        }
    }
}
