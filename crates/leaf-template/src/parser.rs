/*
 * parser.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template parser.
//!
//! A recursive-descent parser over the [`Lexer`]'s token stream. Tag bodies
//! recurse into [`Parser::parse_nodes`]; expressions use precedence climbing;
//! interpolated strings recurse back into the tag grammar. All recursion is
//! bounded by the configured maximum nesting depth.

use crate::ast::{
    BinaryOp, Body, Comment, Conditional, Embed, Expr, ExprKind, ForLoop, Literal, PathSegment,
    Print, Raw, StringPart, TagCall, TemplateNode, UnaryOp, VarDecl,
};
use crate::error::{LeafError, LeafResult};
use crate::functions::Function;
use crate::layout;
use crate::lexer::{Continuation, Lexer, Operator, TokenKind};
use crate::source::Span;
use crate::value::Value;

/// Default limit for nested tags, bodies and parenthesized expressions.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 64;

/// A compiled template ready for evaluation.
#[derive(Debug, Clone)]
pub struct Template {
    /// The parsed template AST.
    pub(crate) nodes: Vec<TemplateNode>,

    /// Original source (for error reporting).
    pub(crate) source: String,

    /// Name the template was loaded under, if any.
    pub(crate) name: Option<String>,
}

impl Template {
    /// Compile a template from source with default settings.
    pub fn compile(source: &str) -> LeafResult<Self> {
        Self::compile_with_depth(source, DEFAULT_MAX_NESTING_DEPTH)
    }

    /// Compile a template, failing if tags nest deeper than `max_nesting_depth`.
    pub fn compile_with_depth(source: &str, max_nesting_depth: usize) -> LeafResult<Self> {
        let nodes = Parser::new(source)
            .with_max_depth(max_nesting_depth)
            .parse()?;
        Ok(Self {
            nodes,
            source: source.to_string(),
            name: None,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn nodes(&self) -> &[TemplateNode] {
        &self.nodes
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

const KEYWORDS: &[&str] = &["true", "false", "nil", "null", "in"];

fn is_continuation(name: &str) -> bool {
    matches!(name, "else" | "elseif" | "elseIf" | "ifElse")
}

fn is_builtin_tag(name: &str) -> bool {
    matches!(name, "if" | "ifElse" | "for" | "var" | "embed" | "raw") || is_continuation(name)
}

fn binary_op(op: Operator) -> Option<BinaryOp> {
    Some(match op {
        Operator::Or => BinaryOp::Or,
        Operator::And => BinaryOp::And,
        Operator::Equal => BinaryOp::Equal,
        Operator::NotEqual => BinaryOp::NotEqual,
        Operator::Less => BinaryOp::Less,
        Operator::LessEqual => BinaryOp::LessEqual,
        Operator::Greater => BinaryOp::Greater,
        Operator::GreaterEqual => BinaryOp::GreaterEqual,
        Operator::Plus => BinaryOp::Add,
        Operator::Minus => BinaryOp::Subtract,
        Operator::Star => BinaryOp::Multiply,
        Operator::Slash => BinaryOp::Divide,
        Operator::Percent => BinaryOp::Modulo,
        Operator::Not => return None,
    })
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    max_depth: usize,
    depth: usize,
    /// Spans of the tags currently being parsed, innermost last.
    open_tags: Vec<Span>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            lexer: Lexer::new(source),
            max_depth: DEFAULT_MAX_NESTING_DEPTH,
            depth: 0,
            open_tags: Vec::new(),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Parse the whole source into top-level nodes.
    pub fn parse(mut self) -> LeafResult<Vec<TemplateNode>> {
        let mut nodes = self.parse_nodes(None)?;
        layout::assign_indents(&mut nodes);
        Ok(nodes)
    }

    fn error(&self, message: impl Into<String>, span: Span) -> LeafError {
        LeafError::Parse {
            message: message.into(),
            span,
            snippet: self.lexer.index().snippet(span),
        }
    }

    /// Span from the start of `from` to the current position.
    fn span_from(&self, from: Span) -> Span {
        self.lexer.span(from.start.offset, self.lexer.checkpoint())
    }

    fn nest(&mut self, span: Span) -> LeafResult<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(self.error(
                format!("nesting too deep (limit is {})", self.max_depth),
                span,
            ));
        }
        Ok(())
    }

    fn unnest(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn open_tag(&mut self, span: Span) -> LeafResult<()> {
        self.nest(span)?;
        self.open_tags.push(span);
        Ok(())
    }

    fn close_tag(&mut self) {
        self.open_tags.pop();
        self.unnest();
    }

    fn unterminated_tag(&self) -> LeafError {
        let pos = self.lexer.checkpoint();
        let span = self
            .open_tags
            .last()
            .copied()
            .unwrap_or_else(|| self.lexer.span(pos, pos));
        self.error("unterminated tag call; expected `)`", span)
    }

    fn push_literal(nodes: &mut Vec<TemplateNode>, text: String, span: Span) {
        if let Some(TemplateNode::Literal(last)) = nodes.last_mut() {
            last.text.push_str(&text);
            last.span = last.span.to(span);
        } else {
            nodes.push(TemplateNode::Literal(Literal { text, span }));
        }
    }

    /// Parse nodes until end of input, or until the `}` closing the body
    /// opened by the tag at `body_of`.
    fn parse_nodes(&mut self, body_of: Option<Span>) -> LeafResult<Vec<TemplateNode>> {
        let in_body = body_of.is_some();
        let mut nodes = Vec::new();
        let mut open_braces = 0usize;

        loop {
            let token = self.lexer.next_template(in_body);
            match token.kind {
                TokenKind::Eof => {
                    if let Some(tag) = body_of {
                        return Err(self.error("unterminated body; expected `}`", tag));
                    }
                    break;
                }
                TokenKind::BodyClose => {
                    if open_braces == 0 {
                        break;
                    }
                    open_braces -= 1;
                    Self::push_literal(&mut nodes, "}".to_string(), token.span);
                }
                TokenKind::Text(text) => {
                    if in_body {
                        open_braces += text.matches('{').count();
                    }
                    Self::push_literal(&mut nodes, text, token.span);
                }
                TokenKind::Comment {
                    text,
                    terminated,
                    line,
                } => {
                    if !terminated {
                        return Err(
                            self.error("unterminated block comment; expected `*/`", token.span)
                        );
                    }
                    nodes.push(TemplateNode::Comment(Comment {
                        text,
                        line,
                        span: token.span,
                    }));
                }
                TokenKind::TagOpen { name, chained } => {
                    let node = self.parse_tag(name, chained, token.span)?;
                    let has_body = matches!(
                        node,
                        TemplateNode::Conditional(_) | TemplateNode::ForLoop(_) | TemplateNode::Raw(_)
                    );
                    nodes.push(node);
                    if has_body {
                        self.lexer.skip_gap_before_tag();
                    }
                }
                _ => return Err(self.error("unexpected token", token.span)),
            }
        }
        Ok(nodes)
    }

    fn parse_tag(
        &mut self,
        name: Option<String>,
        chained: bool,
        span: Span,
    ) -> LeafResult<TemplateNode> {
        if chained {
            return Err(match name.as_deref() {
                Some(n) if is_continuation(n) => self.error(
                    format!("`##{}` must follow the closing `}}` of a conditional body", n),
                    span,
                ),
                Some(n) => self.error(format!("unknown tag `{}`", n), span),
                None => self.error("unknown tag `##`", span),
            });
        }

        self.open_tag(span)?;
        let node = match name.as_deref() {
            None => self.parse_print(span)?,
            Some("if") | Some("ifElse") => self.parse_conditional(span)?,
            Some("for") => self.parse_for(span)?,
            Some("var") => self.parse_var(span)?,
            Some("embed") => self.parse_embed(span)?,
            Some("raw") => self.parse_raw(span)?,
            Some(n) if is_continuation(n) => {
                return Err(self.error(
                    format!("`#{}` must follow the closing `}}` of a conditional body", n),
                    span,
                ));
            }
            Some(n) => match Function::from_name(n) {
                Some(function) => self.parse_function_tag(function, span)?,
                None => return Err(self.error(format!("unknown tag `{}`", n), span)),
            },
        };
        self.close_tag();
        Ok(node)
    }

    /// Parse `( expr, ... )`. Returns the arguments and the span up to `)`.
    fn parse_args(&mut self, tag: Span) -> LeafResult<(Vec<Expr>, Span)> {
        let open = self.lexer.next_expr()?;
        if open.kind != TokenKind::Punct('(') {
            return Err(self.error("expected `(`", tag.to(open.span)));
        }

        let mut args = Vec::new();
        let checkpoint = self.lexer.checkpoint();
        let token = self.lexer.next_expr()?;
        if token.kind == TokenKind::Punct(')') {
            return Ok((args, tag.to(token.span)));
        }
        self.lexer.reset(checkpoint);

        loop {
            args.push(self.parse_expr()?);
            let token = self.lexer.next_expr()?;
            match token.kind {
                TokenKind::Punct(',') => continue,
                TokenKind::Punct(')') => return Ok((args, tag.to(token.span))),
                TokenKind::Eof => return Err(self.unterminated_tag()),
                _ => {
                    return Err(
                        self.error("expected `,` or `)` after argument", tag.to(token.span))
                    );
                }
            }
        }
    }

    /// Tags without bodies must not be followed directly by `{`.
    fn reject_body(&self, span: Span) -> LeafResult<()> {
        if self.lexer.peek_byte() == Some(b'{') {
            return Err(self.error("this tag does not take a body", span));
        }
        Ok(())
    }

    fn single_arg(&self, args: Vec<Expr>, span: Span, what: &str) -> LeafResult<Expr> {
        let count = args.len();
        let mut args = args.into_iter();
        match (args.next(), args.next()) {
            (Some(expr), None) => Ok(expr),
            (None, _) => Err(self.error(format!("missing {}", what), span)),
            _ => Err(self.error(
                format!("expected a single {}, found {} arguments", what, count),
                span,
            )),
        }
    }

    fn check_arity(&self, function: Function, count: usize, span: Span) -> LeafResult<()> {
        if function.arity() != count {
            return Err(self.error(
                format!(
                    "`{}` expects {} argument(s), found {}",
                    function.name(),
                    function.arity(),
                    count
                ),
                span,
            ));
        }
        Ok(())
    }

    fn parse_print(&mut self, span: Span) -> LeafResult<TemplateNode> {
        let (args, full) = self.parse_args(span)?;
        if args.is_empty() {
            return Err(self.error("empty print tag `#()`", full));
        }
        let expr = self.single_arg(args, full, "expression")?;
        self.reject_body(full)?;
        Ok(TemplateNode::Print(Print { expr, span: full }))
    }

    fn parse_function_tag(&mut self, function: Function, span: Span) -> LeafResult<TemplateNode> {
        let (args, full) = self.parse_args(span)?;
        self.check_arity(function, args.len(), full)?;
        self.reject_body(full)?;
        let call = TagCall {
            name: Some(function.name().to_string()),
            args,
        };
        Ok(TemplateNode::Print(Print {
            expr: Expr::new(ExprKind::Tag(call), full),
            span: full,
        }))
    }

    fn parse_condition(&mut self, span: Span) -> LeafResult<Expr> {
        let (args, full) = self.parse_args(span)?;
        self.single_arg(args, full, "condition")
    }

    fn parse_body(&mut self, tag: Span) -> LeafResult<Body> {
        if self.lexer.try_body_open().is_none() {
            return Err(self.error("expected `{` to open the tag body", self.span_from(tag)));
        }
        self.nest(tag)?;
        let mut nodes = self.parse_nodes(Some(tag))?;
        self.unnest();
        let block = layout::layout_body(&mut nodes);
        Ok(Body { nodes, block })
    }

    fn parse_conditional(&mut self, span: Span) -> LeafResult<TemplateNode> {
        let condition = self.parse_condition(span)?;
        let body = self.parse_body(span)?;
        let mut branches = vec![(condition, body)];
        let mut else_branch = None;

        while let Some((continuation, at)) = self.lexer.try_continuation() {
            match continuation {
                Continuation::Else => {
                    else_branch = Some(self.parse_body(at)?);
                    break;
                }
                Continuation::ElseIf => {
                    let condition = self.parse_condition(at)?;
                    branches.push((condition, self.parse_body(at)?));
                }
                Continuation::Tag(name) => match name.as_str() {
                    "ifElse" | "elseif" | "elseIf" => {
                        let condition = self.parse_condition(at)?;
                        branches.push((condition, self.parse_body(at)?));
                    }
                    "else" => {
                        let (args, full) = self.parse_args(at)?;
                        if !args.is_empty() {
                            return Err(self.error("`else()` takes no arguments", full));
                        }
                        else_branch = Some(self.parse_body(at)?);
                        break;
                    }
                    other if is_builtin_tag(other) || Function::from_name(other).is_some() => {
                        return Err(self.error(
                            format!("`##{}` cannot continue a conditional", other),
                            at,
                        ));
                    }
                    other => return Err(self.error(format!("unknown tag `{}`", other), at)),
                },
            }
        }

        Ok(TemplateNode::Conditional(Conditional {
            branches,
            else_branch,
            indent: String::new(),
            span: self.span_from(span),
        }))
    }

    fn expect_punct(&mut self, punct: char, tag: Span) -> LeafResult<Span> {
        let token = self.lexer.next_expr()?;
        match token.kind {
            TokenKind::Punct(p) if p == punct => Ok(token.span),
            TokenKind::Eof => Err(self.unterminated_tag()),
            _ => Err(self.error(format!("expected `{}`", punct), tag.to(token.span))),
        }
    }

    fn parse_for(&mut self, span: Span) -> LeafResult<TemplateNode> {
        self.expect_punct('(', span)?;

        let token = self.lexer.next_expr()?;
        let binding = match token.kind {
            TokenKind::Identifier(name) if !KEYWORDS.contains(&name.as_str()) => name,
            TokenKind::Eof => return Err(self.unterminated_tag()),
            _ => return Err(self.error("expected loop variable name", span.to(token.span))),
        };

        let token = self.lexer.next_expr()?;
        if token.kind != TokenKind::Identifier("in".to_string()) {
            return Err(self.error("expected `in` after loop variable", span.to(token.span)));
        }

        let source = self.parse_expr()?;
        self.expect_punct(')', span)?;
        let body = self.parse_body(span)?;

        Ok(TemplateNode::ForLoop(ForLoop {
            binding,
            source,
            body,
            indent: String::new(),
            span: self.span_from(span),
        }))
    }

    fn parse_var(&mut self, span: Span) -> LeafResult<TemplateNode> {
        let (args, full) = self.parse_args(span)?;
        self.reject_body(full)?;
        let [name, value]: [Expr; 2] = args.try_into().map_err(|args: Vec<Expr>| {
            self.error(
                format!("`#var` expects a name and a value, found {} argument(s)", args.len()),
                full,
            )
        })?;
        let name = match name.kind {
            ExprKind::Constant(Value::String(s)) if !s.is_empty() => s,
            ExprKind::Variable(path) => match path.as_slice() {
                [PathSegment::Key(key)] => key.clone(),
                _ => return Err(self.error("`#var` name must be a plain identifier", name.span)),
            },
            _ => return Err(self.error("`#var` name must be an identifier or a string", name.span)),
        };
        Ok(TemplateNode::Var(VarDecl {
            name,
            value,
            span: full,
        }))
    }

    fn parse_embed(&mut self, span: Span) -> LeafResult<TemplateNode> {
        let (args, full) = self.parse_args(span)?;
        let path = self.single_arg(args, full, "template name")?;
        self.reject_body(full)?;
        Ok(TemplateNode::Embed(Embed { path, span: full }))
    }

    fn parse_raw(&mut self, span: Span) -> LeafResult<TemplateNode> {
        let (args, full) = self.parse_args(span)?;
        if !args.is_empty() {
            return Err(self.error("`#raw()` takes no arguments", full));
        }
        if self.lexer.try_body_open().is_none() {
            return Err(self.error("expected `{` to open the tag body", full));
        }
        let (text, terminated) = self.lexer.raw_body();
        if !terminated {
            return Err(self.error("unterminated body; expected `}`", span));
        }
        let (text, block) = layout::layout_raw(text);
        Ok(TemplateNode::Raw(Raw {
            text,
            block,
            indent: String::new(),
            span: self.span_from(span),
        }))
    }

    // Expressions

    fn parse_expr(&mut self) -> LeafResult<Expr> {
        self.parse_binary(1)
    }

    /// Each folded operator adds a level to the tree, so it counts against
    /// the nesting limit until this chain is done.
    fn parse_binary(&mut self, min_precedence: u8) -> LeafResult<Expr> {
        let mut lhs = self.parse_unary()?;
        let mut folded = 0;
        loop {
            let checkpoint = self.lexer.checkpoint();
            let token = self.lexer.next_expr()?;
            let op = match token.kind {
                TokenKind::Operator(op) => binary_op(op),
                _ => None,
            };
            let Some(op) = op.filter(|op| op.precedence() >= min_precedence) else {
                self.lexer.reset(checkpoint);
                self.depth = self.depth.saturating_sub(folded);
                return Ok(lhs);
            };
            self.nest(token.span)?;
            folded += 1;
            let rhs = self.parse_binary(op.precedence() + 1)?;
            let span = lhs.span.to(rhs.span);
            lhs = Expr::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), span);
        }
    }

    fn parse_unary(&mut self) -> LeafResult<Expr> {
        let checkpoint = self.lexer.checkpoint();
        let token = self.lexer.next_expr()?;
        let op = match token.kind {
            TokenKind::Operator(Operator::Not) => UnaryOp::Not,
            TokenKind::Operator(Operator::Minus) => UnaryOp::Negate,
            _ => {
                self.lexer.reset(checkpoint);
                return self.parse_postfix();
            }
        };
        self.nest(token.span)?;
        let operand = self.parse_unary()?;
        self.unnest();
        let span = token.span.to(operand.span);
        Ok(Expr::new(ExprKind::Unary(op, Box::new(operand)), span))
    }

    fn parse_postfix(&mut self) -> LeafResult<Expr> {
        let mut expr = self.parse_primary()?;
        if !matches!(expr.kind, ExprKind::Variable(_)) {
            return Ok(expr);
        }

        loop {
            let checkpoint = self.lexer.checkpoint();
            let token = self.lexer.next_expr()?;
            let (segment, end) = match token.kind {
                TokenKind::Punct('.') => {
                    let field = self.lexer.next_expr()?;
                    match field.kind {
                        TokenKind::Identifier(name) => (PathSegment::Key(name), field.span),
                        _ => {
                            return Err(self.error(
                                "expected field name after `.`",
                                expr.span.to(field.span),
                            ));
                        }
                    }
                }
                TokenKind::Punct('[') => {
                    let segment = self.parse_subscript(expr.span)?;
                    (segment, self.expect_punct(']', expr.span)?)
                }
                _ => {
                    self.lexer.reset(checkpoint);
                    return Ok(expr);
                }
            };
            if let ExprKind::Variable(path) = &mut expr.kind {
                path.push(segment);
            }
            expr.span = expr.span.to(end);
        }
    }

    fn parse_subscript(&mut self, base: Span) -> LeafResult<PathSegment> {
        let token = self.lexer.next_expr()?;
        match token.kind {
            TokenKind::Int(i) => usize::try_from(i)
                .map(PathSegment::Index)
                .map_err(|_| self.error("array index must not be negative", base.to(token.span))),
            TokenKind::StringOpen => {
                let key = self.parse_string(token.span)?;
                match key.kind {
                    ExprKind::Constant(Value::String(s)) => Ok(PathSegment::Key(s)),
                    _ => Err(self.error("subscript key must be a plain string", key.span)),
                }
            }
            TokenKind::Eof => Err(self.unterminated_tag()),
            _ => Err(self.error(
                "expected an index or a quoted key inside `[...]`",
                base.to(token.span),
            )),
        }
    }

    fn parse_primary(&mut self) -> LeafResult<Expr> {
        let token = self.lexer.next_expr()?;
        let span = token.span;
        let constant = |value: Value| Ok(Expr::new(ExprKind::Constant(value), span));
        match token.kind {
            TokenKind::Int(i) => constant(Value::Int(i)),
            TokenKind::Double(d) => constant(Value::Double(d)),
            TokenKind::StringOpen => self.parse_string(span),
            TokenKind::Identifier(name) => match name.as_str() {
                "true" => constant(Value::Bool(true)),
                "false" => constant(Value::Bool(false)),
                "nil" | "null" => constant(Value::Null),
                "in" => Err(self.error("unexpected keyword `in`", span)),
                _ if self.lexer.peek_byte() == Some(b'(') => self.parse_call(name, span),
                _ => Ok(Expr::new(
                    ExprKind::Variable(vec![PathSegment::Key(name)]),
                    span,
                )),
            },
            TokenKind::Punct('(') => {
                self.nest(span)?;
                let inner = self.parse_expr()?;
                let close = self.expect_punct(')', span)?;
                self.unnest();
                Ok(Expr::new(inner.kind, span.to(close)))
            }
            TokenKind::TagOpen {
                name,
                chained: false,
            } => self.parse_inline_tag(name, span),
            TokenKind::TagOpen { chained: true, .. } => Err(self.error(
                "chained tags cannot be used inside an expression",
                span,
            )),
            TokenKind::Eof => Err(self.unterminated_tag()),
            _ => Err(self.error("expected an expression", span)),
        }
    }

    /// Bare function call: `lowercase(name)`.
    fn parse_call(&mut self, name: String, span: Span) -> LeafResult<Expr> {
        let Some(function) = Function::from_name(&name) else {
            return Err(self.error(format!("unknown function `{}`", name), span));
        };
        self.nest(span)?;
        let (args, full) = self.parse_args(span)?;
        self.unnest();
        self.check_arity(function, args.len(), full)?;
        Ok(Expr::new(ExprKind::Call(name, args), full))
    }

    /// A tag used as a value: `#(expr)` or `#function(args)`.
    fn parse_inline_tag(&mut self, name: Option<String>, span: Span) -> LeafResult<Expr> {
        self.open_tag(span)?;
        let (mut args, full) = self.parse_args(span)?;
        match name.as_deref() {
            None => {
                if args.is_empty() {
                    return Err(self.error("empty print tag `#()`", full));
                }
                args = vec![self.single_arg(args, full, "expression")?];
            }
            Some(n) => match Function::from_name(n) {
                Some(function) => self.check_arity(function, args.len(), full)?,
                None if is_builtin_tag(n) => {
                    return Err(self.error(
                        format!("`#{}` cannot be used inside an expression", n),
                        span,
                    ));
                }
                None => return Err(self.error(format!("unknown tag `{}`", n), span)),
            },
        }
        self.close_tag();
        Ok(Expr::new(ExprKind::Tag(TagCall { name, args }), full))
    }

    /// Parse the rest of a string literal after its opening quote.
    fn parse_string(&mut self, open: Span) -> LeafResult<Expr> {
        let mut parts: Vec<StringPart> = Vec::new();
        let close = loop {
            let token = self.lexer.next_string_part();
            match token.kind {
                TokenKind::StringText(text) => match parts.last_mut() {
                    Some(StringPart::Text(previous)) => previous.push_str(&text),
                    _ => parts.push(StringPart::Text(text)),
                },
                TokenKind::TagOpen {
                    name,
                    chained: false,
                } => {
                    self.nest(token.span)?;
                    let expr = self.parse_inline_tag(name, token.span)?;
                    self.unnest();
                    parts.push(StringPart::Expr(expr));
                }
                TokenKind::StringClose => break token.span,
                TokenKind::Eof => return Err(self.error("unterminated string literal", open)),
                _ => return Err(self.error("unexpected token in string literal", token.span)),
            }
        };

        let span = open.to(close);
        let is_plain = parts.iter().all(|part| matches!(part, StringPart::Text(_)));
        if is_plain {
            let text = parts
                .into_iter()
                .map(|part| match part {
                    StringPart::Text(text) => text,
                    StringPart::Expr(_) => String::new(),
                })
                .collect::<String>();
            return Ok(Expr::new(ExprKind::Constant(Value::String(text)), span));
        }
        Ok(Expr::new(ExprKind::Interpolated(parts), span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn parse(source: &str) -> Vec<TemplateNode> {
        Template::compile(source).unwrap().nodes
    }

    fn parse_err(source: &str) -> LeafError {
        Template::compile(source).unwrap_err()
    }

    fn print_expr(node: &TemplateNode) -> &ExprKind {
        match node {
            TemplateNode::Print(print) => &print.expr.kind,
            other => panic!("Expected Print node, got {:?}", other),
        }
    }

    fn var(name: &str) -> ExprKind {
        ExprKind::Variable(vec![PathSegment::Key(name.to_string())])
    }

    fn kind(expr: &Expr) -> &ExprKind {
        &expr.kind
    }

    #[test]
    fn test_parse_literal_only() {
        let nodes = parse("Hello, world!");
        assert_eq!(nodes.len(), 1);
        assert!(matches!(&nodes[0], TemplateNode::Literal(l) if l.text == "Hello, world!"));
    }

    #[test]
    fn test_parse_print() {
        let nodes = parse("Hello, #(name)!");
        assert_eq!(nodes.len(), 3);
        assert_eq!(print_expr(&nodes[1]), &var("name"));
    }

    #[test]
    fn test_parse_constant_and_keywords() {
        let nodes = parse("#(42)#(4.5)#(true)#(nil)");
        assert_eq!(print_expr(&nodes[0]), &ExprKind::Constant(Value::Int(42)));
        assert_eq!(print_expr(&nodes[1]), &ExprKind::Constant(Value::Double(4.5)));
        assert_eq!(print_expr(&nodes[2]), &ExprKind::Constant(Value::Bool(true)));
        assert_eq!(print_expr(&nodes[3]), &ExprKind::Constant(Value::Null));
    }

    #[test]
    fn test_parse_path() {
        let nodes = parse(r#"#(user.tags[0]["first name"])"#);
        assert_eq!(
            print_expr(&nodes[0]),
            &ExprKind::Variable(vec![
                PathSegment::Key("user".to_string()),
                PathSegment::Key("tags".to_string()),
                PathSegment::Index(0),
                PathSegment::Key("first name".to_string()),
            ])
        );
    }

    #[test]
    fn test_parse_precedence() {
        let nodes = parse("#(a || b && c == 1 + 2 * 3)");
        let ExprKind::Binary(BinaryOp::Or, lhs, rhs) = print_expr(&nodes[0]) else {
            panic!("Expected `||` at the root");
        };
        assert_eq!(kind(lhs), &var("a"));
        let ExprKind::Binary(BinaryOp::And, _, rhs) = kind(rhs) else {
            panic!("Expected `&&`");
        };
        let ExprKind::Binary(BinaryOp::Equal, _, rhs) = kind(rhs) else {
            panic!("Expected `==`");
        };
        let ExprKind::Binary(BinaryOp::Add, _, rhs) = kind(rhs) else {
            panic!("Expected `+`");
        };
        assert!(matches!(kind(rhs), ExprKind::Binary(BinaryOp::Multiply, _, _)));
    }

    #[test]
    fn test_parse_left_associative() {
        let nodes = parse("#(10 - 4 - 3)");
        let ExprKind::Binary(BinaryOp::Subtract, lhs, rhs) = print_expr(&nodes[0]) else {
            panic!("Expected subtraction");
        };
        assert!(matches!(kind(lhs), ExprKind::Binary(BinaryOp::Subtract, _, _)));
        assert_eq!(kind(rhs), &ExprKind::Constant(Value::Int(3)));
    }

    #[test]
    fn test_parse_unary_and_grouping() {
        let nodes = parse("#(!(a && b))");
        let ExprKind::Unary(UnaryOp::Not, inner) = print_expr(&nodes[0]) else {
            panic!("Expected `!`");
        };
        assert!(matches!(kind(inner), ExprKind::Binary(BinaryOp::And, _, _)));
    }

    #[test]
    fn test_parse_interpolated_string() {
        let nodes = parse(r#"#("foo: #(foo)")"#);
        let ExprKind::Interpolated(parts) = print_expr(&nodes[0]) else {
            panic!("Expected interpolated string");
        };
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], StringPart::Text("foo: ".to_string()));
        assert!(matches!(&parts[1], StringPart::Expr(e) if matches!(e.kind, ExprKind::Tag(_))));
    }

    #[test]
    fn test_plain_string_is_constant() {
        let nodes = parse(r#"#("plain")"#);
        assert_eq!(
            print_expr(&nodes[0]),
            &ExprKind::Constant(Value::from("plain"))
        );
    }

    #[test]
    fn test_parse_nested_tag() {
        let nodes = parse("#(#(foo))");
        let ExprKind::Tag(TagCall { name: None, args }) = print_expr(&nodes[0]) else {
            panic!("Expected nested tag");
        };
        assert_eq!(kind(&args[0]), &var("foo"));
    }

    #[test]
    fn test_parse_function_forms() {
        let nodes = parse("#uppercase(name) #(lowercase(name)) #(#count(items))");
        assert!(matches!(
            print_expr(&nodes[0]),
            ExprKind::Tag(TagCall { name: Some(n), .. }) if n == "uppercase"
        ));
        let ExprKind::Tag(TagCall { args, .. }) = print_expr(&nodes[2]) else {
            panic!("Expected print tag");
        };
        assert!(matches!(kind(&args[0]), ExprKind::Call(n, _) if n == "lowercase"));
    }

    #[test]
    fn test_parse_conditional_chain() {
        let nodes = parse("#if(a) {A} else if (b) {B} else {C}");
        assert_eq!(nodes.len(), 1);
        let TemplateNode::Conditional(cond) = &nodes[0] else {
            panic!("Expected Conditional");
        };
        assert_eq!(cond.branches.len(), 2);
        assert!(cond.else_branch.is_some());
        assert!(!cond.branches[0].1.block);
    }

    #[test]
    fn test_parse_chained_tags() {
        let nodes = parse("#ifElse(a) {A} ##ifElse(b) {B} ##else() {C}");
        let TemplateNode::Conditional(cond) = &nodes[0] else {
            panic!("Expected Conditional");
        };
        assert_eq!(cond.branches.len(), 2);
        assert!(cond.else_branch.is_some());

        let nodes = parse("#if(a) {A}\n#elseIf(b) {B}\n#else {C}");
        let TemplateNode::Conditional(cond) = &nodes[0] else {
            panic!("Expected Conditional");
        };
        assert_eq!(cond.branches.len(), 2);
        assert!(cond.else_branch.is_some());
    }

    #[test]
    fn test_parse_for_loop() {
        let nodes = parse("#for(item in items) {#(item)}");
        let TemplateNode::ForLoop(for_loop) = &nodes[0] else {
            panic!("Expected ForLoop");
        };
        assert_eq!(for_loop.binding, "item");
        assert_eq!(kind(&for_loop.source), &var("items"));
        assert_eq!(for_loop.body.nodes.len(), 1);
    }

    #[test]
    fn test_parse_var_forms() {
        for source in [r#"#var("foo", "bar")"#, r#"#var(foo, "bar")"#] {
            let nodes = parse(source);
            let TemplateNode::Var(decl) = &nodes[0] else {
                panic!("Expected Var");
            };
            assert_eq!(decl.name, "foo");
        }
    }

    #[test]
    fn test_parse_raw_keeps_text() {
        let nodes = parse("#raw() {#(not parsed) {nested}}");
        let TemplateNode::Raw(raw) = &nodes[0] else {
            panic!("Expected Raw");
        };
        assert_eq!(raw.text, "#(not parsed) {nested}");
        assert!(!raw.block);
    }

    #[test]
    fn test_literal_braces_in_body() {
        let nodes = parse("#if(a) {x { y } z}");
        let TemplateNode::Conditional(cond) = &nodes[0] else {
            panic!("Expected Conditional");
        };
        let body = &cond.branches[0].1.nodes;
        assert!(matches!(&body[0], TemplateNode::Literal(l) if l.text == "x { y } z"));
    }

    #[test]
    fn test_block_indent_recorded() {
        let nodes = parse("<ul>\n    #for(x in xs) {\n        #(x)\n    }\n</ul>");
        let TemplateNode::ForLoop(for_loop) = &nodes[1] else {
            panic!("Expected ForLoop");
        };
        assert_eq!(for_loop.indent, "    ");
        assert!(for_loop.body.block);
    }

    #[test]
    fn test_gap_before_following_tag_dropped() {
        let nodes = parse("#if(a) {x} #if(b) {y}");
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn test_error_empty_condition() {
        let err = parse_err("#if() { }");
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert_eq!(err.message(), "missing condition");
    }

    #[test]
    fn test_error_empty_print() {
        let err = parse_err("#()");
        assert_eq!(err.message(), "empty print tag `#()`");
    }

    #[test]
    fn test_error_unknown_chained_tag() {
        let err = parse_err("Fine\n##bad()\nGood");
        insta::assert_snapshot!(err.to_string(), @"Parse error at 2:1: unknown tag `bad` (in `##bad`)");
    }

    #[test]
    fn test_error_unknown_tag() {
        let err = parse_err("#frobnicate(x)");
        assert_eq!(err.message(), "unknown tag `frobnicate`");
    }

    #[test]
    fn test_parse_unchained_else_tag() {
        let template = Template::compile("#if(false) {a} #else() {b}").unwrap();
        match &template.nodes()[0] {
            TemplateNode::Conditional(conditional) => {
                assert_eq!(conditional.branches.len(), 1);
                assert!(conditional.else_branch.is_some());
            }
            other => panic!("expected a conditional, got {:?}", other),
        }
        assert_eq!(template.nodes().len(), 1);

        let err = parse_err("#if(a) {x} #else(b) {y}");
        assert_eq!(err.message(), "`else()` takes no arguments");
    }

    #[test]
    fn test_error_misplaced_continuation() {
        let err = parse_err("text ##else() {x}");
        assert!(err.message().contains("must follow"));
        let err = parse_err("#elseif(x) {y}");
        assert!(err.message().contains("must follow"));
    }

    #[test]
    fn test_error_unterminated_tag_call() {
        let err = parse_err("Hello #(name");
        assert_eq!(err.message(), "unterminated tag call; expected `)`");
        assert_eq!(err.span().map(|s| s.start.column), Some(6));
    }

    #[test]
    fn test_error_unterminated_body() {
        let err = parse_err("#if(a) {\n  never closed\n");
        assert_eq!(err.message(), "unterminated body; expected `}`");
    }

    #[test]
    fn test_error_unterminated_string() {
        let err = parse_err(r#"#("open)"#);
        assert_eq!(err.message(), "unterminated string literal");
    }

    #[test]
    fn test_error_unterminated_block_comment() {
        let err = parse_err("a #/* never closed");
        assert_eq!(err.message(), "unterminated block comment; expected `*/`");
    }

    #[test]
    fn test_error_missing_body() {
        let err = parse_err("#if(a) no body");
        assert_eq!(err.message(), "expected `{` to open the tag body");
    }

    #[test]
    fn test_error_body_on_print() {
        let err = parse_err("#(a){b}");
        assert_eq!(err.message(), "this tag does not take a body");
    }

    #[test]
    fn test_error_wrong_arity() {
        let err = parse_err("#contains(items)");
        assert_eq!(err.message(), "`contains` expects 2 argument(s), found 1");
        let err = parse_err(r#"#var("x")"#);
        assert!(err.message().starts_with("`#var` expects a name and a value"));
    }

    #[test]
    fn test_error_lex_in_expression() {
        let err = parse_err("#(a = b)");
        assert_eq!(err.kind(), ErrorKind::Lex);
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}x{}", "#(".repeat(10), ")".repeat(10));
        assert!(Template::compile_with_depth(&deep, 16).is_ok());
        let err = Template::compile_with_depth(&deep, 5).unwrap_err();
        assert!(err.message().starts_with("nesting too deep"));
    }

    #[test]
    fn test_long_operator_chain_hits_nesting_limit() {
        let short = format!("#({})", ["1"; 20].join(" + "));
        assert_eq!(Template::compile(&short).unwrap().nodes().len(), 1);

        let long = format!("#({})", ["1"; 100_000].join(" + "));
        let err = Template::compile(&long).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.message().starts_with("nesting too deep"));

        // Sibling chains release their depth once they close.
        let siblings = format!("#({}) #({})", ["1"; 40].join(" + "), ["1"; 40].join(" + "));
        assert!(Template::compile(&siblings).is_ok());
    }

    #[test]
    fn test_template_accessors() {
        let template = Template::compile("Hi #(name)").unwrap().with_name("greeting");
        assert_eq!(template.name(), Some("greeting"));
        assert_eq!(template.source(), "Hi #(name)");
        assert_eq!(template.nodes().len(), 2);
    }
}
