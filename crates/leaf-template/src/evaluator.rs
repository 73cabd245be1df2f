/*
 * evaluator.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template evaluation engine.
//!
//! This module walks a parsed template against an [`EvalContext`] and produces
//! a [`Doc`] tree that is rendered to a string at the end.

use crate::ast::{
    BinaryOp, Body, Conditional, Embed, Expr, ExprKind, ForLoop, Literal, Print, Raw, StringPart,
    TagCall, TemplateNode, UnaryOp, VarDecl, path_to_string,
};
use crate::context::Context;
use crate::doc::{Doc, concat_docs, intersperse_docs};
use crate::error::{LeafError, LeafResult};
use crate::eval_context::EvalContext;
use crate::functions::Function;
use crate::parser::Template;
use crate::source::Span;
use crate::value::Value;
use std::collections::BTreeMap;

impl Template {
    /// Render this template with the given context.
    ///
    /// `#embed` is unavailable here; use [`crate::Renderer`] for templates
    /// that include others.
    pub fn render(&self, context: &Context) -> LeafResult<String> {
        let mut ctx = EvalContext::new(context);
        Ok(self.evaluate(&mut ctx)?.render())
    }

    /// Evaluate this template to a Doc tree.
    pub fn evaluate(&self, ctx: &mut EvalContext<'_>) -> LeafResult<Doc> {
        evaluate(&self.nodes, ctx)
    }
}

/// Evaluate a list of template nodes to a Doc.
pub fn evaluate(nodes: &[TemplateNode], ctx: &mut EvalContext<'_>) -> LeafResult<Doc> {
    let mut docs = Vec::with_capacity(nodes.len());
    for node in nodes {
        docs.push(evaluate_node(node, ctx)?);
    }
    Ok(concat_docs(docs))
}

fn evaluate_node(node: &TemplateNode, ctx: &mut EvalContext<'_>) -> LeafResult<Doc> {
    match node {
        TemplateNode::Literal(Literal { text, .. }) => Ok(Doc::text(text)),

        TemplateNode::Print(Print { expr, span }) => {
            let value = evaluate_expr(expr, ctx)?;
            Ok(Doc::text(print_value(&value, *span)?))
        }

        TemplateNode::Conditional(conditional) => evaluate_conditional(conditional, ctx),

        TemplateNode::ForLoop(for_loop) => evaluate_for_loop(for_loop, ctx),

        TemplateNode::Var(VarDecl { name, value, .. }) => {
            let value = evaluate_expr(value, ctx)?;
            ctx.scope.declare(name.clone(), value);
            Ok(Doc::Empty)
        }

        TemplateNode::Embed(embed) => evaluate_embed(embed, ctx),

        TemplateNode::Raw(Raw {
            text,
            block,
            indent,
            ..
        }) => {
            let doc = Doc::text(text);
            Ok(if *block { Doc::prefixed(indent, doc) } else { doc })
        }

        // Comments produce no output
        TemplateNode::Comment(_) => Ok(Doc::Empty),
    }
}

/// Text form of a printed value. Collections cannot be printed.
fn print_value(value: &Value, span: Span) -> LeafResult<String> {
    value.to_text().ok_or_else(|| {
        LeafError::evaluation(
            format!(
                "cannot print a value of type {}; loop over it or use `#count`",
                value.type_name()
            ),
            span,
        )
    })
}

/// Evaluate a body inside its own scope frame.
fn evaluate_body(body: &Body, indent: &str, ctx: &mut EvalContext<'_>) -> LeafResult<Doc> {
    ctx.scope.push();
    let result = evaluate(&body.nodes, ctx);
    ctx.scope.pop();
    let doc = result?;
    Ok(if body.block { Doc::prefixed(indent, doc) } else { doc })
}

fn evaluate_conditional(
    conditional: &Conditional,
    ctx: &mut EvalContext<'_>,
) -> LeafResult<Doc> {
    for (condition, body) in &conditional.branches {
        if evaluate_expr(condition, ctx)?.is_truthy() {
            return evaluate_body(body, &conditional.indent, ctx);
        }
    }
    match &conditional.else_branch {
        Some(body) => evaluate_body(body, &conditional.indent, ctx),
        None => Ok(Doc::Empty),
    }
}

fn evaluate_for_loop(for_loop: &ForLoop, ctx: &mut EvalContext<'_>) -> LeafResult<Doc> {
    let items: Vec<(Option<String>, Value)> = match evaluate_expr(&for_loop.source, ctx)? {
        Value::Array(items) => items.into_iter().map(|item| (None, item)).collect(),
        Value::Dictionary(map) => map.into_iter().map(|(k, v)| (Some(k), v)).collect(),
        other => {
            return Err(LeafError::evaluation(
                format!(
                    "`#for` expects an array or dictionary, found {}",
                    other.type_name()
                ),
                for_loop.source.span,
            ));
        }
    };

    let count = items.len();
    let mut docs = Vec::with_capacity(count);
    for (index, (key, item)) in items.into_iter().enumerate() {
        let mut meta = BTreeMap::new();
        meta.insert("index".to_string(), Value::from(index));
        meta.insert("isFirst".to_string(), Value::Bool(index == 0));
        meta.insert("isLast".to_string(), Value::Bool(index + 1 == count));
        meta.insert("count".to_string(), Value::from(count));
        if let Some(key) = key {
            meta.insert("key".to_string(), Value::String(key));
        }

        ctx.scope.push();
        ctx.scope.declare(for_loop.binding.clone(), item);
        ctx.scope.declare("loop", Value::Dictionary(meta));
        let result = evaluate(&for_loop.body.nodes, ctx);
        ctx.scope.pop();
        docs.push(result?);
    }

    if for_loop.body.block {
        let joined = intersperse_docs(docs, Doc::newline());
        Ok(Doc::prefixed(&for_loop.indent, joined))
    } else {
        Ok(concat_docs(docs))
    }
}

fn evaluate_embed(embed: &Embed, ctx: &mut EvalContext<'_>) -> LeafResult<Doc> {
    let name = match evaluate_expr(&embed.path, ctx)? {
        Value::String(name) => name,
        other => {
            return Err(LeafError::evaluation(
                format!("`#embed` expects a template name string, found {}", other.type_name()),
                embed.path.span,
            ));
        }
    };

    if ctx.embed_depth() >= ctx.max_embed_depth {
        return Err(LeafError::RecursiveEmbed {
            name,
            max_depth: ctx.max_embed_depth,
        });
    }

    tracing::debug!(template = %name, depth = ctx.embed_depth() + 1, "embedding template");
    let loaded = match ctx.embeds {
        Some(source) => source.load_embed(&name),
        None => Err(LeafError::TemplateNotFound { name: name.clone() }),
    };

    ctx.embed_stack.push(name);
    let result = match loaded {
        Ok(template) => {
            ctx.scope.push();
            let result = template.evaluate(ctx);
            ctx.scope.pop();
            result
        }
        Err(err) => Err(err),
    };
    let chain = ctx.embed_stack.clone();
    ctx.embed_stack.pop();

    result.map_err(|err| match err {
        LeafError::Embed { .. } => err,
        other => LeafError::Embed {
            chain,
            source: Box::new(other),
        },
    })
}

/// Evaluate an expression to a value.
pub fn evaluate_expr(expr: &Expr, ctx: &mut EvalContext<'_>) -> LeafResult<Value> {
    match &expr.kind {
        ExprKind::Constant(value) => Ok(value.clone()),

        ExprKind::Variable(path) => match ctx.scope.resolve(path) {
            Some(value) => Ok(value.clone()),
            None if ctx.strict_mode => Err(LeafError::evaluation(
                format!("undefined variable `{}`", path_to_string(path)),
                expr.span,
            )),
            None => {
                tracing::trace!(variable = %path_to_string(path), "unresolved variable is null");
                Ok(Value::Null)
            }
        },

        ExprKind::Interpolated(parts) => {
            let mut out = String::new();
            for part in parts {
                match part {
                    StringPart::Text(text) => out.push_str(text),
                    StringPart::Expr(inner) => {
                        let value = evaluate_expr(inner, ctx)?;
                        out.push_str(&print_value(&value, inner.span)?);
                    }
                }
            }
            Ok(Value::String(out))
        }

        ExprKind::Unary(op, operand) => {
            let value = evaluate_expr(operand, ctx)?;
            evaluate_unary(*op, value, expr.span)
        }

        ExprKind::Binary(BinaryOp::And, lhs, rhs) => {
            if !evaluate_expr(lhs, ctx)?.is_truthy() {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(evaluate_expr(rhs, ctx)?.is_truthy()))
        }

        ExprKind::Binary(BinaryOp::Or, lhs, rhs) => {
            if evaluate_expr(lhs, ctx)?.is_truthy() {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(evaluate_expr(rhs, ctx)?.is_truthy()))
        }

        ExprKind::Binary(op, lhs, rhs) => {
            let lhs = evaluate_expr(lhs, ctx)?;
            let rhs = evaluate_expr(rhs, ctx)?;
            evaluate_binary(*op, lhs, rhs, expr.span)
        }

        ExprKind::Tag(TagCall { name: None, args }) => match args.as_slice() {
            [inner] => evaluate_expr(inner, ctx),
            _ => Err(LeafError::evaluation(
                "print tag takes a single expression",
                expr.span,
            )),
        },

        ExprKind::Tag(TagCall {
            name: Some(name),
            args,
        })
        | ExprKind::Call(name, args) => {
            let Some(function) = Function::from_name(name) else {
                return Err(LeafError::evaluation(
                    format!("unknown function `{}`", name),
                    expr.span,
                ));
            };
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(evaluate_expr(arg, ctx)?);
            }
            function.call(&values, expr.span)
        }
    }
}

fn evaluate_unary(op: UnaryOp, value: Value, span: Span) -> LeafResult<Value> {
    match (op, value) {
        (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
        (UnaryOp::Negate, Value::Int(i)) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| LeafError::evaluation("integer overflow in negation", span)),
        (UnaryOp::Negate, Value::Double(d)) => Ok(Value::Double(-d)),
        (UnaryOp::Negate, other) => Err(LeafError::evaluation(
            format!("cannot negate a value of type {}", other.type_name()),
            span,
        )),
    }
}

fn evaluate_binary(op: BinaryOp, lhs: Value, rhs: Value, span: Span) -> LeafResult<Value> {
    match op {
        BinaryOp::Equal => Ok(Value::Bool(lhs.loose_eq(&rhs))),
        BinaryOp::NotEqual => Ok(Value::Bool(!lhs.loose_eq(&rhs))),
        BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
            let Some(ordering) = lhs.compare(&rhs) else {
                return Err(type_mismatch(op, &lhs, &rhs, span));
            };
            Ok(Value::Bool(match op {
                BinaryOp::Less => ordering.is_lt(),
                BinaryOp::LessEqual => ordering.is_le(),
                BinaryOp::Greater => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinaryOp::Add if matches!(lhs, Value::String(_)) || matches!(rhs, Value::String(_)) => {
            let mut text = print_value(&lhs, span)?;
            text.push_str(&print_value(&rhs, span)?);
            Ok(Value::String(text))
        }
        _ => arithmetic(op, lhs, rhs, span),
    }
}

fn arithmetic(op: BinaryOp, lhs: Value, rhs: Value, span: Span) -> LeafResult<Value> {
    let zero_divisor = matches!(op, BinaryOp::Divide | BinaryOp::Modulo)
        && rhs.as_f64().is_some_and(|d| d == 0.0);
    if zero_divisor {
        return Err(LeafError::evaluation("division by zero", span));
    }

    match (&lhs, &rhs) {
        (Value::Int(a), Value::Int(b)) => {
            let result = match op {
                BinaryOp::Add => a.checked_add(*b),
                BinaryOp::Subtract => a.checked_sub(*b),
                BinaryOp::Multiply => a.checked_mul(*b),
                BinaryOp::Divide => a.checked_div(*b),
                BinaryOp::Modulo => a.checked_rem(*b),
                _ => return Err(type_mismatch(op, &lhs, &rhs, span)),
            };
            result.map(Value::Int).ok_or_else(|| {
                LeafError::evaluation(format!("integer overflow in `{}`", op.symbol()), span)
            })
        }
        _ => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => Ok(Value::Double(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Subtract => a - b,
                BinaryOp::Multiply => a * b,
                BinaryOp::Divide => a / b,
                BinaryOp::Modulo => a % b,
                _ => return Err(type_mismatch(op, &lhs, &rhs, span)),
            })),
            _ => Err(type_mismatch(op, &lhs, &rhs, span)),
        },
    }
}

fn type_mismatch(op: BinaryOp, lhs: &Value, rhs: &Value, span: Span) -> LeafError {
    LeafError::evaluation(
        format!(
            "cannot apply `{}` to {} and {}",
            op.symbol(),
            lhs.type_name(),
            rhs.type_name()
        ),
        span,
    )
}
