/*
 * layout.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Whitespace handling for tag bodies.
//!
//! A body whose `{` ends its line is a *block* body. For block bodies the
//! parser removes the rest of the opening line, removes the line holding the
//! closing `}` when nothing but whitespace precedes it, and dedents what is
//! left by its common indentation. Block tags also remember the indentation
//! of the line they start on so the evaluator can nest their output there.

use crate::ast::{Literal, TemplateNode};

fn is_horizontal_space(c: char) -> bool {
    c == ' ' || c == '\t'
}

fn leading_space(line: &str) -> usize {
    line.len() - line.trim_start_matches(is_horizontal_space).len()
}

fn is_blank(line: &str) -> bool {
    line.chars().all(|c| is_horizontal_space(c) || c == '\r')
}

/// Lay out a parsed body in place. Returns whether it is a block body.
pub(crate) fn layout_body(nodes: &mut Vec<TemplateNode>) -> bool {
    let block = strip_opening_line(nodes);
    if block {
        strip_closing_line(nodes);
        dedent(nodes);
        nodes.retain(|node| !matches!(node, TemplateNode::Literal(l) if l.text.is_empty()));
    }
    assign_indents(nodes);
    block
}

/// Lay out the text of a `#raw` body. Returns the text and whether it is a
/// block body.
pub(crate) fn layout_raw(text: String) -> (String, bool) {
    let mut nodes = vec![TemplateNode::Literal(Literal {
        text,
        span: Default::default(),
    })];
    let block = strip_opening_line(&mut nodes);
    if block {
        strip_closing_line(&mut nodes);
        dedent(&mut nodes);
    }
    match nodes.pop() {
        Some(TemplateNode::Literal(literal)) => (literal.text, block),
        _ => (String::new(), block),
    }
}

fn strip_opening_line(nodes: &mut [TemplateNode]) -> bool {
    let Some(TemplateNode::Literal(first)) = nodes.first_mut() else {
        return false;
    };
    match first.text.find('\n') {
        Some(newline) if is_blank(&first.text[..newline]) => {
            first.text.drain(..=newline);
            true
        }
        _ => false,
    }
}

fn strip_closing_line(nodes: &mut [TemplateNode]) {
    let Some(TemplateNode::Literal(last)) = nodes.last_mut() else {
        return;
    };
    if let Some(newline) = last.text.rfind('\n') {
        if is_blank(&last.text[newline + 1..]) {
            last.text.truncate(newline);
            if last.text.ends_with('\r') {
                last.text.pop();
            }
        }
    }
}

fn is_line_comment(node: Option<&TemplateNode>) -> bool {
    matches!(node, Some(TemplateNode::Comment(comment)) if comment.line)
}

/// Walk every line-start segment of the body's literals.
///
/// The callback receives the node index, the segment index within the
/// literal's `split('\n')`, and the segment's indentation (`None` for a
/// blank line). A `#//` comment ends its line, so whitespace before it
/// counts as a blank line and the text after it starts a new one.
fn for_each_line_start(nodes: &[TemplateNode], mut f: impl FnMut(usize, usize, Option<usize>)) {
    let mut at_line_start = true;
    for (i, node) in nodes.iter().enumerate() {
        let TemplateNode::Literal(literal) = node else {
            if is_line_comment(Some(node)) {
                at_line_start = true;
                continue;
            }
            if at_line_start {
                f(i, 0, Some(0));
            }
            at_line_start = false;
            continue;
        };
        let is_last_node = i + 1 == nodes.len() || is_line_comment(nodes.get(i + 1));
        let segments: Vec<&str> = literal.text.split('\n').collect();
        for (j, segment) in segments.iter().enumerate() {
            if j == 0 && !at_line_start {
                continue;
            }
            let ends_line = j + 1 < segments.len() || is_last_node;
            if ends_line && is_blank(segment) {
                f(i, j, None);
            } else {
                f(i, j, Some(leading_space(segment)));
            }
        }
        if !literal.text.is_empty() {
            at_line_start = literal.text.ends_with('\n');
        }
    }
}

fn dedent(nodes: &mut [TemplateNode]) {
    let mut common: Option<usize> = None;
    let mut edits: Vec<(usize, usize, Option<usize>)> = Vec::new();
    for_each_line_start(nodes, |i, j, indent| {
        if let Some(indent) = indent {
            common = Some(common.map_or(indent, |c| c.min(indent)));
        }
        edits.push((i, j, indent));
    });
    let common = common.unwrap_or(0);

    for (i, node) in nodes.iter_mut().enumerate() {
        let TemplateNode::Literal(literal) = node else {
            continue;
        };
        let mine: Vec<(usize, Option<usize>)> = edits
            .iter()
            .filter(|(n, _, _)| *n == i)
            .map(|(_, j, indent)| (*j, *indent))
            .collect();
        if mine.is_empty() {
            continue;
        }
        let text = {
            let lines: Vec<&str> = literal
                .text
                .split('\n')
                .enumerate()
                .map(|(j, segment)| match mine.iter().find(|(k, _)| *k == j) {
                    Some((_, None)) => "",
                    Some((_, Some(_))) => &segment[leading_space(segment).min(common)..],
                    None => segment,
                })
                .collect();
            lines.join("\n")
        };
        literal.text = text;
    }
}

/// Indentation of the line a node starts on, if only whitespace precedes it.
fn line_indent(before: &[TemplateNode]) -> String {
    let Some(TemplateNode::Literal(previous)) = before.last() else {
        return String::new();
    };
    let line = match previous.text.rfind('\n') {
        Some(newline) => &previous.text[newline + 1..],
        None if before.len() == 1 || is_line_comment(before.iter().rev().nth(1)) => {
            previous.text.as_str()
        }
        None => return String::new(),
    };
    if line.chars().all(is_horizontal_space) {
        line.to_string()
    } else {
        String::new()
    }
}

pub(crate) fn assign_indents(nodes: &mut [TemplateNode]) {
    for i in 0..nodes.len() {
        if nodes[i].indent_mut().is_none() {
            continue;
        }
        let indent = line_indent(&nodes[..i]);
        if let Some(slot) = nodes[i].indent_mut() {
            *slot = indent;
        }
    }
}
