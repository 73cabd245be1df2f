/*
 * context.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Render-time data: the caller's [`Context`] and the [`Scope`] stack.
//!
//! A `Context` is supplied by the caller and is only ever read during a
//! render. Bindings introduced by the template itself (`#var`, loop items,
//! loop metadata) live in the frames of a `Scope` owned by that render.

use crate::ast::PathSegment;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Top-level variables for a render.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    variables: BTreeMap<String, Value>,
}

impl Context {
    /// Create a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a variable into the context.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(key.into(), value.into());
    }

    /// Builder form of [`Context::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    /// Get a variable by path (e.g., `employee.salary`).
    pub fn get_path(&self, path: &[PathSegment]) -> Option<&Value> {
        let (PathSegment::Key(first), rest) = path.split_first()? else {
            return None;
        };
        self.get(first)?.get_path(rest)
    }

    /// Parse a JSON object into a context.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

impl From<BTreeMap<String, Value>> for Context {
    fn from(variables: BTreeMap<String, Value>) -> Self {
        Self { variables }
    }
}

impl TryFrom<Value> for Context {
    /// Non-dictionary values are handed back unchanged.
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Dictionary(variables) => Ok(Self { variables }),
            other => Err(other),
        }
    }
}

/// Stack of binding frames layered over a base [`Context`].
///
/// Lookups search the innermost frame first and fall back to the base
/// context. The stack always has at least one frame, which holds top-level
/// `#var` bindings.
#[derive(Debug)]
pub struct Scope<'a> {
    base: &'a Context,
    frames: Vec<HashMap<String, Value>>,
}

impl<'a> Scope<'a> {
    pub fn new(base: &'a Context) -> Self {
        Self {
            base,
            frames: vec![HashMap::new()],
        }
    }

    /// Open a new innermost frame.
    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// Discard the innermost frame and everything bound in it.
    ///
    /// The root frame is never popped.
    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Number of open frames, including the root frame.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Bind `name` in the innermost frame, shadowing outer bindings.
    pub fn declare(&mut self, name: impl Into<String>, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), value);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .or_else(|| self.base.get(name))
    }

    /// Resolve a variable path such as `user.tags[0]`.
    pub fn resolve(&self, path: &[PathSegment]) -> Option<&Value> {
        let (PathSegment::Key(first), rest) = path.split_first()? else {
            return None;
        };
        self.lookup(first)?.get_path(rest)
    }
}
