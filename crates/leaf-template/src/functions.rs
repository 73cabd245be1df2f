/*
 * functions.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Built-in functions.
//!
//! Functions can be used as print tags (`#lowercase(name)`), as nested tags
//! inside expressions (`#if(#isEmpty(items))`) or as bare calls
//! (`#if(contains(tags, "rust"))`).

use crate::error::{LeafError, LeafResult};
use crate::source::Span;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Lowercase,
    Uppercase,
    Capitalize,
    Count,
    Contains,
    IsEmpty,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "lowercase" => Some(Function::Lowercase),
            "uppercase" => Some(Function::Uppercase),
            "capitalize" => Some(Function::Capitalize),
            "count" => Some(Function::Count),
            "contains" => Some(Function::Contains),
            "isEmpty" => Some(Function::IsEmpty),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Lowercase => "lowercase",
            Function::Uppercase => "uppercase",
            Function::Capitalize => "capitalize",
            Function::Count => "count",
            Function::Contains => "contains",
            Function::IsEmpty => "isEmpty",
        }
    }

    /// Number of arguments the function takes.
    pub fn arity(self) -> usize {
        match self {
            Function::Contains => 2,
            _ => 1,
        }
    }

    pub fn call(self, args: &[Value], span: Span) -> LeafResult<Value> {
        match (self, args) {
            (Function::Lowercase, [value]) => self.map_text(value, span, |s| s.to_lowercase()),
            (Function::Uppercase, [value]) => self.map_text(value, span, |s| s.to_uppercase()),
            (Function::Capitalize, [value]) => self.map_text(value, span, capitalize),
            (Function::Count, [value]) => match value {
                Value::Array(items) => Ok(Value::from(items.len())),
                Value::Dictionary(map) => Ok(Value::from(map.len())),
                Value::String(s) => Ok(Value::from(s.chars().count())),
                other => Err(self.type_error("a collection or string", other, span)),
            },
            (Function::Contains, [collection, item]) => match (collection, item) {
                (Value::Array(items), _) => Ok(Value::Bool(items.iter().any(|v| v.loose_eq(item)))),
                (Value::Dictionary(map), Value::String(key)) => Ok(Value::Bool(map.contains_key(key))),
                (Value::String(s), Value::String(needle)) => Ok(Value::Bool(s.contains(needle.as_str()))),
                (other, _) => Err(self.type_error("a collection or string", other, span)),
            },
            (Function::IsEmpty, [value]) => match value {
                Value::Null => Ok(Value::Bool(true)),
                Value::Array(items) => Ok(Value::Bool(items.is_empty())),
                Value::Dictionary(map) => Ok(Value::Bool(map.is_empty())),
                Value::String(s) => Ok(Value::Bool(s.is_empty())),
                other => Err(self.type_error("a collection or string", other, span)),
            },
            _ => Err(LeafError::evaluation(
                format!(
                    "`{}` expects {} argument(s), found {}",
                    self.name(),
                    self.arity(),
                    args.len()
                ),
                span,
            )),
        }
    }

    /// Apply a string transform. Null stays null; other scalars use their
    /// printed form.
    fn map_text(
        self,
        value: &Value,
        span: Span,
        f: impl FnOnce(&str) -> String,
    ) -> LeafResult<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            other => match other.to_text() {
                Some(text) => Ok(Value::String(f(&text))),
                None => Err(self.type_error("a string", other, span)),
            },
        }
    }

    fn type_error(self, expected: &str, found: &Value, span: Span) -> LeafError {
        LeafError::evaluation(
            format!(
                "`{}` expects {}, found {}",
                self.name(),
                expected,
                found.type_name()
            ),
            span,
        )
    }
}

/// Uppercase the first letter of every word and lowercase the rest.
fn capitalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut word_start = true;
    for c in s.chars() {
        if c.is_whitespace() {
            word_start = true;
            out.push(c);
        } else if word_start {
            word_start = false;
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn call(f: Function, args: &[Value]) -> LeafResult<Value> {
        f.call(args, Span::default())
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Function::from_name("isEmpty"), Some(Function::IsEmpty));
        assert_eq!(Function::from_name("isempty"), None);
        assert_eq!(Function::from_name("if"), None);
    }

    #[test]
    fn test_case_functions() {
        assert_eq!(
            call(Function::Uppercase, &[Value::from("leaf")]).unwrap(),
            Value::from("LEAF")
        );
        assert_eq!(
            call(Function::Lowercase, &[Value::from("LeAf")]).unwrap(),
            Value::from("leaf")
        );
        assert_eq!(
            call(Function::Capitalize, &[Value::from("hello wORLD")]).unwrap(),
            Value::from("Hello World")
        );
        assert_eq!(call(Function::Uppercase, &[Value::Null]).unwrap(), Value::Null);
        assert_eq!(
            call(Function::Uppercase, &[Value::Int(4)]).unwrap(),
            Value::from("4")
        );
        assert!(call(Function::Lowercase, &[Value::Array(vec![])]).is_err());
    }

    #[test]
    fn test_count() {
        assert_eq!(
            call(Function::Count, &[Value::from(vec![1, 2, 3])]).unwrap(),
            Value::Int(3)
        );
        assert_eq!(call(Function::Count, &[Value::from("héllo")]).unwrap(), Value::Int(5));
        let err = call(Function::Count, &[Value::Bool(true)]).unwrap_err();
        assert_eq!(err.message(), "`count` expects a collection or string, found bool");
    }

    #[test]
    fn test_contains() {
        let tags = Value::from(vec!["rust", "leaf"]);
        assert_eq!(
            call(Function::Contains, &[tags.clone(), Value::from("leaf")]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            call(Function::Contains, &[tags, Value::from("go")]).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            call(Function::Contains, &[Value::from(vec![1, 2]), Value::Double(2.0)]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            call(Function::Contains, &[Value::from("template"), Value::from("plat")]).unwrap(),
            Value::Bool(true)
        );

        let mut map = BTreeMap::new();
        map.insert("key".to_string(), Value::Null);
        assert_eq!(
            call(Function::Contains, &[Value::Dictionary(map), Value::from("key")]).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_is_empty() {
        assert_eq!(call(Function::IsEmpty, &[Value::Null]).unwrap(), Value::Bool(true));
        assert_eq!(
            call(Function::IsEmpty, &[Value::Array(vec![])]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(call(Function::IsEmpty, &[Value::from("x")]).unwrap(), Value::Bool(false));
        assert!(call(Function::IsEmpty, &[Value::Int(0)]).is_err());
    }

    #[test]
    fn test_wrong_argument_count() {
        let err = call(Function::Contains, &[Value::Null]).unwrap_err();
        assert_eq!(err.message(), "`contains` expects 2 argument(s), found 1");
    }
}
