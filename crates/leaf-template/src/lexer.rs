/*
 * lexer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template tokenizer.
//!
//! The lexer is driven by the parser and has three modes:
//!
//! - **template mode** ([`Lexer::next_template`]): literal text, tag opens,
//!   comments and body-closing braces;
//! - **expression mode** ([`Lexer::next_expr`]): identifiers, numbers,
//!   operators and punctuation inside `( ... )`;
//! - **string mode** ([`Lexer::next_string_part`]): the inside of a quoted
//!   string, which yields a [`TokenKind::TagOpen`] when it meets `#(` so the
//!   parser can parse the interpolated tag and then resume the string.
//!
//! The lexer is permissive: a `#` that does not open a tag is plain text, and
//! unterminated constructs are reported by the parser. Only an unexpected
//! byte inside an expression is a lex error.

use crate::error::{LeafError, LeafResult};
use crate::source::{SourceIndex, Span};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Literal text between tags.
    Text(String),
    /// `#name(`, `#(` or `##name(`. The `(` itself is left for the parser.
    TagOpen { name: Option<String>, chained: bool },
    /// `#// ...` (through its newline, `line` set) or `#/* ... */`.
    Comment {
        text: String,
        terminated: bool,
        line: bool,
    },
    /// `}` seen in template mode inside a body.
    BodyClose,
    Identifier(String),
    Int(i64),
    Double(f64),
    Operator(Operator),
    Punct(char),
    /// Opening `"` of a string literal.
    StringOpen,
    /// A run of string text, escapes already applied.
    StringText(String),
    /// Closing `"` of a string literal.
    StringClose,
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
    Not,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// What follows a closing `}` that continues a conditional chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Continuation {
    /// `else {` or `#else {`
    Else,
    /// `else if (`
    ElseIf,
    /// `##name(`, `#elseif(` or `#else(`; the `(` is left for the parser.
    Tag(String),
}

/// Bytes allowed in tag names and identifiers.
pub fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':'
}

fn is_identifier_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_horizontal_space(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

pub struct Lexer<'a> {
    index: SourceIndex<'a>,
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            index: SourceIndex::new(source),
            source,
            bytes: source.as_bytes(),
            pos: 0,
        }
    }

    pub fn index(&self) -> &SourceIndex<'a> {
        &self.index
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Current byte position, usable with [`Lexer::reset`] for lookahead.
    pub fn checkpoint(&self) -> usize {
        self.pos
    }

    pub fn reset(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn span(&self, start: usize, end: usize) -> Span {
        self.index.span(start, end)
    }

    /// The next byte, without skipping whitespace.
    pub fn peek_byte(&self) -> Option<u8> {
        self.byte_at(self.pos)
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            span: self.span(start, self.pos),
        }
    }

    fn byte_at(&self, pos: usize) -> Option<u8> {
        self.bytes.get(pos).copied()
    }

    fn starts_with_at(&self, pos: usize, pattern: &str) -> bool {
        self.bytes
            .get(pos..)
            .is_some_and(|rest| rest.starts_with(pattern.as_bytes()))
    }

    fn identifier_end(&self, start: usize) -> usize {
        let mut end = start;
        while self.byte_at(end).is_some_and(is_identifier_byte) {
            end += 1;
        }
        end
    }

    /// Recognize a tag open at `pos`: returns the position of its `(`, the
    /// tag name and whether it used the chained `##` sigil.
    fn tag_open_at(&self, pos: usize) -> Option<(usize, Option<String>, bool)> {
        if self.byte_at(pos) != Some(b'#') {
            return None;
        }
        let chained = self.byte_at(pos + 1) == Some(b'#');
        let name_start = if chained { pos + 2 } else { pos + 1 };
        match self.byte_at(name_start)? {
            b'(' => Some((name_start, None, chained)),
            b if is_identifier_start(b) => {
                let name_end = self.identifier_end(name_start);
                if self.byte_at(name_end) == Some(b'(') {
                    let name = self.source[name_start..name_end].to_string();
                    Some((name_end, Some(name), chained))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn comment_at(&self, pos: usize) -> bool {
        self.starts_with_at(pos, "#//") || self.starts_with_at(pos, "#/*")
    }

    fn directive_at(&self, pos: usize) -> bool {
        self.comment_at(pos) || self.tag_open_at(pos).is_some()
    }

    /// Next token in template mode.
    ///
    /// `in_body` makes `}` a [`TokenKind::BodyClose`] instead of text.
    pub fn next_template(&mut self, in_body: bool) -> Token {
        let start = self.pos;
        let Some(first) = self.byte_at(start) else {
            return self.token(TokenKind::Eof, start);
        };

        if first == b'#' {
            if self.starts_with_at(start, "#//") {
                let line_end = self.source[start..]
                    .find('\n')
                    .map_or(self.source.len(), |i| start + i);
                let text = self.source[start + 3..line_end].to_string();
                self.pos = (line_end + 1).min(self.source.len());
                return self.token(
                    TokenKind::Comment {
                        text,
                        terminated: true,
                        line: true,
                    },
                    start,
                );
            }
            if self.starts_with_at(start, "#/*") {
                let (text_end, end, terminated) = match self.source[start + 3..].find("*/") {
                    Some(i) => (start + 3 + i, start + 3 + i + 2, true),
                    None => (self.source.len(), self.source.len(), false),
                };
                let text = self.source[start + 3..text_end].to_string();
                self.pos = end;
                return self.token(
                    TokenKind::Comment {
                        text,
                        terminated,
                        line: false,
                    },
                    start,
                );
            }
            if let Some((paren, name, chained)) = self.tag_open_at(start) {
                self.pos = paren;
                return self.token(TokenKind::TagOpen { name, chained }, start);
            }
        }

        if in_body && first == b'}' {
            self.pos = start + 1;
            return self.token(TokenKind::BodyClose, start);
        }

        // Text run; the first byte is always part of it.
        let mut end = start + 1;
        while let Some(b) = self.byte_at(end) {
            if (b == b'#' && self.directive_at(end)) || (in_body && b == b'}') {
                break;
            }
            end += 1;
        }
        self.pos = end;
        self.token(TokenKind::Text(self.source[start..end].to_string()), start)
    }

    /// Next token in expression mode, skipping leading whitespace.
    pub fn next_expr(&mut self) -> LeafResult<Token> {
        while self.byte_at(self.pos).is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
        let start = self.pos;
        let Some(first) = self.byte_at(start) else {
            return Ok(self.token(TokenKind::Eof, start));
        };

        let two = |s: &Self, pattern: &str| s.starts_with_at(start, pattern);
        let (kind, len) = match first {
            b'"' => (TokenKind::StringOpen, 1),
            b'#' => match self.tag_open_at(start) {
                Some((paren, name, chained)) => {
                    (TokenKind::TagOpen { name, chained }, paren - start)
                }
                None => return Err(self.unexpected(start)),
            },
            b'0'..=b'9' => return self.number(start),
            b if is_identifier_start(b) => {
                let end = self.identifier_end(start);
                (
                    TokenKind::Identifier(self.source[start..end].to_string()),
                    end - start,
                )
            }
            b'=' if two(self, "==") => (TokenKind::Operator(Operator::Equal), 2),
            b'!' if two(self, "!=") => (TokenKind::Operator(Operator::NotEqual), 2),
            b'<' if two(self, "<=") => (TokenKind::Operator(Operator::LessEqual), 2),
            b'>' if two(self, ">=") => (TokenKind::Operator(Operator::GreaterEqual), 2),
            b'&' if two(self, "&&") => (TokenKind::Operator(Operator::And), 2),
            b'|' if two(self, "||") => (TokenKind::Operator(Operator::Or), 2),
            b'<' => (TokenKind::Operator(Operator::Less), 1),
            b'>' => (TokenKind::Operator(Operator::Greater), 1),
            b'!' => (TokenKind::Operator(Operator::Not), 1),
            b'+' => (TokenKind::Operator(Operator::Plus), 1),
            b'-' => (TokenKind::Operator(Operator::Minus), 1),
            b'*' => (TokenKind::Operator(Operator::Star), 1),
            b'/' => (TokenKind::Operator(Operator::Slash), 1),
            b'%' => (TokenKind::Operator(Operator::Percent), 1),
            b'(' | b')' | b',' | b'.' | b'[' | b']' | b'{' | b'}' => {
                (TokenKind::Punct(char::from(first)), 1)
            }
            _ => return Err(self.unexpected(start)),
        };
        self.pos = start + len;
        Ok(self.token(kind, start))
    }

    fn number(&mut self, start: usize) -> LeafResult<Token> {
        let mut end = start;
        while self.byte_at(end).is_some_and(|b| b.is_ascii_digit()) {
            end += 1;
        }
        let is_double = self.byte_at(end) == Some(b'.')
            && self.byte_at(end + 1).is_some_and(|b| b.is_ascii_digit());
        if is_double {
            end += 1;
            while self.byte_at(end).is_some_and(|b| b.is_ascii_digit()) {
                end += 1;
            }
        }
        let text = &self.source[start..end];
        let kind = if is_double {
            text.parse::<f64>().map(TokenKind::Double).ok()
        } else {
            text.parse::<i64>().map(TokenKind::Int).ok()
        };
        let Some(kind) = kind else {
            return Err(LeafError::Lex {
                message: format!("number literal `{}` is out of range", text),
                span: self.span(start, end),
            });
        };
        self.pos = end;
        Ok(self.token(kind, start))
    }

    fn unexpected(&self, pos: usize) -> LeafError {
        let ch = self.source[pos..].chars().next().unwrap_or('\0');
        let message = if ch == '=' {
            "unexpected character '=' (use '==' for comparison)".to_string()
        } else {
            format!("unexpected character '{}'", ch)
        };
        LeafError::Lex {
            message,
            span: self.span(pos, pos + ch.len_utf8()),
        }
    }

    /// Next token inside a string literal (after [`TokenKind::StringOpen`]).
    pub fn next_string_part(&mut self) -> Token {
        let start = self.pos;
        match self.byte_at(start) {
            None => return self.token(TokenKind::Eof, start),
            Some(b'"') => {
                self.pos = start + 1;
                return self.token(TokenKind::StringClose, start);
            }
            Some(b'#') => {
                if let Some((paren, name, chained)) = self.tag_open_at(start) {
                    self.pos = paren;
                    return self.token(TokenKind::TagOpen { name, chained }, start);
                }
            }
            Some(_) => {}
        }

        let mut text = String::new();
        let mut end = start;
        let mut chars = self.source[start..].char_indices().peekable();
        while let Some((i, ch)) = chars.next() {
            let at = start + i;
            if ch == '"' || (ch == '#' && at != start && self.tag_open_at(at).is_some()) {
                break;
            }
            end = at + ch.len_utf8();
            if ch != '\\' {
                text.push(ch);
                continue;
            }
            match chars.next() {
                Some((j, escaped)) => {
                    end = start + j + escaped.len_utf8();
                    match escaped {
                        '"' | '\\' | '#' => text.push(escaped),
                        'n' => text.push('\n'),
                        't' => text.push('\t'),
                        other => {
                            text.push('\\');
                            text.push(other);
                        }
                    }
                }
                None => text.push('\\'),
            }
        }
        self.pos = end;
        self.token(TokenKind::StringText(text), start)
    }

    /// Consume an opening `{` after optional spaces or tabs.
    pub fn try_body_open(&mut self) -> Option<Span> {
        let mut p = self.pos;
        while self.byte_at(p).is_some_and(is_horizontal_space) {
            p += 1;
        }
        if self.byte_at(p) == Some(b'{') {
            self.pos = p + 1;
            Some(self.span(p, p + 1))
        } else {
            None
        }
    }

    /// After a closing `}`, consume a conditional continuation if one follows.
    ///
    /// Any whitespace, including newlines, may separate the `}` from the
    /// continuation. Nothing is consumed when no continuation follows.
    pub fn try_continuation(&mut self) -> Option<(Continuation, Span)> {
        let mut p = self.pos;
        while self.byte_at(p).is_some_and(|b| b.is_ascii_whitespace()) {
            p += 1;
        }
        let start = p;

        if let Some((paren, Some(name), chained)) = self.tag_open_at(p) {
            if chained || matches!(name.as_str(), "else" | "elseif" | "elseIf") {
                self.pos = paren;
                return Some((Continuation::Tag(name), self.span(start, paren)));
            }
            return None;
        }

        let keyword_at = |s: &Self, at: usize, word: &str| {
            s.starts_with_at(at, word)
                && !s.byte_at(at + word.len()).is_some_and(is_identifier_byte)
        };
        let skip_space = |s: &Self, mut at: usize| {
            while s.byte_at(at).is_some_and(|b| b.is_ascii_whitespace()) {
                at += 1;
            }
            at
        };

        let else_start = if self.byte_at(p) == Some(b'#') { p + 1 } else { p };
        if !keyword_at(self, else_start, "else") {
            return None;
        }
        let after_else = else_start + 4;
        let q = skip_space(self, after_else);
        if self.byte_at(q) == Some(b'{') {
            self.pos = q;
            return Some((Continuation::Else, self.span(start, after_else)));
        }
        if else_start == p && keyword_at(self, q, "if") {
            let after_if = q + 2;
            if self.byte_at(skip_space(self, after_if)) == Some(b'(') {
                self.pos = after_if;
                return Some((Continuation::ElseIf, self.span(start, after_if)));
            }
        }
        None
    }

    /// Drop spaces/tabs between a closing `}` and a tag on the same line.
    pub fn skip_gap_before_tag(&mut self) {
        let mut p = self.pos;
        while self.byte_at(p).is_some_and(is_horizontal_space) {
            p += 1;
        }
        if p > self.pos && self.directive_at(p) {
            self.pos = p;
        }
    }

    /// Read a raw body up to its matching `}`; returns the text and whether
    /// the closing brace was found.
    pub fn raw_body(&mut self) -> (String, bool) {
        let start = self.pos;
        let mut depth = 0usize;
        let mut p = start;
        while let Some(b) = self.byte_at(p) {
            match b {
                b'{' => depth += 1,
                b'}' if depth == 0 => {
                    self.pos = p + 1;
                    return (self.source[start..p].to_string(), true);
                }
                b'}' => depth -= 1,
                _ => {}
            }
            p += 1;
        }
        self.pos = p;
        (self.source[start..].to_string(), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template_tokens(source: &str, in_body: bool) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_template(in_body);
            if token.kind == TokenKind::Eof {
                break;
            }
            // Skip over tag arguments so the scan continues after `(...)`.
            if let TokenKind::TagOpen { .. } = token.kind {
                while !matches!(
                    lexer.next_expr().unwrap().kind,
                    TokenKind::Punct(')') | TokenKind::Eof
                ) {}
            }
            tokens.push(token.kind);
        }
        tokens
    }

    fn expr_tokens(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_expr().unwrap();
            if token.kind == TokenKind::Eof {
                break;
            }
            tokens.push(token.kind);
        }
        tokens
    }

    fn text(s: &str) -> TokenKind {
        TokenKind::Text(s.to_string())
    }

    fn tag(name: Option<&str>, chained: bool) -> TokenKind {
        TokenKind::TagOpen {
            name: name.map(str::to_string),
            chained,
        }
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(template_tokens("Hello, world!", false), vec![text("Hello, world!")]);
    }

    #[test]
    fn test_print_tag() {
        assert_eq!(
            template_tokens("Hello, #(name)!", false),
            vec![text("Hello, "), tag(None, false), text("!")]
        );
    }

    #[test]
    fn test_hash_without_paren_is_text() {
        assert_eq!(
            template_tokens("#thisIsNotATag... and # alone", false),
            vec![text("#thisIsNotATag... and # alone")]
        );
    }

    #[test]
    fn test_chained_tag() {
        assert_eq!(
            template_tokens("Fine\n##bad()\nGood", false),
            vec![text("Fine\n"), tag(Some("bad"), true), text("\nGood")]
        );
    }

    #[test]
    fn test_line_comment_consumes_newline() {
        let mut lexer = Lexer::new("#// note\nbar");
        let token = lexer.next_template(false);
        assert_eq!(
            token.kind,
            TokenKind::Comment {
                text: " note".to_string(),
                terminated: true,
                line: true,
            }
        );
        assert_eq!(lexer.next_template(false).kind, text("bar"));
    }

    #[test]
    fn test_block_comment_keeps_following_newline() {
        let mut lexer = Lexer::new("#/*\n  note\n*/\nbar");
        let token = lexer.next_template(false);
        assert!(matches!(
            token.kind,
            TokenKind::Comment {
                terminated: true,
                line: false,
                ..
            }
        ));
        assert_eq!(lexer.next_template(false).kind, text("\nbar"));
    }

    #[test]
    fn test_unterminated_block_comment() {
        let mut lexer = Lexer::new("#/* never closed");
        assert!(matches!(
            lexer.next_template(false).kind,
            TokenKind::Comment {
                terminated: false,
                ..
            }
        ));
    }

    #[test]
    fn test_body_close_only_in_body() {
        assert_eq!(template_tokens("a}b", false), vec![text("a}b")]);
        assert_eq!(
            template_tokens("a}b", true),
            vec![text("a"), TokenKind::BodyClose, text("b")]
        );
    }

    #[test]
    fn test_expression_tokens() {
        assert_eq!(
            expr_tokens("age > 99 && !done"),
            vec![
                TokenKind::Identifier("age".to_string()),
                TokenKind::Operator(Operator::Greater),
                TokenKind::Int(99),
                TokenKind::Operator(Operator::And),
                TokenKind::Operator(Operator::Not),
                TokenKind::Identifier("done".to_string()),
            ]
        );
    }

    #[test]
    fn test_expression_numbers_and_punct() {
        assert_eq!(
            expr_tokens("items[0].price >= 4.5"),
            vec![
                TokenKind::Identifier("items".to_string()),
                TokenKind::Punct('['),
                TokenKind::Int(0),
                TokenKind::Punct(']'),
                TokenKind::Punct('.'),
                TokenKind::Identifier("price".to_string()),
                TokenKind::Operator(Operator::GreaterEqual),
                TokenKind::Double(4.5),
            ]
        );
    }

    #[test]
    fn test_identifier_bytes() {
        assert_eq!(
            expr_tokens("my-var ns:name"),
            vec![
                TokenKind::Identifier("my-var".to_string()),
                TokenKind::Identifier("ns:name".to_string()),
            ]
        );
    }

    #[test]
    fn test_unexpected_character_is_lex_error() {
        let mut lexer = Lexer::new("a = b");
        lexer.next_expr().unwrap();
        let err = lexer.next_expr().unwrap_err();
        assert!(matches!(err, LeafError::Lex { .. }));
        assert!(err.to_string().contains("'=='"));
    }

    #[test]
    fn test_integer_out_of_range() {
        let mut lexer = Lexer::new("99999999999999999999");
        assert!(matches!(lexer.next_expr(), Err(LeafError::Lex { .. })));
    }

    #[test]
    fn test_string_parts_with_interpolation() {
        let mut lexer = Lexer::new(r#""foo: #(foo)""#);
        assert_eq!(lexer.next_expr().unwrap().kind, TokenKind::StringOpen);
        assert_eq!(
            lexer.next_string_part().kind,
            TokenKind::StringText("foo: ".to_string())
        );
        assert_eq!(lexer.next_string_part().kind, tag(None, false));
    }

    #[test]
    fn test_string_escapes() {
        let mut lexer = Lexer::new(r#""say \"hi\" \#(no)""#);
        lexer.next_expr().unwrap();
        assert_eq!(
            lexer.next_string_part().kind,
            TokenKind::StringText("say \"hi\" #(no)".to_string())
        );
        assert_eq!(lexer.next_string_part().kind, TokenKind::StringClose);
    }

    #[test]
    fn test_try_body_open() {
        let mut lexer = Lexer::new(" \t{ x");
        assert!(lexer.try_body_open().is_some());
        assert_eq!(lexer.checkpoint(), 3);

        let mut lexer = Lexer::new("\n{");
        assert!(lexer.try_body_open().is_none());
        assert_eq!(lexer.checkpoint(), 0);
    }

    #[test]
    fn test_continuations() {
        let mut lexer = Lexer::new(" else if (true) {");
        assert_eq!(lexer.try_continuation().map(|c| c.0), Some(Continuation::ElseIf));

        let mut lexer = Lexer::new("\nelse {");
        assert_eq!(lexer.try_continuation().map(|c| c.0), Some(Continuation::Else));

        let mut lexer = Lexer::new(" ##ifElse(1) {");
        assert_eq!(
            lexer.try_continuation().map(|c| c.0),
            Some(Continuation::Tag("ifElse".to_string()))
        );

        let mut lexer = Lexer::new(" #elseIf(x) {");
        assert_eq!(
            lexer.try_continuation().map(|c| c.0),
            Some(Continuation::Tag("elseIf".to_string()))
        );

        let mut lexer = Lexer::new(" #else() {");
        assert_eq!(
            lexer.try_continuation().map(|c| c.0),
            Some(Continuation::Tag("else".to_string()))
        );
        assert_eq!(lexer.checkpoint(), 6);
    }

    #[test]
    fn test_non_continuations_consume_nothing() {
        for source in [" #if(x) {", "\nelsewhere", " else is a word", ""] {
            let mut lexer = Lexer::new(source);
            assert!(lexer.try_continuation().is_none(), "{:?}", source);
            assert_eq!(lexer.checkpoint(), 0);
        }
    }

    #[test]
    fn test_skip_gap_before_tag() {
        let mut lexer = Lexer::new("  #if(x)");
        lexer.skip_gap_before_tag();
        assert_eq!(lexer.checkpoint(), 2);

        let mut lexer = Lexer::new("  text");
        lexer.skip_gap_before_tag();
        assert_eq!(lexer.checkpoint(), 0);
    }

    #[test]
    fn test_raw_body_balances_braces() {
        let mut lexer = Lexer::new("a { b } c} rest");
        let (text, terminated) = lexer.raw_body();
        assert_eq!(text, "a { b } c");
        assert!(terminated);
        assert_eq!(&lexer.source()[lexer.checkpoint()..], " rest");
    }
}
