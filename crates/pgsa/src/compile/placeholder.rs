//! Named placeholder scanning and substitution.
//!
//! The scanner walks SQL text once and splits it into pass-through text and
//! `:name` placeholders. String literals, quoted identifiers, dollar-quoted
//! bodies and comments are copied untouched, as is the `::` cast operator.

use super::render::RenderedQuery;
use super::CompiledQuery;
use crate::dialect::Dialect;
use crate::error::PgsaResult;
use std::collections::HashMap;

/// A piece of scanned SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlToken<'a> {
    /// Text copied through as-is.
    Text(&'a str),
    /// A `:name` placeholder (the name, without the colon).
    Placeholder(&'a str),
    /// `\:`, emitted as a literal `:`.
    EscapedColon,
}

/// Split `sql` into text and placeholder tokens.
pub fn scan_placeholders(sql: &str) -> Vec<SqlToken<'_>> {
    Scanner::new(sql).run()
}

/// Rewrite named placeholders into `$n`, collecting values in order.
///
/// Each distinct name gets one ordinal, in order of first appearance, and
/// every occurrence of it is replaced by the same `$n`.
pub fn substitute(rendered: &RenderedQuery) -> PgsaResult<CompiledQuery> {
    let mut sql = String::with_capacity(rendered.sql().len());
    let mut params = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for token in scan_placeholders(rendered.sql()) {
        match token {
            SqlToken::Text(text) => sql.push_str(text),
            SqlToken::EscapedColon => sql.push(':'),
            SqlToken::Placeholder(name) => {
                let position = match positions.get(name) {
                    Some(&position) => position,
                    None => {
                        params.push(rendered.processed(name)?);
                        positions.insert(name, params.len());
                        params.len()
                    }
                };
                sql.push('$');
                sql.push_str(&position.to_string());
            }
        }
    }

    Ok(CompiledQuery::new(sql, params))
}

/// Rewrite named placeholders into SQL literals.
///
/// The result is for logging and debugging; never execute it in place of a
/// parameterized query.
pub fn substitute_inline(rendered: &RenderedQuery, dialect: &Dialect) -> PgsaResult<String> {
    let mut sql = String::with_capacity(rendered.sql().len());
    let mut literals: HashMap<&str, String> = HashMap::new();

    for token in scan_placeholders(rendered.sql()) {
        match token {
            SqlToken::Text(text) => sql.push_str(text),
            SqlToken::EscapedColon => sql.push(':'),
            SqlToken::Placeholder(name) => {
                if !literals.contains_key(name) {
                    let literal = rendered.processed(name)?.to_literal(dialect);
                    literals.insert(name, literal);
                }
                if let Some(literal) = literals.get(name) {
                    sql.push_str(literal);
                }
            }
        }
    }

    Ok(sql)
}

struct Scanner<'a> {
    input: &'a str,
    pos: usize,
    /// Start of the pending text run.
    text_start: usize,
    tokens: Vec<SqlToken<'a>>,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            text_start: 0,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn prev(&self) -> Option<char> {
        self.input[..self.pos].chars().next_back()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn flush_text(&mut self, end: usize) {
        if end > self.text_start {
            self.tokens
                .push(SqlToken::Text(&self.input[self.text_start..end]));
        }
    }

    fn run(mut self) -> Vec<SqlToken<'a>> {
        while let Some(c) = self.peek() {
            match c {
                '\'' => {
                    let escapes = self.is_escape_string_prefix();
                    self.skip_quoted('\'', escapes);
                }
                '"' => self.skip_quoted('"', false),
                '-' if self.peek_next() == Some('-') => self.skip_line_comment(),
                '/' if self.peek_next() == Some('*') => self.skip_block_comment(),
                '$' => self.skip_dollar_quoted(),
                '\\' if self.peek_next() == Some(':') => {
                    self.flush_text(self.pos);
                    self.pos += 2;
                    self.text_start = self.pos;
                    self.tokens.push(SqlToken::EscapedColon);
                }
                ':' => self.scan_colon(),
                _ => {
                    self.advance();
                }
            }
        }
        self.flush_text(self.input.len());
        self.tokens
    }

    fn scan_colon(&mut self) {
        if self.peek_next() == Some(':') {
            // Cast operator.
            self.pos += 2;
            return;
        }
        let follows_ident = self.prev().is_some_and(is_ident_char);
        let starts_name = self.peek_next().is_some_and(is_ident_start);
        if follows_ident || !starts_name {
            self.advance();
            return;
        }

        let colon = self.pos;
        self.advance();
        let name_start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        self.flush_text(colon);
        self.tokens
            .push(SqlToken::Placeholder(&self.input[name_start..self.pos]));
        self.text_start = self.pos;
    }

    /// `E'...'` strings treat backslash as an escape character.
    fn is_escape_string_prefix(&self) -> bool {
        let before = &self.input[..self.pos];
        let mut chars = before.chars().rev();
        match chars.next() {
            Some('e' | 'E') => !chars.next().is_some_and(is_ident_char),
            _ => false,
        }
    }

    fn skip_quoted(&mut self, quote: char, backslash_escapes: bool) {
        self.advance();
        while let Some(c) = self.advance() {
            if backslash_escapes && c == '\\' {
                self.advance();
            } else if c == quote {
                if self.peek() == Some(quote) {
                    self.advance();
                } else {
                    return;
                }
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.advance() {
            if c == '\n' {
                return;
            }
        }
    }

    fn skip_block_comment(&mut self) {
        self.pos += 2;
        let mut depth = 1;
        while depth > 0 {
            match self.advance() {
                Some('/') if self.peek() == Some('*') => {
                    self.advance();
                    depth += 1;
                }
                Some('*') if self.peek() == Some('/') => {
                    self.advance();
                    depth -= 1;
                }
                Some(_) => {}
                None => return,
            }
        }
    }

    /// Skip `$tag$ ... $tag$`. A `$` that does not open a dollar quote (such
    /// as a `$1` parameter) is ordinary text.
    fn skip_dollar_quoted(&mut self) {
        if self.prev().is_some_and(is_ident_char) {
            self.advance();
            return;
        }
        let rest = &self.input[self.pos + 1..];
        let tag_len = rest
            .char_indices()
            .find(|&(i, c)| !(c == '_' || c.is_alphabetic() || (i > 0 && c.is_ascii_digit())))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if !rest[tag_len..].starts_with('$') {
            self.advance();
            return;
        }
        let delimiter = &self.input[self.pos..self.pos + tag_len + 2];
        let body_start = self.pos + delimiter.len();
        match self.input[body_start..].find(delimiter) {
            Some(end) => self.pos = body_start + end + delimiter.len(),
            None => self.pos = self.input.len(),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn placeholders(sql: &str) -> Vec<&str> {
        scan_placeholders(sql)
            .into_iter()
            .filter_map(|t| match t {
                SqlToken::Placeholder(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn finds_simple_placeholders() {
        assert_eq!(placeholders("SELECT :a, :b_2 FROM t WHERE x = :a"), ["a", "b_2", "a"]);
    }

    #[test]
    fn casts_are_not_placeholders() {
        assert_eq!(placeholders("SELECT id::text, :v::int"), ["v"]);
        assert_eq!(placeholders("SELECT ARRAY[1,2][1:2]"), Vec::<&str>::new());
    }

    #[test]
    fn non_ascii_names_are_placeholders() {
        assert_eq!(placeholders("SELECT :größe, :имя_2 FROM t"), ["größe", "имя_2"]);
        assert_eq!(placeholders("SELECT é:x"), Vec::<&str>::new());

        let rendered = RenderedQuery::new("SELECT * FROM t WHERE a = :größe OR b = :größe").bind("größe", 3);
        let compiled = substitute(&rendered).unwrap();
        assert_eq!(compiled.sql(), "SELECT * FROM t WHERE a = $1 OR b = $1");
        assert_eq!(compiled.params(), &[Value::Int(3)]);
    }

    #[test]
    fn colon_after_identifier_is_not_a_placeholder() {
        assert_eq!(placeholders("SELECT a:b, x :y"), ["y"]);
    }

    #[test]
    fn quoted_regions_are_skipped() {
        let sql = "SELECT ':a', \":b\", E'\\':c', 'it''s :d', :e";
        assert_eq!(placeholders(sql), ["e"]);
    }

    #[test]
    fn comments_are_skipped() {
        let sql = "SELECT :a -- :b\n, /* :c /* :d */ :e */ :f";
        assert_eq!(placeholders(sql), ["a", "f"]);
    }

    #[test]
    fn dollar_quotes_are_skipped() {
        let sql = "SELECT $$ :a $$, $fn$ :b $x$ :c $fn$, :d, $1";
        assert_eq!(placeholders(sql), ["d"]);
    }

    #[test]
    fn escaped_colon_renders_literally() {
        let rendered = RenderedQuery::new(r"SELECT '10' || \:unit, :n").bind("n", 1);
        let compiled = substitute(&rendered).unwrap();
        assert_eq!(compiled.sql(), "SELECT '10' || :unit, $1");
    }

    #[test]
    fn text_is_preserved_byte_for_byte() {
        let sql = "SELECT 'ünïcødé :x', \"ß\" FROM t -- :y";
        let tokens = scan_placeholders(sql);
        assert_eq!(tokens, vec![SqlToken::Text(sql)]);
    }

    #[test]
    fn repeated_names_share_a_position() {
        let rendered = RenderedQuery::new("SELECT :b, :a, :b")
            .bind("a", 1)
            .bind("b", 2);
        let compiled = substitute(&rendered).unwrap();
        assert_eq!(compiled.sql(), "SELECT $1, $2, $1");
        assert_eq!(compiled.params(), &[Value::Int(2), Value::Int(1)]);
    }

    #[test]
    fn missing_value_is_an_error() {
        let rendered = RenderedQuery::new("SELECT :a, :nope").bind("a", 1);
        let err = substitute(&rendered).unwrap_err();
        assert!(err.is_missing_parameter());
        assert!(err.to_string().contains(":nope"));
    }

    #[test]
    fn processors_run_once_per_name() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let rendered = RenderedQuery::new("SELECT :x, :x")
            .bind("x", "a")
            .with_processor("x", move |v| {
                counter.fetch_add(1, Ordering::SeqCst);
                v
            });
        substitute(&rendered).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn inline_renders_literals() {
        let rendered = RenderedQuery::new("SELECT :s, :n, :s, :nil")
            .bind("s", "it's")
            .bind("n", 3)
            .bind("nil", Value::Null);
        let sql = substitute_inline(&rendered, &Dialect::postgres()).unwrap();
        assert_eq!(sql, "SELECT 'it''s', 3, 'it''s', NULL");
    }
}
