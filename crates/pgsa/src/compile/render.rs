//! Statement rendering into SQL with named placeholders.

use crate::dialect::Dialect;
use crate::error::{PgsaError, PgsaResult};
use crate::schema::{BindProcessor, Table};
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// SQL text with `:name` placeholders plus the values bound to each name.
///
/// This is what statements render to before placeholder substitution. It can
/// also be built by hand for SQL that already uses named placeholders:
///
/// ```
/// use pgsa::compile::{substitute, RenderedQuery};
///
/// let rendered = RenderedQuery::new("SELECT * FROM users WHERE id = :id OR parent = :id")
///     .bind("id", 7);
/// let compiled = substitute(&rendered).unwrap();
/// assert_eq!(compiled.sql(), "SELECT * FROM users WHERE id = $1 OR parent = $1");
/// assert_eq!(compiled.params().len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct RenderedQuery {
    sql: String,
    params: BTreeMap<String, Value>,
    processors: BTreeMap<String, BindProcessor>,
}

impl RenderedQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: BTreeMap::new(),
            processors: BTreeMap::new(),
        }
    }

    /// Bind a value to a placeholder name.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Attach a bind processor to a placeholder name.
    pub fn with_processor<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.processors.insert(name.into(), std::sync::Arc::new(f));
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &BTreeMap<String, Value> {
        &self.params
    }

    /// The value bound to `name`, with its bind processor applied.
    pub(crate) fn processed(&self, name: &str) -> PgsaResult<Value> {
        let value = self
            .params
            .get(name)
            .cloned()
            .ok_or_else(|| PgsaError::missing_parameter(name))?;
        Ok(match self.processors.get(name) {
            Some(process) => process(value),
            None => value,
        })
    }
}

impl fmt::Debug for RenderedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedQuery")
            .field("sql", &self.sql)
            .field("params", &self.params)
            .field("processors", &self.processors.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Mutable state shared by the render functions of one statement.
pub(crate) struct RenderContext<'a> {
    dialect: &'a Dialect,
    table: Option<&'a Table>,
    params: BTreeMap<String, Value>,
    processors: BTreeMap<String, BindProcessor>,
    counters: HashMap<String, usize>,
}

impl<'a> RenderContext<'a> {
    pub(crate) fn new(dialect: &'a Dialect, table: Option<&'a Table>) -> Self {
        Self {
            dialect,
            table,
            params: BTreeMap::new(),
            processors: BTreeMap::new(),
            counters: HashMap::new(),
        }
    }

    pub(crate) fn dialect(&self) -> &'a Dialect {
        self.dialect
    }

    /// Bind under `name` itself, e.g. `:name` for a SET or VALUES entry.
    ///
    /// Falls back to an anonymous name when `name` is already taken.
    pub(crate) fn bind_as(
        &mut self,
        name: &str,
        value: Value,
        processor: Option<BindProcessor>,
    ) -> String {
        let name = bind_base(name);
        if self.params.contains_key(&name) {
            return self.bind_anon(&name, value, processor);
        }
        self.insert(name, value, processor)
    }

    /// Bind under `<base>_<n>`, counting per base name from 1.
    pub(crate) fn bind_anon(
        &mut self,
        base: &str,
        value: Value,
        processor: Option<BindProcessor>,
    ) -> String {
        let base = bind_base(base);
        let counter = self.counters.entry(base.clone()).or_insert(0);
        let name = loop {
            *counter += 1;
            let candidate = format!("{base}_{counter}");
            if !self.params.contains_key(&candidate) {
                break candidate;
            }
        };
        self.insert(name, value, processor)
    }

    /// Bind a caller-chosen name. Rebinding the same value is allowed.
    pub(crate) fn bind_explicit(&mut self, name: &str, value: Value) -> PgsaResult<()> {
        match self.params.get(name) {
            Some(existing) if *existing != value => Err(PgsaError::compile(format!(
                "bind parameter '{name}' conflicts with a value already bound under that name"
            ))),
            Some(_) => Ok(()),
            None => {
                self.params.insert(name.to_string(), value);
                Ok(())
            }
        }
    }

    /// Render a column reference, qualifying bare names of the statement's
    /// table. Anything else (expressions, other tables) passes through.
    pub(crate) fn column_ref(&self, column: &str) -> String {
        let (name, rest) = match column.split_once(' ') {
            Some((name, rest)) => (name, Some(rest)),
            None => (column, None),
        };
        match self.table {
            Some(table) if table.has_column(name) => {
                let qualified = table.qualified_column(name, self.dialect);
                match rest {
                    Some(rest) => format!("{qualified} {rest}"),
                    None => qualified,
                }
            }
            _ => column.to_string(),
        }
    }

    /// Bind processor of a column of the statement's table.
    pub(crate) fn column_processor(&self, column: &str) -> Option<BindProcessor> {
        let name = column.rsplit('.').next().unwrap_or(column);
        self.table
            .and_then(|t| t.column(name))
            .and_then(|c| c.effective_bind_processor())
    }

    pub(crate) fn finish(self, sql: String) -> RenderedQuery {
        RenderedQuery {
            sql,
            params: self.params,
            processors: self.processors,
        }
    }

    fn insert(&mut self, name: String, value: Value, processor: Option<BindProcessor>) -> String {
        if let Some(processor) = processor {
            self.processors.insert(name.clone(), processor);
        }
        self.params.insert(name.clone(), value);
        format!(":{name}")
    }
}

/// Reduce a column reference to a placeholder-safe name.
fn bind_base(name: &str) -> String {
    let last = name.rsplit('.').next().unwrap_or(name);
    let mut base: String = last
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if base.is_empty() {
        base.push_str("param");
    } else if base.starts_with(|c: char| c.is_ascii_digit()) {
        base.insert(0, '_');
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, SqlType};

    #[test]
    fn anon_binds_count_per_base() {
        let d = Dialect::postgres();
        let mut ctx = RenderContext::new(&d, None);
        assert_eq!(ctx.bind_anon("id", Value::Int(1), None), ":id_1");
        assert_eq!(ctx.bind_anon("name", Value::Int(1), None), ":name_1");
        assert_eq!(ctx.bind_anon("meows.id", Value::Int(2), None), ":id_2");
    }

    #[test]
    fn anon_binds_skip_taken_names() {
        let d = Dialect::postgres();
        let mut ctx = RenderContext::new(&d, None);
        assert_eq!(ctx.bind_as("id_1", Value::Int(0), None), ":id_1");
        assert_eq!(ctx.bind_anon("id", Value::Int(1), None), ":id_2");
    }

    #[test]
    fn bind_as_sanitizes_names() {
        let d = Dialect::postgres();
        let mut ctx = RenderContext::new(&d, None);
        assert_eq!(ctx.bind_as("my col", Value::Null, None), ":my_col");
        assert_eq!(ctx.bind_as("1st", Value::Null, None), ":_1st");
        assert_eq!(ctx.bind_as("größe", Value::Null, None), ":größe");
        assert_eq!(ctx.bind_as("my col", Value::Null, None), ":my_col_1");
    }

    #[test]
    fn explicit_bind_conflicts() {
        let d = Dialect::postgres();
        let mut ctx = RenderContext::new(&d, None);
        ctx.bind_explicit("num", Value::Int(16)).unwrap();
        ctx.bind_explicit("num", Value::Int(16)).unwrap();
        assert!(ctx.bind_explicit("num", Value::Int(25)).is_err());
    }

    #[test]
    fn column_refs_are_qualified_for_own_table() {
        let d = Dialect::postgres();
        let t = Table::new("meows", vec![Column::new("id", SqlType::Integer)]);
        let ctx = RenderContext::new(&d, Some(&t));
        assert_eq!(ctx.column_ref("id"), "meows.id");
        assert_eq!(ctx.column_ref("other"), "other");
        assert_eq!(ctx.column_ref("x.y"), "x.y");
        assert_eq!(ctx.column_ref("*"), "*");
        assert_eq!(ctx.column_ref("id DESC"), "meows.id DESC");
        assert_eq!(ctx.column_ref("count(*)"), "count(*)");
    }
}
