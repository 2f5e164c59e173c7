//! SELECT statements.

use super::TextClause;
use crate::compile::render::RenderContext;
use crate::error::PgsaResult;
use crate::expr::{Expr, ExprGroup};
use crate::schema::Table;
use crate::value::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// SELECT statement.
///
/// The FROM list is the table (if any) followed by text fragments added with
/// [`Select::select_from`]. Placeholders in those fragments are bound with
/// [`Select::param`].
#[derive(Debug, Clone, Default)]
pub struct Select {
    table: Option<Arc<Table>>,
    columns: Vec<String>,
    from_text: Vec<TextClause>,
    where_clause: ExprGroup,
    order_by: Vec<String>,
    limit: Option<i64>,
    offset: Option<i64>,
    params: BTreeMap<String, Value>,
}

impl Select {
    /// SELECT from a table; all of its columns unless narrowed by `columns`.
    pub fn from_table(table: &Arc<Table>) -> Self {
        Self {
            table: Some(Arc::clone(table)),
            ..Self::default()
        }
    }

    /// SELECT the given column expressions with no table.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Add a text fragment to the FROM list.
    pub fn select_from(mut self, clause: TextClause) -> Self {
        self.from_text.push(clause);
        self
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause.push(expr);
        self
    }

    pub fn order_by(mut self, expr: impl Into<String>) -> Self {
        self.order_by.push(expr.into());
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Bind a value to a `:name` used in a text fragment.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn table(&self) -> Option<&Arc<Table>> {
        self.table.as_ref()
    }

    pub(crate) fn render(&self, ctx: &mut RenderContext<'_>) -> PgsaResult<String> {
        let dialect = ctx.dialect();
        for (name, value) in &self.params {
            ctx.bind_explicit(name, value.clone())?;
        }

        let columns: Vec<String> = if !self.columns.is_empty() {
            self.columns.iter().map(|c| ctx.column_ref(c)).collect()
        } else if let Some(table) = &self.table {
            table
                .columns()
                .iter()
                .map(|c| table.qualified_column(c.name(), dialect))
                .collect()
        } else {
            vec!["*".to_string()]
        };
        let mut sql = format!("SELECT {}", columns.join(", "));

        let mut from = Vec::new();
        if let Some(table) = &self.table {
            from.push(table.qualified_name(dialect));
        }
        for clause in &self.from_text {
            from.push(clause.render(ctx)?);
        }
        if !from.is_empty() {
            sql.push_str(" FROM ");
            sql.push_str(&from.join(", "));
        }

        sql.push_str(&self.where_clause.render_where(ctx)?);

        if !self.order_by.is_empty() {
            let order: Vec<String> = self.order_by.iter().map(|o| ctx.column_ref(o)).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }
        if let Some(limit) = self.limit {
            let p = ctx.bind_anon("param", Value::Int(limit), None);
            sql.push_str(&format!(" LIMIT {p}"));
        }
        if let Some(offset) = self.offset {
            let p = ctx.bind_anon("param", Value::Int(offset), None);
            sql.push_str(&format!(" OFFSET {p}"));
        }
        Ok(sql)
    }
}
