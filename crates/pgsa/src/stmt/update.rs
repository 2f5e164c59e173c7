//! UPDATE statements.

use super::{check_columns, render_returning};
use crate::compile::render::RenderContext;
use crate::error::{PgsaError, PgsaResult};
use crate::expr::{Expr, ExprGroup};
use crate::schema::Table;
use crate::value::{ParamMap, ParamValue, Value};
use std::sync::Arc;

/// UPDATE statement against a table.
#[derive(Debug, Clone)]
pub struct Update {
    table: Arc<Table>,
    set: ParamMap,
    where_clause: ExprGroup,
    returning: Vec<String>,
}

impl Update {
    pub fn new(table: &Arc<Table>) -> Self {
        Self {
            table: Arc::clone(table),
            set: ParamMap::new(),
            where_clause: ExprGroup::new(),
            returning: Vec::new(),
        }
    }

    /// Set a column value.
    pub fn value(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(column.into(), ParamValue::Value(value.into()));
        self
    }

    pub fn nextval(mut self, column: impl Into<String>, sequence: impl Into<String>) -> Self {
        self.set
            .insert(column.into(), ParamValue::NextVal(sequence.into()));
        self
    }

    pub fn values<I, K, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (k, v) in values {
            self.set.insert(k.into(), ParamValue::Value(v.into()));
        }
        self
    }

    /// Add a WHERE condition (ANDed with the others).
    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause.push(expr);
        self
    }

    pub fn returning<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.returning = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    /// The SET map.
    pub fn params(&self) -> &ParamMap {
        &self.set
    }

    pub fn params_mut(&mut self) -> &mut ParamMap {
        &mut self.set
    }

    pub fn where_clause(&self) -> &ExprGroup {
        &self.where_clause
    }

    pub(crate) fn render(&self, ctx: &mut RenderContext<'_>) -> PgsaResult<String> {
        let dialect = ctx.dialect();
        let table = &*self.table;
        if self.set.is_empty() {
            return Err(PgsaError::compile(format!(
                "UPDATE of '{}' has nothing to SET",
                table.name()
            )));
        }
        check_columns(table, self.set.keys())?;

        let mut assignments = Vec::with_capacity(self.set.len());
        for col in table.columns() {
            let Some(entry) = self.set.get(col.name()) else {
                continue;
            };
            let rhs = match entry {
                ParamValue::NextVal(seq) => format!("nextval({})", dialect.quote_literal(seq)),
                ParamValue::Value(v) => {
                    ctx.bind_as(col.name(), v.clone(), col.effective_bind_processor())
                }
            };
            assignments.push(format!("{}={}", dialect.quote_identifier(col.name()), rhs));
        }

        let mut sql = format!(
            "UPDATE {} SET {}",
            table.qualified_name(dialect),
            assignments.join(", ")
        );
        sql.push_str(&self.where_clause.render_where(ctx)?);
        sql.push_str(&render_returning(ctx, &self.returning));
        Ok(sql)
    }
}
