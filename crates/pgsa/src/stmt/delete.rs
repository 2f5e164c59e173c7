//! DELETE statements.

use super::render_returning;
use crate::compile::render::RenderContext;
use crate::error::PgsaResult;
use crate::expr::{Expr, ExprGroup};
use crate::schema::Table;
use std::sync::Arc;

/// DELETE statement against a table.
#[derive(Debug, Clone)]
pub struct Delete {
    table: Arc<Table>,
    where_clause: ExprGroup,
    returning: Vec<String>,
}

impl Delete {
    pub fn new(table: &Arc<Table>) -> Self {
        Self {
            table: Arc::clone(table),
            where_clause: ExprGroup::new(),
            returning: Vec::new(),
        }
    }

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

    pub(crate) fn render(&self, ctx: &mut RenderContext<'_>) -> PgsaResult<String> {
        let mut sql = format!("DELETE FROM {}", self.table.qualified_name(ctx.dialect()));
        sql.push_str(&self.where_clause.render_where(ctx)?);
        sql.push_str(&render_returning(ctx, &self.returning));
        Ok(sql)
    }
}
