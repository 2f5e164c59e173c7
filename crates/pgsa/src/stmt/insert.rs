//! INSERT statements.

use super::{check_columns, render_returning};
use crate::compile::render::RenderContext;
use crate::error::{PgsaError, PgsaResult};
use crate::schema::{Column, Table};
use crate::value::{ParamMap, ParamValue, Value};
use std::sync::Arc;

/// Parameter rows of an INSERT.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertValues {
    /// One row (possibly empty).
    Single(ParamMap),
    /// A multi-row `VALUES (...), (...)` batch.
    Multi(Vec<ParamMap>),
}

impl Default for InsertValues {
    fn default() -> Self {
        InsertValues::Single(ParamMap::new())
    }
}

impl InsertValues {
    pub fn rows(&self) -> Vec<&ParamMap> {
        match self {
            InsertValues::Single(row) => vec![row],
            InsertValues::Multi(rows) => rows.iter().collect(),
        }
    }

    pub fn rows_mut(&mut self) -> Vec<&mut ParamMap> {
        match self {
            InsertValues::Single(row) => vec![row],
            InsertValues::Multi(rows) => rows.iter_mut().collect(),
        }
    }
}

/// INSERT statement against a table.
#[derive(Debug, Clone)]
pub struct Insert {
    table: Arc<Table>,
    values: InsertValues,
    returning: Vec<String>,
}

impl Insert {
    pub fn new(table: &Arc<Table>) -> Self {
        Self {
            table: Arc::clone(table),
            values: InsertValues::default(),
            returning: Vec::new(),
        }
    }

    /// Set a column value. On a multi-row insert the value goes into every row.
    pub fn value(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_entry(column.into(), ParamValue::Value(value.into()));
        self
    }

    /// Fill a column from a server-side sequence.
    pub fn nextval(mut self, column: impl Into<String>, sequence: impl Into<String>) -> Self {
        self.set_entry(column.into(), ParamValue::NextVal(sequence.into()));
        self
    }

    /// Set several column values at once.
    pub fn values<I, K, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (k, v) in values {
            self.set_entry(k.into(), ParamValue::Value(v.into()));
        }
        self
    }

    /// Append a row, turning the insert into a multi-row insert.
    pub fn row(mut self, row: ParamMap) -> Self {
        self.values = match std::mem::take(&mut self.values) {
            InsertValues::Single(existing) if existing.is_empty() => InsertValues::Multi(vec![row]),
            InsertValues::Single(existing) => InsertValues::Multi(vec![existing, row]),
            InsertValues::Multi(mut rows) => {
                rows.push(row);
                InsertValues::Multi(rows)
            }
        };
        self
    }

    pub fn rows<I>(self, rows: I) -> Self
    where
        I: IntoIterator<Item = ParamMap>,
    {
        rows.into_iter().fold(self, Insert::row)
    }

    /// Set RETURNING columns.
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

    pub fn params(&self) -> &InsertValues {
        &self.values
    }

    pub fn params_mut(&mut self) -> &mut InsertValues {
        &mut self.values
    }

    pub fn is_multi_row(&self) -> bool {
        matches!(&self.values, InsertValues::Multi(rows) if rows.len() > 1)
    }

    pub fn returning_columns(&self) -> &[String] {
        &self.returning
    }

    pub(crate) fn set_returning(&mut self, columns: Vec<String>) {
        self.returning = columns;
    }

    fn set_entry(&mut self, column: String, value: ParamValue) {
        for row in self.values.rows_mut() {
            row.insert(column.clone(), value.clone());
        }
    }

    pub(crate) fn render(&self, ctx: &mut RenderContext<'_>) -> PgsaResult<String> {
        let dialect = ctx.dialect();
        let table = &*self.table;
        let rows = self.values.rows();
        if rows.is_empty() {
            return Err(PgsaError::compile(format!(
                "INSERT into '{}' has an empty row list",
                table.name()
            )));
        }
        check_columns(table, rows.iter().flat_map(|r| r.keys()))?;

        let columns: Vec<&Column> = table
            .columns()
            .iter()
            .filter(|c| rows.iter().any(|r| r.contains_key(c.name())))
            .collect();

        let mut sql = format!("INSERT INTO {}", table.qualified_name(dialect));
        if columns.is_empty() {
            if rows.len() > 1 {
                return Err(PgsaError::compile(
                    "multi-row INSERT needs at least one column",
                ));
            }
            sql.push_str(" DEFAULT VALUES");
        } else {
            let names: Vec<String> = columns
                .iter()
                .map(|c| dialect.quote_identifier(c.name()))
                .collect();
            sql.push_str(&format!(" ({}) VALUES ", names.join(", ")));

            let multi = rows.len() > 1;
            let mut groups = Vec::with_capacity(rows.len());
            for (i, row) in rows.iter().enumerate() {
                let cells: Vec<String> = columns
                    .iter()
                    .map(|col| {
                        let bind_name = if multi {
                            format!("{}_m{}", col.name(), i)
                        } else {
                            col.name().to_string()
                        };
                        render_cell(ctx, col, row.get(col.name()), &bind_name)
                    })
                    .collect();
                groups.push(format!("({})", cells.join(", ")));
            }
            sql.push_str(&groups.join(", "));
        }

        if !self.returning.is_empty() {
            sql.push_str(&render_returning(ctx, &self.returning));
        } else if let Some(pk) = self.implicit_returning_column(ctx, &rows) {
            sql.push_str(&format!(" RETURNING {}", ctx.column_ref(pk.name())));
        }
        Ok(sql)
    }

    fn implicit_returning_column<'t>(
        &'t self,
        ctx: &RenderContext<'_>,
        rows: &[&ParamMap],
    ) -> Option<&'t Column> {
        if !ctx.dialect().implicit_returning {
            return None;
        }
        let [row] = rows else {
            return None;
        };
        self.table
            .autoincrement_column()
            .filter(|pk| !row.contains_key(pk.name()))
    }
}

fn render_cell(
    ctx: &mut RenderContext<'_>,
    column: &Column,
    cell: Option<&ParamValue>,
    bind_name: &str,
) -> String {
    match cell {
        None => "DEFAULT".to_string(),
        Some(ParamValue::NextVal(seq)) => format!("nextval({})", ctx.dialect().quote_literal(seq)),
        Some(ParamValue::Value(v)) => {
            ctx.bind_as(bind_name, v.clone(), column.effective_bind_processor())
        }
    }
}
