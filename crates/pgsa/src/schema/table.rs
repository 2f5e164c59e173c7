use super::column::Column;
use crate::dialect::Dialect;

/// Table metadata: a name, an optional schema and ordered columns.
///
/// Statements hold tables behind an `Arc`, so a table is usually built once
/// and shared:
///
/// ```
/// use pgsa::{Column, SqlType, Table};
/// use std::sync::Arc;
///
/// let users = Arc::new(Table::new("users", vec![
///     Column::new("id", SqlType::Integer).primary_key(),
///     Column::new("name", SqlType::Text).default_value("default"),
/// ]));
/// assert_eq!(users.columns().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    schema: Option<String>,
    columns: Vec<Column>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            columns,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn primary_key(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.is_primary_key()).collect()
    }

    /// The column whose value the server generates on insert, if any.
    ///
    /// An explicit `autoincrement(true)` wins. Otherwise the table must have a
    /// single integer primary key with no client-side default.
    pub fn autoincrement_column(&self) -> Option<&Column> {
        if let Some(col) = self
            .columns
            .iter()
            .find(|c| c.autoincrement_flag() == Some(true))
        {
            return Some(col);
        }
        let pk = self.primary_key();
        match pk.as_slice() {
            [col]
                if col.sql_type().is_integer()
                    && col.autoincrement_flag().is_none()
                    && col.default_descriptor().is_none() =>
            {
                Some(col)
            }
            _ => None,
        }
    }

    /// The quoted, schema-qualified table name.
    pub fn qualified_name(&self, dialect: &Dialect) -> String {
        match &self.schema {
            Some(schema) => format!(
                "{}.{}",
                dialect.quote_identifier(schema),
                dialect.quote_identifier(&self.name)
            ),
            None => dialect.quote_identifier(&self.name),
        }
    }

    /// A quoted column reference qualified by the table name.
    pub fn qualified_column(&self, column: &str, dialect: &Dialect) -> String {
        format!(
            "{}.{}",
            self.qualified_name(dialect),
            dialect.quote_identifier(column)
        )
    }
}
