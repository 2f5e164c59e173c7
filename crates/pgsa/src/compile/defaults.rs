//! Client-side default and on-update resolution.

use crate::dialect::{Dialect, NullPolicy};
use crate::schema::{Column, ColumnDefault, Table};
use crate::stmt::Statement;
use crate::value::ParamMap;
use std::sync::Arc;

/// Fill in column defaults (inserts) and on-update values (updates).
///
/// Every column with a descriptor whose value the statement does not provide
/// gets one: scalars as-is, callables evaluated once per row, sequences as a
/// `nextval` request. Provided values are never overwritten. Other statement
/// kinds pass through untouched.
pub fn resolve_defaults<'s>(stmt: &'s mut Statement, dialect: &Dialect) -> &'s mut Statement {
    match stmt {
        Statement::Insert(insert) => {
            let table = Arc::clone(insert.table());
            for row in insert.params_mut().rows_mut() {
                apply(&table, row, Column::default_descriptor, dialect.null_policy);
            }
        }
        Statement::Update(update) => {
            let table = Arc::clone(update.table());
            apply(
                &table,
                update.params_mut(),
                Column::on_update_descriptor,
                dialect.null_policy,
            );
        }
        Statement::Select(_) | Statement::Delete(_) | Statement::Text(_) | Statement::Ddl(_) => {}
    }
    stmt
}

fn apply(
    table: &Table,
    row: &mut ParamMap,
    descriptor: fn(&Column) -> Option<&ColumnDefault>,
    policy: NullPolicy,
) {
    for column in table.columns() {
        let Some(default) = descriptor(column) else {
            continue;
        };
        let provided = match row.get(column.name()) {
            None => false,
            Some(v) if v.is_null() => policy == NullPolicy::ExplicitNull,
            Some(_) => true,
        };
        if !provided {
            row.insert(column.name().to_string(), default.resolve());
        }
    }
}
