//! Query compilation.
//!
//! Turns a [`Query`] into what the PostgreSQL wire protocol wants: SQL with
//! positional `$n` placeholders and the matching ordered parameter list.
//!
//! For structured statements this runs three steps:
//!
//! 1. [`resolve_defaults`] fills in client-side defaults (inserts) and
//!    on-update values (updates), mutating the statement in place;
//! 2. the statement is rendered against the [`Dialect`] into SQL with `:name`
//!    placeholders ([`RenderedQuery`]);
//! 3. [`substitute`] rewrites the named placeholders into `$n` and orders the
//!    values to match, applying bind processors on the way.
//!
//! Raw SQL strings pass through unchanged with no parameters. DDL renders
//! with no parameters and is never scanned for placeholders, so server-side
//! default expressions keep any `:` text they contain.
//!
//! Every compiled SQL string is emitted as a `tracing` event at DEBUG level
//! with target `pgsa.query`.
//!
//! ```
//! use pgsa::compile::compile_query;
//! use pgsa::stmt::TableExt;
//! use pgsa::{Column, Dialect, Expr, Query, SqlType, Table};
//! use std::sync::Arc;
//!
//! let users = Arc::new(Table::new("users", vec![
//!     Column::new("id", SqlType::Integer).primary_key(),
//!     Column::new("name", SqlType::Text),
//! ]));
//! let mut query = Query::from(users.select().filter(Expr::eq("name", "alice")));
//! let compiled = compile_query(&mut query, &Dialect::postgres()).unwrap();
//! assert_eq!(
//!     compiled.sql(),
//!     "SELECT users.id, users.name FROM users WHERE users.name = $1"
//! );
//! ```

mod defaults;
mod placeholder;
pub(crate) mod render;

pub use defaults::resolve_defaults;
pub use placeholder::{scan_placeholders, substitute, substitute_inline, SqlToken};
pub use render::RenderedQuery;

use crate::dialect::Dialect;
use crate::error::PgsaResult;
use crate::stmt::{Query, Statement};
use crate::value::Value;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// SQL with `$n` placeholders plus the ordered parameter values.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct CompiledQuery {
    sql: String,
    params: Vec<Value>,
}

impl CompiledQuery {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Parameter refs compatible with `tokio-postgres`.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|p| p as &(dyn ToSql + Sync))
            .collect()
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }
}

/// Compile a query into positional SQL and parameters.
///
/// Insert and update statements have their defaults resolved in place first,
/// so compiling the same statement twice yields the same result.
pub fn compile_query(query: &mut Query, dialect: &Dialect) -> PgsaResult<CompiledQuery> {
    let compiled = match query {
        Query::Raw(sql) => CompiledQuery::new(sql.clone(), Vec::new()),
        Query::Statement(Statement::Ddl(ddl)) => CompiledQuery::new(ddl.render(dialect)?, Vec::new()),
        Query::Statement(stmt) => substitute(&render_statement(stmt, dialect)?)?,
    };
    tracing::debug!(
        target: "pgsa.query",
        kind = query.kind(),
        param_count = compiled.params.len(),
        sql = %compiled.sql,
        "compiled query"
    );
    Ok(compiled)
}

/// Compile a query with values inlined as SQL literals.
///
/// For logging and debugging only: the connection layer never executes
/// inline SQL.
pub fn compile_query_inline(query: &mut Query, dialect: &Dialect) -> PgsaResult<String> {
    let sql = match query {
        Query::Raw(sql) => sql.clone(),
        Query::Statement(Statement::Ddl(ddl)) => ddl.render(dialect)?,
        Query::Statement(stmt) => substitute_inline(&render_statement(stmt, dialect)?, dialect)?,
    };
    tracing::debug!(
        target: "pgsa.query",
        kind = query.kind(),
        inline = true,
        sql = %sql,
        "compiled query"
    );
    Ok(sql)
}

fn render_statement(stmt: &mut Statement, dialect: &Dialect) -> PgsaResult<RenderedQuery> {
    resolve_defaults(stmt, dialect).render(dialect)
}

/// A dialect bundled for repeated compilation.
///
/// Cheap to clone; the connection layer keeps one per pool and connection.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    dialect: Arc<Dialect>,
}

impl Compiler {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect: Arc::new(dialect),
        }
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn compile(&self, query: &mut Query) -> PgsaResult<CompiledQuery> {
        compile_query(query, &self.dialect)
    }

    pub fn compile_inline(&self, query: &mut Query) -> PgsaResult<String> {
        compile_query_inline(query, &self.dialect)
    }
}
