//! Statement model.
//!
//! Just enough statement construction for there to be something to compile:
//! single and multi-row inserts, updates, selects, deletes, text clauses and
//! schema statements, all built against shared [`Table`] metadata.
//!
//! ```
//! use pgsa::stmt::TableExt;
//! use pgsa::{Column, Expr, SqlType, Table};
//! use std::sync::Arc;
//!
//! let meows = Arc::new(Table::new("meows", vec![
//!     Column::new("id", SqlType::Integer).primary_key(),
//! ]));
//! let _update = meows
//!     .update()
//!     .value("id", None::<i32>)
//!     .filter(Expr::in_list("id", 1..=3));
//! ```

mod ddl;
mod delete;
mod insert;
mod select;
mod text;
mod update;

pub use ddl::Ddl;
pub use delete::Delete;
pub use insert::{Insert, InsertValues};
pub use select::Select;
pub use text::{text, TextClause};
pub use update::Update;

use crate::compile::render::{RenderContext, RenderedQuery};
use crate::dialect::Dialect;
use crate::error::{PgsaError, PgsaResult};
use crate::schema::Table;
use std::sync::Arc;

/// A structured statement.
#[derive(Debug, Clone)]
pub enum Statement {
    Insert(Insert),
    Update(Update),
    Select(Select),
    Delete(Delete),
    Text(TextClause),
    Ddl(Ddl),
}

impl Statement {
    /// Short name of the statement kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Insert(_) => "insert",
            Statement::Update(_) => "update",
            Statement::Select(_) => "select",
            Statement::Delete(_) => "delete",
            Statement::Text(_) => "text",
            Statement::Ddl(_) => "ddl",
        }
    }

    pub fn is_ddl(&self) -> bool {
        matches!(self, Statement::Ddl(_))
    }

    /// Render to SQL with `:name` placeholders.
    ///
    /// Defaults are not resolved here; see
    /// [`resolve_defaults`](crate::compile::resolve_defaults).
    pub fn render(&self, dialect: &Dialect) -> PgsaResult<RenderedQuery> {
        let table = match self {
            Statement::Insert(s) => Some(&**s.table()),
            Statement::Update(s) => Some(&**s.table()),
            Statement::Delete(s) => Some(&**s.table()),
            Statement::Select(s) => s.table().map(|t| &**t),
            Statement::Text(_) | Statement::Ddl(_) => None,
        };
        let mut ctx = RenderContext::new(dialect, table);
        let sql = match self {
            Statement::Insert(s) => s.render(&mut ctx)?,
            Statement::Update(s) => s.render(&mut ctx)?,
            Statement::Select(s) => s.render(&mut ctx)?,
            Statement::Delete(s) => s.render(&mut ctx)?,
            Statement::Text(s) => s.render(&mut ctx)?,
            Statement::Ddl(s) => s.render(dialect)?,
        };
        Ok(ctx.finish(sql))
    }
}

/// A query handed to the compiler: opaque SQL or a structured statement.
#[derive(Debug, Clone)]
pub enum Query {
    /// Passed through unchanged, with no parameters.
    Raw(String),
    Statement(Statement),
}

impl Query {
    pub fn as_statement(&self) -> Option<&Statement> {
        match self {
            Query::Raw(_) => None,
            Query::Statement(s) => Some(s),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Query::Raw(_) => "raw",
            Query::Statement(s) => s.kind(),
        }
    }
}

impl From<&str> for Query {
    fn from(sql: &str) -> Self {
        Query::Raw(sql.to_string())
    }
}

impl From<String> for Query {
    fn from(sql: String) -> Self {
        Query::Raw(sql)
    }
}

impl From<Statement> for Query {
    fn from(stmt: Statement) -> Self {
        Query::Statement(stmt)
    }
}

macro_rules! impl_into_statement {
    ($($ty:ident),* $(,)?) => {
        $(
            impl From<$ty> for Statement {
                fn from(s: $ty) -> Self {
                    Statement::$ty(s)
                }
            }

            impl From<$ty> for Query {
                fn from(s: $ty) -> Self {
                    Query::Statement(Statement::$ty(s))
                }
            }
        )*
    };
}

impl_into_statement!(Insert, Update, Select, Delete, Ddl);

impl From<TextClause> for Statement {
    fn from(s: TextClause) -> Self {
        Statement::Text(s)
    }
}

impl From<TextClause> for Query {
    fn from(s: TextClause) -> Self {
        Query::Statement(Statement::Text(s))
    }
}

/// Statement constructors on shared tables.
pub trait TableExt {
    fn insert(&self) -> Insert;
    fn update(&self) -> Update;
    fn select(&self) -> Select;
    fn delete(&self) -> Delete;
    fn create_table(&self) -> Ddl;
    fn drop_table(&self) -> Ddl;
}

impl TableExt for Arc<Table> {
    fn insert(&self) -> Insert {
        Insert::new(self)
    }

    fn update(&self) -> Update {
        Update::new(self)
    }

    fn select(&self) -> Select {
        Select::from_table(self)
    }

    fn delete(&self) -> Delete {
        Delete::new(self)
    }

    fn create_table(&self) -> Ddl {
        Ddl::create_table(self)
    }

    fn drop_table(&self) -> Ddl {
        Ddl::drop_table(self)
    }
}

/// Build a [`ParamMap`](crate::ParamMap) row from `"column" => value` pairs.
///
/// ```
/// let row = pgsa::params! { "name" => "alice", "age" => 30 };
/// assert_eq!(row.len(), 2);
/// ```
#[macro_export]
macro_rules! params {
    () => { $crate::ParamMap::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut row = $crate::ParamMap::new();
        $(
            row.insert(
                ::std::string::String::from($key),
                $crate::ParamValue::Value($crate::Value::from($value)),
            );
        )+
        row
    }};
}

pub(crate) fn check_columns<'k>(
    table: &Table,
    keys: impl IntoIterator<Item = &'k String>,
) -> PgsaResult<()> {
    let mut unknown: Vec<&str> = keys
        .into_iter()
        .filter(|k| !table.has_column(k))
        .map(String::as_str)
        .collect();
    if unknown.is_empty() {
        return Ok(());
    }
    unknown.sort_unstable();
    unknown.dedup();
    Err(PgsaError::compile(format!(
        "Unconsumed column names: {} (table '{}')",
        unknown.join(", "),
        table.name()
    )))
}

pub(crate) fn render_returning(ctx: &RenderContext<'_>, columns: &[String]) -> String {
    if columns.is_empty() {
        return String::new();
    }
    let cols: Vec<String> = columns.iter().map(|c| ctx.column_ref(c)).collect();
    format!(" RETURNING {}", cols.join(", "))
}
