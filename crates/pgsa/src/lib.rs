//! # pgsa
//!
//! Compile structured SQL statements into what the PostgreSQL wire protocol
//! expects, and run them on a pooled `tokio-postgres` client.
//!
//! ## Features
//!
//! - **Table metadata**: [`Table`] and [`Column`] describe types, keys,
//!   client-side defaults and on-update values, sequences and bind processors
//! - **Structured statements**: insert, update, select and delete built from
//!   table metadata, plus [`text`] fragments and DDL
//! - **Positional parameters**: every statement compiles to SQL with `$n`
//!   placeholders and an ordered parameter list ([`compile_query`])
//! - **Defaults resolved client-side**: scalar, callable and sequence defaults
//!   are filled in before rendering
//! - **Pooled execution**: [`Pool`] and [`Connection`] compile queries before
//!   running them; [`PooledTransaction`] and [`QueryCursor`] release their
//!   connection even when the task is cancelled
//! - **Lifecycle handle**: [`Pg`] holds a pool that is created and torn down
//!   explicitly
//!
//! ## Compiling
//!
//! ```
//! use pgsa::stmt::TableExt;
//! use pgsa::{Column, Compiler, Expr, Query, SqlType, Table};
//! use std::sync::Arc;
//!
//! let users = Arc::new(Table::new("users", vec![
//!     Column::new("id", SqlType::Integer).primary_key(),
//!     Column::new("name", SqlType::Text),
//!     Column::new("active", SqlType::Boolean).default_value(true),
//! ]));
//!
//! let compiler = Compiler::default();
//! let mut insert = Query::from(users.insert().value("name", "alice"));
//! let compiled = compiler.compile(&mut insert).unwrap();
//! assert_eq!(
//!     compiled.sql(),
//!     "INSERT INTO users (name, active) VALUES ($1, $2) RETURNING users.id"
//! );
//! assert_eq!(compiled.params().len(), 2);
//!
//! let mut update = Query::from(users.update().value("active", false).filter(Expr::eq("id", 7)));
//! let compiled = compiler.compile(&mut update).unwrap();
//! assert_eq!(compiled.sql(), "UPDATE users SET active=$1 WHERE users.id = $2");
//! ```
//!
//! ## Running
//!
//! ```ignore
//! let pg = pgsa::Pg::new();
//! pg.init(pgsa::PoolConfig::from_env()?).await?;
//!
//! let id: i32 = pg.insert(users.insert().value("name", "alice"), "id", &[]).await?;
//! let rows = pg.query(users.select()).fetch_all().await?;
//!
//! pgsa::transaction!(pg, tx, {
//!     tx.execute(users.delete().filter(Expr::eq("id", id)), &[]).await?;
//!     Ok(())
//! })?;
//! ```

pub mod client;
pub mod compile;
pub mod config;
pub mod connection;
pub mod cursor;
pub mod dialect;
pub mod error;
pub mod expr;
pub mod pg;
pub mod pool;
pub mod row;
pub mod schema;
pub mod stmt;
pub mod transaction;
pub mod value;

pub use client::{GenericClient, RowStream, StreamingClient};
pub use compile::{CompiledQuery, Compiler, compile_query, compile_query_inline};
pub use config::PoolConfig;
pub use connection::{Connection, PreparedQuery};
pub use cursor::{DEFAULT_PREFETCH, QueryCursor};
pub use dialect::{Dialect, NullPolicy};
pub use error::{PgsaError, PgsaResult};
pub use expr::{Expr, ExprGroup};
pub use pg::{PendingQuery, Pg};
pub use pool::{Pool, create_pool, create_pool_with_tls};
pub use row::{FromRow, RowExt};
pub use schema::{
    BindProcessor, Column, ColumnDefault, DefaultContext, DefaultFn, EnumType, Sequence, SqlType,
    Table,
};
pub use stmt::{Query, Statement, TableExt, text};
pub use transaction::{IsolationLevel, PooledTransaction, TransactionOptions};
pub use value::{ParamMap, ParamValue, Value};
