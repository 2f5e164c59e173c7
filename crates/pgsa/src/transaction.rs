//! Pooled transactions and the `transaction!` macro.
//!
//! A [`PooledTransaction`] owns the pooled connection it runs on. It is
//! opened with `BEGIN` (plus the requested [`TransactionOptions`]) and closed
//! with [`commit`](PooledTransaction::commit) or
//! [`rollback`](PooledTransaction::rollback). The connection goes back to the
//! pool only after a successful close; when `BEGIN` or the close fails, or
//! the transaction is dropped while still open, the connection is detached from
//! the pool and closed, which rolls back anything pending on the server.
//! Release never awaits, so cancelling the task cannot leak a connection.
//!
//! # Example
//!
//! ```ignore
//! use pgsa::{PgsaResult, TransactionOptions};
//!
//! # async fn demo(pool: &pgsa::Pool) -> PgsaResult<()> {
//! pgsa::transaction!(pool, tx, {
//!     tx.execute("UPDATE accounts SET balance = balance - $1 WHERE id = $2", &[&100_i64, &1_i32])
//!         .await?;
//!     Ok(())
//! })?;
//! # Ok(()) }
//! ```

use crate::client::{GenericClient, RowStream};
use crate::compile::CompiledQuery;
use crate::connection::{Connection, PreparedQuery};
use crate::cursor::QueryCursor;
use crate::error::{PgsaError, PgsaResult};
use crate::row::FromRow;
use crate::stmt::Query;
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, ToSql};

/// Runs the given block inside a pooled transaction.
///
/// - Begins a transaction via `$pool.transaction(options).await`.
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)`.
///
/// Works with anything exposing `transaction(TransactionOptions)`, which
/// includes [`Pool`](crate::Pool) and [`Pg`](crate::Pg). Options default to
/// [`TransactionOptions::default()`].
///
/// The block must evaluate to `pgsa::PgsaResult<T>`.
#[macro_export]
macro_rules! transaction {
    ($pool:expr, $tx:ident, $body:block) => {
        $crate::transaction!($pool, $tx, $crate::TransactionOptions::default(), $body)
    };
    ($pool:expr, $tx:ident, $options:expr, $body:block) => {{
        let $tx = ($pool).transaction($options).await?;

        let __pgsa_tx_body_result = async { $body }.await;
        match __pgsa_tx_body_result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(error) => match $tx.rollback().await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::PgsaError::Transaction(format!(
                    "{error} (rollback failed: {rollback_err})"
                ))),
            },
        }
    }};
}

/// Transaction isolation levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

/// How a transaction is opened.
///
/// The default is a plain `BEGIN`: the server's default isolation, read-write,
/// not deferrable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionOptions {
    pub isolation: Option<IsolationLevel>,
    pub read_only: bool,
    pub deferrable: bool,
}

impl TransactionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = Some(level);
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn deferrable(mut self, deferrable: bool) -> Self {
        self.deferrable = deferrable;
        self
    }

    /// Read-only serializable, as used for cursors.
    pub fn read_only_serializable() -> Self {
        Self::new()
            .isolation(IsolationLevel::Serializable)
            .read_only(true)
    }

    /// The `BEGIN` statement for these options.
    pub fn begin_sql(&self) -> String {
        let mut sql = String::from("BEGIN");
        if let Some(level) = self.isolation {
            sql.push_str(" ISOLATION LEVEL ");
            sql.push_str(level.as_sql());
        }
        if self.read_only {
            sql.push_str(" READ ONLY");
        }
        if self.deferrable {
            sql.push_str(" DEFERRABLE");
        }
        sql
    }
}

type PooledConnection = Connection<deadpool_postgres::Client>;

/// A transaction holding a pooled connection until it is closed.
#[must_use = "an open transaction is rolled back when dropped"]
pub struct PooledTransaction {
    conn: Option<PooledConnection>,
    options: TransactionOptions,
}

impl PooledTransaction {
    /// Send `BEGIN` on `conn`.
    ///
    /// If that fails or times out the session state is unknown, so the
    /// connection is detached from the pool before the error is returned.
    pub(crate) async fn begin(conn: PooledConnection, options: TransactionOptions) -> PgsaResult<Self> {
        let sql = options.begin_sql();
        match conn.run(conn.client().batch_execute(&sql)).await {
            Ok(()) => Ok(Self {
                conn: Some(conn),
                options,
            }),
            Err(err) => {
                tracing::warn!(target: "pgsa.pool", error = %err, "BEGIN failed; detaching its connection");
                detach(conn);
                Err(err)
            }
        }
    }

    pub fn options(&self) -> TransactionOptions {
        self.options
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// The connection the transaction runs on.
    pub fn connection(&self) -> PgsaResult<&PooledConnection> {
        self.conn
            .as_ref()
            .ok_or_else(|| PgsaError::Transaction("transaction already closed".to_string()))
    }

    pub fn compile(&self, query: impl Into<Query>) -> PgsaResult<CompiledQuery> {
        self.connection()?.compile(query)
    }

    pub async fn execute(
        &self,
        query: impl Into<Query>,
        args: &[&(dyn ToSql + Sync)],
    ) -> PgsaResult<u64> {
        self.connection()?.execute(query, args).await
    }

    pub async fn fetch(
        &self,
        query: impl Into<Query>,
        args: &[&(dyn ToSql + Sync)],
    ) -> PgsaResult<Vec<Row>> {
        self.connection()?.fetch(query, args).await
    }

    pub async fn fetchrow(
        &self,
        query: impl Into<Query>,
        args: &[&(dyn ToSql + Sync)],
    ) -> PgsaResult<Option<Row>> {
        self.connection()?.fetchrow(query, args).await
    }

    pub async fn fetchval<T>(
        &self,
        query: impl Into<Query>,
        args: &[&(dyn ToSql + Sync)],
    ) -> PgsaResult<T>
    where
        T: for<'a> FromSql<'a>,
    {
        self.connection()?.fetchval(query, args).await
    }

    pub async fn fetch_as<T: FromRow>(
        &self,
        query: impl Into<Query>,
        args: &[&(dyn ToSql + Sync)],
    ) -> PgsaResult<Vec<T>> {
        self.connection()?.fetch_as(query, args).await
    }

    pub async fn insert<T>(
        &self,
        query: impl Into<Query>,
        id_column: &str,
        args: &[&(dyn ToSql + Sync)],
    ) -> PgsaResult<T>
    where
        T: for<'a> FromSql<'a>,
    {
        self.connection()?.insert(query, id_column, args).await
    }

    pub async fn prepare(
        &self,
        query: impl Into<Query>,
    ) -> PgsaResult<PreparedQuery<'_, deadpool_postgres::Client>> {
        self.connection()?.prepare(query).await
    }

    pub async fn cursor(
        &self,
        query: impl Into<Query>,
        args: &[&(dyn ToSql + Sync)],
        prefetch: u32,
    ) -> PgsaResult<QueryCursor<'_>> {
        self.connection()?.cursor(query, args, prefetch).await
    }

    pub async fn stream(
        &self,
        query: impl Into<Query>,
        args: &[&(dyn ToSql + Sync)],
    ) -> PgsaResult<RowStream> {
        self.connection()?.stream(query, args).await
    }

    /// Declare a cursor that owns this transaction.
    ///
    /// The transaction is rolled back if the declaration fails.
    pub async fn into_cursor(
        self,
        query: impl Into<Query>,
        args: &[&(dyn ToSql + Sync)],
        prefetch: u32,
    ) -> PgsaResult<QueryCursor<'static>> {
        QueryCursor::declare_owned(self, query.into(), args, prefetch).await
    }

    /// Commit, then release the connection.
    pub async fn commit(mut self) -> PgsaResult<()> {
        self.close("COMMIT").await
    }

    /// Roll back, then release the connection.
    pub async fn rollback(mut self) -> PgsaResult<()> {
        self.close("ROLLBACK").await
    }

    /// Roll back after `error`, folding a rollback failure into the result.
    pub(crate) async fn abort(self, error: PgsaError) -> PgsaError {
        match self.rollback().await {
            Ok(()) => error,
            Err(rollback_err) => {
                PgsaError::Transaction(format!("{error} (rollback failed: {rollback_err})"))
            }
        }
    }

    async fn close(&mut self, sql: &str) -> PgsaResult<()> {
        let result = {
            let conn = self.connection()?;
            conn.run(conn.client().batch_execute(sql)).await
        };
        let conn = self.conn.take();
        match result {
            Ok(()) => {
                drop(conn);
                Ok(())
            }
            Err(err) => {
                if let Some(conn) = conn {
                    detach(conn);
                }
                Err(err)
            }
        }
    }
}

impl Drop for PooledTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::warn!(
                target: "pgsa.pool",
                "transaction dropped without commit or rollback; detaching its connection"
            );
            detach(conn);
        }
    }
}

impl std::fmt::Debug for PooledTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledTransaction")
            .field("open", &self.is_open())
            .field("options", &self.options)
            .finish()
    }
}

/// Remove a connection from the pool and close it.
fn detach(conn: PooledConnection) {
    drop(deadpool_postgres::Object::take(conn.into_inner()));
}
