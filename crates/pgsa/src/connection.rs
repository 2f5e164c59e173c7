//! A client paired with a query compiler.

use crate::client::{GenericClient, RowStream, StreamingClient};
use crate::compile::{CompiledQuery, Compiler};
use crate::cursor::QueryCursor;
use crate::error::{PgsaError, PgsaResult};
use crate::row::{FromRow, RowExt};
use crate::stmt::{Query, Statement};
use crate::value::Value;
use std::future::Future;
use std::time::Duration;
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, ToSql};

/// A database client that compiles every query before running it.
///
/// Each method takes anything convertible into a [`Query`] plus positional
/// `args`. A compiled statement carries its own parameters; `args` are only
/// used when compilation produced none, which is the case for raw SQL.
///
/// ```ignore
/// let conn = pool.acquire().await?;
/// let rows = conn.fetch(users.select().filter(Expr::eq("name", "alice")), &[]).await?;
/// let n: i64 = conn.fetchval("SELECT count(*) FROM users WHERE age > $1", &[&30_i32]).await?;
/// ```
pub struct Connection<C> {
    client: C,
    compiler: Compiler,
    query_timeout: Option<Duration>,
}

impl<C> Connection<C> {
    pub fn new(client: C, compiler: Compiler) -> Self {
        Self {
            client,
            compiler,
            query_timeout: None,
        }
    }

    /// Set the per-query timeout. `None` disables it.
    pub fn with_query_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout
    }

    pub fn into_inner(self) -> C {
        self.client
    }

    /// Compile a query with this connection's dialect.
    pub fn compile(&self, query: impl Into<Query>) -> PgsaResult<CompiledQuery> {
        self.compiler.compile(&mut query.into())
    }
}

impl<C: GenericClient> Connection<C> {
    /// Execute a statement and return the number of affected rows.
    pub async fn execute(
        &self,
        query: impl Into<Query>,
        args: &[&(dyn ToSql + Sync)],
    ) -> PgsaResult<u64> {
        let compiled = self.compile(query)?;
        let params = bind(&compiled, args);
        self.run(self.client.execute(compiled.sql(), &params)).await
    }

    /// Run a query and return all rows.
    pub async fn fetch(
        &self,
        query: impl Into<Query>,
        args: &[&(dyn ToSql + Sync)],
    ) -> PgsaResult<Vec<Row>> {
        let compiled = self.compile(query)?;
        let params = bind(&compiled, args);
        self.run(self.client.query(compiled.sql(), &params)).await
    }

    /// Run a query and return the first row, if any.
    pub async fn fetchrow(
        &self,
        query: impl Into<Query>,
        args: &[&(dyn ToSql + Sync)],
    ) -> PgsaResult<Option<Row>> {
        let compiled = self.compile(query)?;
        let params = bind(&compiled, args);
        self.run(self.client.query_opt(compiled.sql(), &params)).await
    }

    /// Run a query and decode the first column of the first row.
    ///
    /// Fails with [`PgsaError::NotFound`] when the query returns no rows; use
    /// an `Option<T>` target for nullable columns.
    pub async fn fetchval<T>(
        &self,
        query: impl Into<Query>,
        args: &[&(dyn ToSql + Sync)],
    ) -> PgsaResult<T>
    where
        T: for<'a> FromSql<'a>,
    {
        match self.fetchrow(query, args).await? {
            Some(row) => row.try_get_at(0),
            None => Err(PgsaError::not_found("fetchval: query returned no rows")),
        }
    }

    /// Run a query and map every row with [`FromRow`].
    pub async fn fetch_as<T: FromRow>(
        &self,
        query: impl Into<Query>,
        args: &[&(dyn ToSql + Sync)],
    ) -> PgsaResult<Vec<T>> {
        self.fetch(query, args)
            .await?
            .iter()
            .map(T::from_row)
            .collect()
    }

    /// Run an insert and return the value of `id_column` for the new row.
    ///
    /// Any RETURNING clause already on the statement is replaced.
    pub async fn insert<T>(
        &self,
        query: impl Into<Query>,
        id_column: &str,
        args: &[&(dyn ToSql + Sync)],
    ) -> PgsaResult<T>
    where
        T: for<'a> FromSql<'a>,
    {
        let query = returning_id(query.into(), id_column)?;
        self.fetchval(query, args).await
    }

    /// Compile and prepare a query on this connection.
    ///
    /// The compiled parameters are kept with the prepared statement.
    pub async fn prepare(&self, query: impl Into<Query>) -> PgsaResult<PreparedQuery<'_, C>> {
        let compiled = self.compile(query)?;
        let statement = self
            .run(self.client.prepare_statement(compiled.sql()))
            .await?;
        Ok(PreparedQuery {
            conn: self,
            statement,
            compiled,
        })
    }

    /// Declare a server-side cursor for a query.
    ///
    /// Cursors only live inside a transaction block, so the connection must
    /// already be in one.
    pub async fn cursor(
        &self,
        query: impl Into<Query>,
        args: &[&(dyn ToSql + Sync)],
        prefetch: u32,
    ) -> PgsaResult<QueryCursor<'_, C>> {
        QueryCursor::declare(self, query.into(), args, prefetch).await
    }

    /// Run a future under this connection's query timeout.
    ///
    /// On expiry the query is cancelled on the server in the background and
    /// [`PgsaError::Timeout`] is returned.
    pub(crate) async fn run<T, F>(&self, future: F) -> PgsaResult<T>
    where
        F: Future<Output = PgsaResult<T>> + Send,
    {
        match self.query_timeout {
            Some(timeout) => {
                tokio::pin!(future);
                tokio::select! {
                    result = &mut future => result,
                    _ = tokio::time::sleep(timeout) => {
                        if let Some(cancel_token) = self.client.cancel_token() {
                            tokio::spawn(async move {
                                if let Err(err) = cancel_token.cancel_query(tokio_postgres::NoTls).await {
                                    tracing::warn!(
                                        target: "pgsa.query",
                                        error = %err,
                                        "failed to cancel timed-out query; it may still be running"
                                    );
                                }
                            });
                        }
                        Err(PgsaError::Timeout(timeout))
                    }
                }
            }
            None => future.await,
        }
    }
}

impl<C: StreamingClient> Connection<C> {
    /// Run a query and stream its rows.
    ///
    /// The query timeout covers starting the stream, not consuming it.
    pub async fn stream(
        &self,
        query: impl Into<Query>,
        args: &[&(dyn ToSql + Sync)],
    ) -> PgsaResult<RowStream> {
        let compiled = self.compile(query)?;
        let params = bind(&compiled, args);
        self.run(self.client.query_stream(compiled.sql(), &params))
            .await
    }
}

impl<C> std::fmt::Debug for Connection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("compiler", &self.compiler)
            .field("query_timeout", &self.query_timeout)
            .finish_non_exhaustive()
    }
}

/// A statement prepared on a [`Connection`], with its compiled parameters.
pub struct PreparedQuery<'c, C> {
    conn: &'c Connection<C>,
    statement: tokio_postgres::Statement,
    compiled: CompiledQuery,
}

impl<C: GenericClient> PreparedQuery<'_, C> {
    pub fn sql(&self) -> &str {
        self.compiled.sql()
    }

    pub fn params(&self) -> &[Value] {
        self.compiled.params()
    }

    pub fn statement(&self) -> &tokio_postgres::Statement {
        &self.statement
    }

    pub async fn fetch(&self, args: &[&(dyn ToSql + Sync)]) -> PgsaResult<Vec<Row>> {
        let params = bind(&self.compiled, args);
        self.conn
            .run(self.conn.client.query_prepared(&self.statement, &params))
            .await
    }

    pub async fn fetchrow(&self, args: &[&(dyn ToSql + Sync)]) -> PgsaResult<Option<Row>> {
        Ok(self.fetch(args).await?.into_iter().next())
    }

    pub async fn fetchval<T>(&self, args: &[&(dyn ToSql + Sync)]) -> PgsaResult<T>
    where
        T: for<'a> FromSql<'a>,
    {
        match self.fetchrow(args).await? {
            Some(row) => row.try_get_at(0),
            None => Err(PgsaError::not_found("fetchval: query returned no rows")),
        }
    }

    pub async fn execute(&self, args: &[&(dyn ToSql + Sync)]) -> PgsaResult<u64> {
        let params = bind(&self.compiled, args);
        self.conn
            .run(self.conn.client.execute_prepared(&self.statement, &params))
            .await
    }
}

/// Compiled parameters win; fallback `args` are used only when there are none.
pub(crate) fn bind<'a>(
    compiled: &'a CompiledQuery,
    args: &'a [&'a (dyn ToSql + Sync)],
) -> Vec<&'a (dyn ToSql + Sync)> {
    if compiled.params().is_empty() {
        args.to_vec()
    } else {
        compiled.params_ref()
    }
}

/// Point an insert's RETURNING clause at `id_column`.
pub(crate) fn returning_id(mut query: Query, id_column: &str) -> PgsaResult<Query> {
    let kind = query.kind();
    match &mut query {
        Query::Statement(Statement::Insert(insert)) => {
            insert.set_returning(vec![id_column.to_string()]);
            Ok(query)
        }
        _ => Err(PgsaError::invalid_query_type(format!(
            "insert() needs an insert statement, got {kind}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, SqlType, Table};
    use crate::stmt::TableExt;
    use std::sync::Arc;

    fn things() -> Arc<Table> {
        Arc::new(Table::new(
            "things",
            vec![
                Column::new("id", SqlType::Integer).primary_key(),
                Column::new("label", SqlType::Text),
            ],
        ))
    }

    #[test]
    fn compiled_params_take_precedence() {
        let compiled = CompiledQuery::new("SELECT $1", vec![Value::Int(1)]);
        let fallback = 2_i32;
        let args: [&(dyn ToSql + Sync); 1] = [&fallback];
        let params = bind(&compiled, &args);
        assert_eq!(params.len(), 1);
        assert_eq!(format!("{:?}", params[0]), format!("{:?}", Value::Int(1)));
    }

    #[test]
    fn raw_queries_use_fallback_args() {
        let compiled = CompiledQuery::new("SELECT $1, $2", Vec::new());
        let (a, b) = (1_i32, "x");
        assert_eq!(bind(&compiled, &[&a, &b]).len(), 2);
    }

    #[test]
    fn returning_id_rewrites_insert() {
        let query = returning_id(things().insert().value("label", "x").into(), "id").unwrap();
        let Query::Statement(Statement::Insert(insert)) = &query else {
            panic!("expected an insert");
        };
        assert_eq!(insert.returning_columns(), ["id".to_string()]);
    }

    #[test]
    fn returning_id_rejects_other_statements() {
        let err = returning_id(things().select().into(), "id").unwrap_err();
        assert!(matches!(err, PgsaError::InvalidQueryType(_)));
        let err = returning_id(Query::from("INSERT INTO things DEFAULT VALUES"), "id").unwrap_err();
        assert!(err.to_string().contains("raw"));
    }
}
