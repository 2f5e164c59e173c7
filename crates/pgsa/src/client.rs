//! Generic client trait for unified database access.

use crate::error::{PgsaError, PgsaResult};
use futures_core::Stream;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Row, Statement};

/// A trait that unifies database clients and transactions.
///
/// [`Connection`](crate::Connection) is generic over this, so the same
/// compile-and-execute surface works on a bare `tokio_postgres::Client`, a
/// pooled `deadpool_postgres::Client` or an open `tokio_postgres::Transaction`.
pub trait GenericClient: Send + Sync {
    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl Future<Output = PgsaResult<Vec<Row>>> + Send;

    /// Execute a query and return the first row, if any.
    ///
    /// Extra rows are ignored.
    fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl Future<Output = PgsaResult<Option<Row>>> + Send {
        async move {
            let rows = self.query(sql, params).await?;
            Ok(rows.into_iter().next())
        }
    }

    /// Execute a statement and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl Future<Output = PgsaResult<u64>> + Send;

    /// Run one or more statements with the simple query protocol.
    ///
    /// Used for transaction and cursor control (`BEGIN`, `COMMIT`, `CLOSE`).
    fn batch_execute(&self, sql: &str) -> impl Future<Output = PgsaResult<()>> + Send;

    /// Return a cancellation token for the underlying connection, if supported.
    ///
    /// Used for best-effort server-side cancellation when a query timeout fires.
    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        None
    }

    /// Prepare a statement on this connection.
    ///
    /// Prepared statements are **per-connection** and must not be used across connections.
    fn prepare_statement(&self, sql: &str) -> impl Future<Output = PgsaResult<Statement>> + Send;

    /// Execute a prepared statement and return all rows.
    fn query_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl Future<Output = PgsaResult<Vec<Row>>> + Send;

    /// Execute a prepared statement and return affected row count.
    fn execute_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl Future<Output = PgsaResult<u64>> + Send;
}

impl GenericClient for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> PgsaResult<Vec<Row>> {
        tokio_postgres::Client::query(self, sql, params)
            .await
            .map_err(PgsaError::from_db_error)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> PgsaResult<u64> {
        tokio_postgres::Client::execute(self, sql, params)
            .await
            .map_err(PgsaError::from_db_error)
    }

    async fn batch_execute(&self, sql: &str) -> PgsaResult<()> {
        tokio_postgres::Client::batch_execute(self, sql)
            .await
            .map_err(PgsaError::from_db_error)
    }

    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        Some(tokio_postgres::Client::cancel_token(self))
    }

    async fn prepare_statement(&self, sql: &str) -> PgsaResult<Statement> {
        tokio_postgres::Client::prepare(self, sql)
            .await
            .map_err(PgsaError::from_db_error)
    }

    async fn query_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> PgsaResult<Vec<Row>> {
        tokio_postgres::Client::query(self, stmt, params)
            .await
            .map_err(PgsaError::from_db_error)
    }

    async fn execute_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> PgsaResult<u64> {
        tokio_postgres::Client::execute(self, stmt, params)
            .await
            .map_err(PgsaError::from_db_error)
    }
}

impl GenericClient for tokio_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> PgsaResult<Vec<Row>> {
        tokio_postgres::Transaction::query(self, sql, params)
            .await
            .map_err(PgsaError::from_db_error)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> PgsaResult<u64> {
        tokio_postgres::Transaction::execute(self, sql, params)
            .await
            .map_err(PgsaError::from_db_error)
    }

    async fn batch_execute(&self, sql: &str) -> PgsaResult<()> {
        tokio_postgres::Transaction::batch_execute(self, sql)
            .await
            .map_err(PgsaError::from_db_error)
    }

    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        Some(tokio_postgres::Transaction::cancel_token(self))
    }

    async fn prepare_statement(&self, sql: &str) -> PgsaResult<Statement> {
        tokio_postgres::Transaction::prepare(self, sql)
            .await
            .map_err(PgsaError::from_db_error)
    }

    async fn query_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> PgsaResult<Vec<Row>> {
        tokio_postgres::Transaction::query(self, stmt, params)
            .await
            .map_err(PgsaError::from_db_error)
    }

    async fn execute_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> PgsaResult<u64> {
        tokio_postgres::Transaction::execute(self, stmt, params)
            .await
            .map_err(PgsaError::from_db_error)
    }
}

// ===== deadpool-postgres support =====

/// Implements [`GenericClient`] by delegating to the deref target.
macro_rules! impl_generic_client_via_deref {
    ($($ty:ty),* $(,)?) => {
        $(
            impl GenericClient for $ty {
                async fn query(
                    &self,
                    sql: &str,
                    params: &[&(dyn ToSql + Sync)],
                ) -> PgsaResult<Vec<Row>> {
                    GenericClient::query(&**self, sql, params).await
                }

                async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> PgsaResult<u64> {
                    GenericClient::execute(&**self, sql, params).await
                }

                async fn batch_execute(&self, sql: &str) -> PgsaResult<()> {
                    GenericClient::batch_execute(&**self, sql).await
                }

                fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
                    GenericClient::cancel_token(&**self)
                }

                async fn prepare_statement(&self, sql: &str) -> PgsaResult<Statement> {
                    GenericClient::prepare_statement(&**self, sql).await
                }

                async fn query_prepared(
                    &self,
                    stmt: &Statement,
                    params: &[&(dyn ToSql + Sync)],
                ) -> PgsaResult<Vec<Row>> {
                    GenericClient::query_prepared(&**self, stmt, params).await
                }

                async fn execute_prepared(
                    &self,
                    stmt: &Statement,
                    params: &[&(dyn ToSql + Sync)],
                ) -> PgsaResult<u64> {
                    GenericClient::execute_prepared(&**self, stmt, params).await
                }
            }

            impl StreamingClient for $ty {
                async fn query_stream(
                    &self,
                    sql: &str,
                    params: &[&(dyn ToSql + Sync)],
                ) -> PgsaResult<RowStream> {
                    StreamingClient::query_stream(&**self, sql, params).await
                }
            }
        )*
    };
}

impl_generic_client_via_deref!(deadpool_postgres::Client, deadpool_postgres::ClientWrapper);

// ===== Reference implementations =====

impl<C: GenericClient> GenericClient for &C {
    fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl Future<Output = PgsaResult<Vec<Row>>> + Send {
        (*self).query(sql, params)
    }

    fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl Future<Output = PgsaResult<Option<Row>>> + Send {
        (*self).query_opt(sql, params)
    }

    fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl Future<Output = PgsaResult<u64>> + Send {
        (*self).execute(sql, params)
    }

    fn batch_execute(&self, sql: &str) -> impl Future<Output = PgsaResult<()>> + Send {
        (*self).batch_execute(sql)
    }

    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        (*self).cancel_token()
    }

    fn prepare_statement(&self, sql: &str) -> impl Future<Output = PgsaResult<Statement>> + Send {
        (*self).prepare_statement(sql)
    }

    fn query_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl Future<Output = PgsaResult<Vec<Row>>> + Send {
        (*self).query_prepared(stmt, params)
    }

    fn execute_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl Future<Output = PgsaResult<u64>> + Send {
        (*self).execute_prepared(stmt, params)
    }
}

/// A stream of database rows.
///
/// Type-erased so that every [`StreamingClient`] returns the same type.
#[must_use]
pub struct RowStream {
    inner: Pin<Box<dyn Stream<Item = PgsaResult<Row>> + Send>>,
}

impl RowStream {
    /// Create a new `RowStream` from any compatible stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = PgsaResult<Row>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }
}

impl Stream for RowStream {
    type Item = PgsaResult<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// Streaming query support.
///
/// Kept apart from [`GenericClient`] so only clients that can stream rows
/// through `query_raw` need to implement it.
pub trait StreamingClient: GenericClient {
    /// Execute a query and return a `RowStream` for incremental consumption.
    fn query_stream(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl Future<Output = PgsaResult<RowStream>> + Send;
}

struct MapDbRowStream<S> {
    inner: Pin<Box<S>>,
}

impl<S> MapDbRowStream<S> {
    fn new(stream: S) -> Self {
        Self {
            inner: Box::pin(stream),
        }
    }
}

impl<S> Stream for MapDbRowStream<S>
where
    S: Stream<Item = Result<Row, tokio_postgres::Error>> + Send + 'static,
{
    type Item = PgsaResult<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner
            .as_mut()
            .poll_next(cx)
            .map(|item| item.map(|row| row.map_err(PgsaError::from_db_error)))
    }
}

impl StreamingClient for tokio_postgres::Client {
    async fn query_stream(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> PgsaResult<RowStream> {
        let stream = tokio_postgres::Client::query_raw(self, sql, params.iter().copied())
            .await
            .map_err(PgsaError::from_db_error)?;
        Ok(RowStream::new(MapDbRowStream::new(stream)))
    }
}

impl StreamingClient for tokio_postgres::Transaction<'_> {
    async fn query_stream(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> PgsaResult<RowStream> {
        let stream = tokio_postgres::Transaction::query_raw(self, sql, params.iter().copied())
            .await
            .map_err(PgsaError::from_db_error)?;
        Ok(RowStream::new(MapDbRowStream::new(stream)))
    }
}

impl<C: StreamingClient> StreamingClient for &C {
    fn query_stream(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl Future<Output = PgsaResult<RowStream>> + Send {
        (*self).query_stream(sql, params)
    }
}
