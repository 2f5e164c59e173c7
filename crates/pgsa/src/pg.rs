//! The `Pg` lifecycle handle.

use crate::config::PoolConfig;
use crate::connection::returning_id;
use crate::cursor::{DEFAULT_PREFETCH, QueryCursor};
use crate::error::{PgsaError, PgsaResult};
use crate::pool::{Pool, create_pool};
use crate::stmt::Query;
use crate::transaction::{PooledTransaction, TransactionOptions};
use crate::value::Value;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, ToSql};

/// A shareable handle to a pool that may not exist yet.
///
/// Created empty with [`Pg::new`], populated by [`Pg::init`] and emptied by
/// [`Pg::shutdown`]. Every query method fails with
/// [`PgsaError::NotInitialized`] while there is no pool. Clones share state,
/// so one handle can be created at startup and passed to whatever needs it.
///
/// ```ignore
/// let pg = Pg::new();
/// pg.init(PoolConfig::from_env()?).await?;
///
/// let rows = pg.fetch(users.select(), &[]).await?;
/// let id: i32 = pg.insert(users.insert().value("name", "alice"), "id", &[]).await?;
/// ```
#[derive(Clone, Default)]
pub struct Pg {
    pool: Arc<RwLock<Option<Pool>>>,
}

impl Pg {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pool and check that a connection can be made.
    ///
    /// A previously installed pool is closed and replaced.
    pub async fn init(&self, config: PoolConfig) -> PgsaResult<()> {
        let pool = create_pool(config)?;
        drop(pool.acquire().await?);
        self.init_with_pool(pool);
        Ok(())
    }

    /// Install an existing pool, closing any previous one.
    pub fn init_with_pool(&self, pool: Pool) {
        if let Some(previous) = self.write().replace(pool) {
            previous.close();
        }
        tracing::debug!(target: "pgsa.pool", "pool initialized");
    }

    /// Close and remove the pool. A no-op when not initialized.
    pub fn shutdown(&self) {
        if let Some(pool) = self.write().take() {
            pool.close();
            tracing::debug!(target: "pgsa.pool", "pool shut down");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.read().is_some()
    }

    /// The current pool.
    pub fn pool(&self) -> PgsaResult<Pool> {
        self.read().clone().ok_or(PgsaError::NotInitialized)
    }

    /// Start building a query run with [`PendingQuery::fetch_all`] or
    /// [`PendingQuery::cursor`].
    pub fn query(&self, query: impl Into<Query>) -> PendingQuery {
        PendingQuery {
            pg: self.clone(),
            query: query.into(),
            args: Vec::new(),
            prefetch: DEFAULT_PREFETCH,
            timeout: None,
        }
    }

    pub async fn fetch(
        &self,
        query: impl Into<Query>,
        args: &[&(dyn ToSql + Sync)],
    ) -> PgsaResult<Vec<Row>> {
        let conn = self.pool()?.acquire().await?;
        conn.fetch(query, args).await
    }

    pub async fn fetchrow(
        &self,
        query: impl Into<Query>,
        args: &[&(dyn ToSql + Sync)],
    ) -> PgsaResult<Option<Row>> {
        let conn = self.pool()?.acquire().await?;
        conn.fetchrow(query, args).await
    }

    pub async fn fetchval<T>(
        &self,
        query: impl Into<Query>,
        args: &[&(dyn ToSql + Sync)],
    ) -> PgsaResult<T>
    where
        T: for<'a> FromSql<'a>,
    {
        let conn = self.pool()?.acquire().await?;
        conn.fetchval(query, args).await
    }

    pub async fn execute(
        &self,
        query: impl Into<Query>,
        args: &[&(dyn ToSql + Sync)],
    ) -> PgsaResult<u64> {
        let conn = self.pool()?.acquire().await?;
        conn.execute(query, args).await
    }

    /// Run an insert and return the value of `id_column` for the new row.
    ///
    /// Non-insert queries fail with [`PgsaError::InvalidQueryType`] before a
    /// connection is acquired.
    pub async fn insert<T>(
        &self,
        query: impl Into<Query>,
        id_column: &str,
        args: &[&(dyn ToSql + Sync)],
    ) -> PgsaResult<T>
    where
        T: for<'a> FromSql<'a>,
    {
        let pool = self.pool()?;
        let query = returning_id(query.into(), id_column)?;
        let conn = pool.acquire().await?;
        conn.fetchval(query, args).await
    }

    pub async fn transaction(&self, options: TransactionOptions) -> PgsaResult<PooledTransaction> {
        self.pool()?.transaction(options).await
    }

    pub async fn begin(&self) -> PgsaResult<PooledTransaction> {
        self.pool()?.begin().await
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Pool>> {
        self.pool.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Pool>> {
        self.pool.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Pg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pg")
            .field("pool", &*self.read())
            .finish()
    }
}

/// A query bound to a [`Pg`] handle, not yet run.
#[must_use = "a pending query does nothing until `fetch_all` or `cursor` is awaited"]
#[derive(Debug)]
pub struct PendingQuery {
    pg: Pg,
    query: Query,
    args: Vec<Value>,
    prefetch: u32,
    timeout: Option<Duration>,
}

impl PendingQuery {
    /// Append a positional argument, used when the query compiles to no
    /// parameters of its own (raw SQL).
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Rows fetched per round trip by [`cursor`](Self::cursor).
    pub fn prefetch(mut self, prefetch: u32) -> Self {
        self.prefetch = prefetch;
        self
    }

    /// Per-query timeout, overriding the pool's.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Prepare the query on a pooled connection and fetch every row.
    pub async fn fetch_all(self) -> PgsaResult<Vec<Row>> {
        let conn = self.pg.pool()?.acquire().await?;
        let timeout = self.timeout.or(conn.query_timeout());
        let conn = conn.with_query_timeout(timeout);
        let prepared = conn.prepare(self.query).await?;
        prepared.fetch(&value_refs(&self.args)).await
    }

    /// Open a read-only serializable transaction and declare a cursor in it.
    ///
    /// The cursor owns the transaction; [`QueryCursor::close`] ends both.
    pub async fn cursor(self) -> PgsaResult<QueryCursor<'static>> {
        let conn = self.pg.pool()?.acquire().await?;
        let timeout = self.timeout.or(conn.query_timeout());
        let conn = conn.with_query_timeout(timeout);
        let tx = PooledTransaction::begin(conn, TransactionOptions::read_only_serializable()).await?;
        tx.into_cursor(self.query, &value_refs(&self.args), self.prefetch)
            .await
    }
}

fn value_refs(values: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    values.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, SqlType, Table};
    use crate::stmt::TableExt;

    fn lazy_pool() -> Pool {
        create_pool(PoolConfig::new("postgres://postgres@localhost:5432/pgsa")).unwrap()
    }

    #[tokio::test]
    async fn uninitialized_pg_rejects_queries() {
        let pg = Pg::new();
        assert!(!pg.is_initialized());
        assert!(pg.pool().unwrap_err().is_not_initialized());
        assert!(pg.fetch("SELECT 1", &[]).await.unwrap_err().is_not_initialized());
        assert!(pg.execute("SELECT 1", &[]).await.unwrap_err().is_not_initialized());
        assert!(
            pg.fetchval::<i32>("SELECT 1", &[])
                .await
                .unwrap_err()
                .is_not_initialized()
        );
        assert!(pg.begin().await.unwrap_err().is_not_initialized());
        assert!(
            pg.query("SELECT 1")
                .fetch_all()
                .await
                .unwrap_err()
                .is_not_initialized()
        );
        assert!(pg.query("SELECT 1").cursor().await.unwrap_err().is_not_initialized());
    }

    #[tokio::test]
    async fn insert_rejects_non_insert_before_connecting() {
        let pg = Pg::new();
        pg.init_with_pool(lazy_pool());
        let users = Arc::new(Table::new(
            "users",
            vec![Column::new("id", SqlType::Integer).primary_key()],
        ));
        let err = pg.insert::<i32>(users.select(), "id", &[]).await.unwrap_err();
        assert!(matches!(err, PgsaError::InvalidQueryType(_)));
    }

    #[test]
    fn shutdown_is_shared_between_clones() {
        let pg = Pg::new();
        let pool = lazy_pool();
        pg.init_with_pool(pool.clone());
        let other = pg.clone();
        assert!(other.is_initialized());
        other.shutdown();
        assert!(!pg.is_initialized());
        assert!(pool.is_closed());
        pg.shutdown();
    }

    #[test]
    fn reinit_closes_the_previous_pool() {
        let pg = Pg::new();
        let first = lazy_pool();
        pg.init_with_pool(first.clone());
        pg.init_with_pool(lazy_pool());
        assert!(first.is_closed());
        assert!(pg.is_initialized());
    }

    #[test]
    fn pending_query_settings() {
        let pending = Pg::new()
            .query("SELECT $1")
            .bind(1)
            .prefetch(10)
            .timeout(Duration::from_secs(1));
        assert_eq!(pending.args, vec![Value::Int(1)]);
        assert_eq!(pending.prefetch, 10);
        assert_eq!(pending.timeout, Some(Duration::from_secs(1)));
    }
}
