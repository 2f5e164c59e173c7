//! Server-side cursors with batched fetching.

use crate::client::GenericClient;
use crate::connection::{Connection, bind};
use crate::error::{PgsaError, PgsaResult};
use crate::stmt::Query;
use crate::transaction::PooledTransaction;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

/// Rows fetched per round trip unless configured otherwise.
pub const DEFAULT_PREFETCH: u32 = 50;

static CURSOR_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_cursor_name() -> String {
    let n = CURSOR_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("pgsa_cursor_{n}")
}

enum Host<'c, C> {
    /// A connection already inside a transaction block.
    Borrowed(&'c Connection<C>),
    /// A transaction opened for this cursor alone.
    Owned(PooledTransaction),
}

/// A `DECLARE`d cursor read in batches of `prefetch` rows.
///
/// ```ignore
/// let mut cursor = pg.query(users.select()).prefetch(100).cursor().await?;
/// while let Some(row) = cursor.next().await? {
///     // ...
/// }
/// cursor.close().await?;
/// ```
#[must_use = "cursors should be closed with `close()`"]
pub struct QueryCursor<'c, C = deadpool_postgres::Client> {
    host: Option<Host<'c, C>>,
    name: String,
    prefetch: u32,
    buffer: VecDeque<Row>,
    exhausted: bool,
}

impl<'c, C: GenericClient> QueryCursor<'c, C> {
    pub(crate) async fn declare(
        conn: &'c Connection<C>,
        query: Query,
        args: &[&(dyn ToSql + Sync)],
        prefetch: u32,
    ) -> PgsaResult<Self> {
        let name = next_cursor_name();
        declare_on(conn, &name, query, args).await?;
        Ok(Self::new(Host::Borrowed(conn), name, prefetch))
    }

    fn new(host: Host<'c, C>, name: String, prefetch: u32) -> Self {
        let prefetch = prefetch.max(1);
        Self {
            host: Some(host),
            name,
            prefetch,
            buffer: VecDeque::with_capacity(prefetch as usize),
            exhausted: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefetch(&self) -> u32 {
        self.prefetch
    }

    /// The next row, or `None` once the result set is exhausted.
    pub async fn next(&mut self) -> PgsaResult<Option<Row>> {
        if self.buffer.is_empty() && !self.exhausted {
            let sql = format!("FETCH FORWARD {} FROM {}", self.prefetch, self.name);
            let rows = match &self.host {
                Some(Host::Borrowed(conn)) => conn.fetch(sql, &[]).await?,
                Some(Host::Owned(tx)) => tx.fetch(sql, &[]).await?,
                None => return Err(closed()),
            };
            self.exhausted = rows.len() < self.prefetch as usize;
            self.buffer.extend(rows);
        }
        Ok(self.buffer.pop_front())
    }

    /// Close the cursor, and its transaction when it owns one.
    pub async fn close(mut self) -> PgsaResult<()> {
        let sql = format!("CLOSE {}", self.name);
        match self.host.take() {
            Some(Host::Borrowed(conn)) => conn.execute(sql, &[]).await.map(drop),
            Some(Host::Owned(tx)) => match tx.execute(sql, &[]).await {
                Ok(_) => tx.commit().await,
                Err(err) => Err(tx.abort(err).await),
            },
            None => Err(closed()),
        }
    }
}

impl QueryCursor<'static> {
    pub(crate) async fn declare_owned(
        tx: PooledTransaction,
        query: Query,
        args: &[&(dyn ToSql + Sync)],
        prefetch: u32,
    ) -> PgsaResult<Self> {
        let name = next_cursor_name();
        let declared = match tx.connection() {
            Ok(conn) => declare_on(conn, &name, query, args).await,
            Err(err) => Err(err),
        };
        match declared {
            Ok(()) => Ok(Self::new(Host::Owned(tx), name, prefetch)),
            Err(err) => Err(tx.abort(err).await),
        }
    }
}

impl<C> Drop for QueryCursor<'_, C> {
    fn drop(&mut self) {
        if self.host.is_some() {
            tracing::warn!(target: "pgsa.pool", cursor = %self.name, "cursor dropped without close");
        }
    }
}

impl<C> std::fmt::Debug for QueryCursor<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCursor")
            .field("name", &self.name)
            .field("prefetch", &self.prefetch)
            .field("buffered", &self.buffer.len())
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

async fn declare_on<C: GenericClient>(
    conn: &Connection<C>,
    name: &str,
    query: Query,
    args: &[&(dyn ToSql + Sync)],
) -> PgsaResult<()> {
    let compiled = conn.compile(query)?;
    let sql = format!("DECLARE {name} NO SCROLL CURSOR FOR {}", compiled.sql());
    let params = bind(&compiled, args);
    conn.execute(sql, &params).await?;
    Ok(())
}

fn closed() -> PgsaError {
    PgsaError::Transaction("cursor already closed".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_names_are_unique() {
        let a = next_cursor_name();
        let b = next_cursor_name();
        assert_ne!(a, b);
        assert!(a.starts_with("pgsa_cursor_"));
    }
}
