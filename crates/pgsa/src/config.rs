//! Pool configuration.

use crate::dialect::Dialect;
use crate::error::{PgsaError, PgsaResult};
use deadpool_postgres::RecyclingMethod;
use std::time::Duration;

/// Default number of pooled connections.
pub const DEFAULT_MAX_SIZE: usize = 10;

/// Configuration for [`create_pool`](crate::create_pool) and
/// [`Pg::init`](crate::Pg::init).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// libpq-style connection string or URL.
    pub database_url: String,
    /// Maximum number of pooled connections.
    pub max_size: usize,
    /// How long `acquire` waits for a free connection. `None` waits forever.
    pub acquire_timeout: Option<Duration>,
    /// Per-query timeout. `None` means no timeout (default).
    pub query_timeout: Option<Duration>,
    /// How connections are checked before being handed out again.
    pub recycling_method: RecyclingMethod,
    /// Dialect used to compile every query run through the pool.
    pub dialect: Dialect,
}

impl PoolConfig {
    /// Create a configuration with defaults for everything but the URL.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_size: DEFAULT_MAX_SIZE,
            acquire_timeout: None,
            query_timeout: None,
            recycling_method: RecyclingMethod::Fast,
            dialect: Dialect::postgres(),
        }
    }

    /// Build a configuration from `DATABASE_URL` and, if set,
    /// `PGSA_POOL_MAX_SIZE`.
    pub fn from_env() -> PgsaResult<Self> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| PgsaError::Connection("DATABASE_URL is not set".to_string()))?;
        let mut config = Self::new(url);
        if let Ok(raw) = std::env::var("PGSA_POOL_MAX_SIZE") {
            config.max_size = parse_max_size(&raw)?;
        }
        Ok(config)
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    /// Set the query timeout duration.
    ///
    /// Queries exceeding this duration are cancelled on the server and fail
    /// with [`PgsaError::Timeout`].
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    pub fn with_recycling_method(mut self, method: RecyclingMethod) -> Self {
        self.recycling_method = method;
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }
}

fn parse_max_size(raw: &str) -> PgsaResult<usize> {
    match raw.trim().parse::<usize>() {
        Ok(0) | Err(_) => Err(PgsaError::Pool(format!(
            "PGSA_POOL_MAX_SIZE must be a positive integer, got '{raw}'"
        ))),
        Ok(n) => Ok(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PoolConfig::new("postgres://localhost/app");
        assert_eq!(config.max_size, DEFAULT_MAX_SIZE);
        assert!(config.query_timeout.is_none());
        assert!(config.acquire_timeout.is_none());
        assert_eq!(config.recycling_method, RecyclingMethod::Fast);
        assert_eq!(config.dialect, Dialect::postgres());
    }

    #[test]
    fn builder_setters() {
        let config = PoolConfig::new("postgres://localhost/app")
            .with_max_size(3)
            .with_query_timeout(Duration::from_secs(2))
            .with_acquire_timeout(Duration::from_millis(500))
            .with_recycling_method(RecyclingMethod::Verified)
            .with_dialect(Dialect::postgres().implicit_returning(false));
        assert_eq!(config.max_size, 3);
        assert_eq!(config.query_timeout, Some(Duration::from_secs(2)));
        assert_eq!(config.acquire_timeout, Some(Duration::from_millis(500)));
        assert_eq!(config.recycling_method, RecyclingMethod::Verified);
        assert!(!config.dialect.implicit_returning);
    }

    #[test]
    fn max_size_parsing() {
        assert_eq!(parse_max_size(" 4 ").unwrap(), 4);
        assert!(parse_max_size("0").is_err());
        assert!(parse_max_size("many").is_err());
    }
}
