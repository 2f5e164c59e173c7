//! Row mapping traits and utilities

use crate::error::{PgsaError, PgsaResult};
use tokio_postgres::Row;
use tokio_postgres::types::FromSql;

/// Trait for converting a database row into a Rust struct.
///
/// # Example
///
/// ```
/// use pgsa::{FromRow, PgsaResult, RowExt};
/// use tokio_postgres::Row;
///
/// struct User {
///     id: i32,
///     name: String,
/// }
///
/// impl FromRow for User {
///     fn from_row(row: &Row) -> PgsaResult<Self> {
///         Ok(Self {
///             id: row.try_get_column("id")?,
///             name: row.try_get_column("name")?,
///         })
///     }
/// }
/// ```
pub trait FromRow: Sized {
    /// Convert a database row into Self
    fn from_row(row: &Row) -> PgsaResult<Self>;
}

/// Extension trait for Row to provide typed access
pub trait RowExt {
    /// Try to get a column value, returning `PgsaError::Decode` on failure
    fn try_get_column<T>(&self, column: &str) -> PgsaResult<T>
    where
        T: for<'a> FromSql<'a>;

    /// Try to get a column value by position, returning `PgsaError::Decode` on failure
    fn try_get_at<T>(&self, index: usize) -> PgsaResult<T>
    where
        T: for<'a> FromSql<'a>;
}

impl RowExt for Row {
    fn try_get_column<T>(&self, column: &str) -> PgsaResult<T>
    where
        T: for<'a> FromSql<'a>,
    {
        self.try_get(column)
            .map_err(|e| PgsaError::decode(column, e.to_string()))
    }

    fn try_get_at<T>(&self, index: usize) -> PgsaResult<T>
    where
        T: for<'a> FromSql<'a>,
    {
        self.try_get(index).map_err(|e| {
            let column = self
                .columns()
                .get(index)
                .map_or_else(|| index.to_string(), |c| c.name().to_string());
            PgsaError::decode(column, e.to_string())
        })
    }
}
