//! Error types for pgsa

use thiserror::Error;

/// Result type alias for pgsa operations
pub type PgsaResult<T> = Result<T, PgsaError>;

/// Error types for compilation and database operations
#[derive(Debug, Error)]
pub enum PgsaError {
    /// A named placeholder in the rendered SQL has no value.
    #[error("Missing parameter: no value bound for placeholder ':{name}'")]
    MissingParameter { name: String },

    /// The query kind is not acceptable for the requested operation.
    #[error("Invalid query type: {0}")]
    InvalidQueryType(String),

    /// The `Pg` handle was used before `init`.
    #[error("Not initialized: Pg::init() needs to be called before you can make queries")]
    NotInitialized,

    /// The statement could not be rendered for the dialect.
    #[error("Compile error: {0}")]
    Compile(String),

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Pool error
    #[error("Pool error: {0}")]
    Pool(String),

    /// Transaction state error (e.g. rollback failed after another error)
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Query timeout error
    #[error("Query timeout after {0:?}")]
    Timeout(std::time::Duration),
}

impl PgsaError {
    /// Create a missing parameter error for a placeholder name
    pub fn missing_parameter(name: impl Into<String>) -> Self {
        Self::MissingParameter { name: name.into() }
    }

    /// Create an invalid query type error
    pub fn invalid_query_type(message: impl Into<String>) -> Self {
        Self::InvalidQueryType(message.into())
    }

    /// Create a compile error
    pub fn compile(message: impl Into<String>) -> Self {
        Self::Compile(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Check if this is a missing parameter error
    pub fn is_missing_parameter(&self) -> bool {
        matches!(self, Self::MissingParameter { .. })
    }

    /// Check if this is a not initialized error
    pub fn is_not_initialized(&self) -> bool {
        matches!(self, Self::NotInitialized)
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Parse a tokio_postgres error into a more specific PgsaError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        }
        Self::Query(err)
    }
}

impl From<deadpool_postgres::PoolError> for PgsaError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_parameter_names_the_key() {
        let err = PgsaError::missing_parameter("user_id");
        assert!(err.is_missing_parameter());
        assert_eq!(
            err.to_string(),
            "Missing parameter: no value bound for placeholder ':user_id'"
        );
    }

    #[test]
    fn not_initialized_message() {
        let err = PgsaError::NotInitialized;
        assert!(err.is_not_initialized());
        assert!(err.to_string().contains("Pg::init()"));
    }
}
