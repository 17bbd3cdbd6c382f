use thiserror::Error;

pub type DbPoolType = sqlx::SqlitePool;
pub type DbContext = DbPoolType;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    ConnectionFailed(sqlx::Error),

    #[error("Database operation failed: {0}")]
    OperationFailed(sqlx::Error),

    #[error("Row not found")]
    RowNotFound,

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),
}

impl From<sqlx::Error> for DbError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => Self::RowNotFound,
            sqlx::Error::Database(ref e) if e.is_unique_violation() => Self::UniqueViolation(e.message().to_string()),
            sqlx::Error::Database(ref e) if e.is_foreign_key_violation() => {
                Self::ForeignKeyViolation(e.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => Self::ConnectionFailed(error),
            _ => Self::OperationFailed(error),
        }
    }
}

impl DbError {
    /// True when a unique violation names the given column, e.g. `users.email`.
    #[must_use]
    pub fn violates(&self, column: &str) -> bool {
        matches!(self, Self::UniqueViolation(message) if message.contains(column))
    }
}

/// Turns a zero-row update or delete into `RowNotFound`.
pub fn affected(rows: u64) -> Result<(), DbError> {
    if rows == 0 { Err(DbError::RowNotFound) } else { Ok(()) }
}
