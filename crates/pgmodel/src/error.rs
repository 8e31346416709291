//! Errors surfaced by terminal query calls.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

/// Everything a terminal call can fail with.
///
/// Chaining methods never fail; problems with the chain, the registry or the
/// database are all reported by the terminal call that needs them.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The session's registry entry holds no connection.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The database could not be reached, or a connection URL was malformed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The statement failed for a reason not classified below.
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// A column value could not be read back.
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// The accumulated clauses cannot be rendered into a statement.
    #[error("Validation error: {0}")]
    Validation(String),

    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),
}

impl ModelError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Whether the database rejected the statement because of a constraint.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::UniqueViolation(_) | Self::ForeignKeyViolation(_) | Self::CheckViolation(_)
        )
    }

    /// Classify a driver error by SQLSTATE.
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        let classified = err.as_db_error().and_then(|db| {
            let detail = format!("{}: {}", db.constraint().unwrap_or("unknown"), db.message());
            match db.code().code() {
                "23505" => Some(Self::UniqueViolation(detail)),
                "23503" => Some(Self::ForeignKeyViolation(detail)),
                "23514" => Some(Self::CheckViolation(detail)),
                _ => None,
            }
        });
        classified.unwrap_or_else(|| Self::Query(err))
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for ModelError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}
