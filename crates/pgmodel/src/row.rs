//! Reading rows returned by PostgreSQL terminals.

use crate::error::{ModelError, ModelResult};
use crate::value::{Record, Value};
use tokio_postgres::Row;

/// Build a value from one result row.
///
/// Used by [`QueryResponse::rows_as`](crate::pg::QueryResponse::rows_as) to
/// map the rows a terminal call returned.
///
/// # Example
///
/// ```ignore
/// use pgmodel::{FromRow, ModelResult, RowExt};
///
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// impl FromRow for User {
///     fn from_row(row: &tokio_postgres::Row) -> ModelResult<Self> {
///         Ok(Self {
///             id: row.try_get_column("id")?,
///             name: row.try_get_column("name")?,
///         })
///     }
/// }
/// ```
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> ModelResult<Self>;
}

/// Any row maps to a [`Record`] keyed by column name.
impl FromRow for Record {
    fn from_row(row: &Row) -> ModelResult<Self> {
        row.columns()
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let value: Value = row
                    .try_get(idx)
                    .map_err(|e| ModelError::decode(column.name(), e.to_string()))?;
                Ok((column.name().to_string(), value))
            })
            .collect()
    }
}

/// Typed column access with [`ModelError::Decode`] errors.
pub trait RowExt {
    fn try_get_column<T>(&self, column: &str) -> ModelResult<T>
    where
        T: for<'a> tokio_postgres::types::FromSql<'a>;
}

impl RowExt for Row {
    fn try_get_column<T>(&self, column: &str) -> ModelResult<T>
    where
        T: for<'a> tokio_postgres::types::FromSql<'a>,
    {
        self.try_get(column)
            .map_err(|e| ModelError::decode(column, e.to_string()))
    }
}
