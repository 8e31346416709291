use crate::error::{ModelError, ModelResult};
use crate::row::FromRow;
use crate::value::Record;
use tokio_postgres::Row;

/// What a terminal call on [`PgQueryBuilder`](super::PgQueryBuilder) returns.
#[derive(Debug)]
pub struct QueryResponse {
    sql: String,
    rows: Vec<Row>,
    affected_rows: u64,
    count: Option<i64>,
}

impl QueryResponse {
    pub(crate) fn from_rows(sql: String, rows: Vec<Row>) -> Self {
        Self {
            sql,
            affected_rows: rows.len() as u64,
            rows,
            count: None,
        }
    }

    pub(crate) fn from_affected(sql: String, affected_rows: u64) -> Self {
        Self {
            sql,
            rows: Vec::new(),
            affected_rows,
            count: None,
        }
    }

    /// Read `COUNT(*)` out of the single row a count query returns.
    pub(crate) fn into_count(mut self) -> ModelResult<Self> {
        let count = match self.rows.first() {
            Some(row) => row
                .try_get::<_, i64>(0)
                .map_err(|e| ModelError::decode("count", e.to_string()))?,
            None => 0,
        };
        self.count = Some(count);
        Ok(self)
    }

    /// The SQL that was executed, with `$n` placeholders.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Rows returned by the statement.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn first_row(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Rows inserted, updated, deleted or returned.
    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    /// The result of a `count()` terminal; `None` for every other call.
    pub fn count(&self) -> Option<i64> {
        self.count
    }

    /// Map every row to `T`.
    pub fn rows_as<T: FromRow>(&self) -> ModelResult<Vec<T>> {
        self.rows.iter().map(T::from_row).collect()
    }

    /// Map the first row to `T`, if there is one.
    pub fn first_as<T: FromRow>(&self) -> ModelResult<Option<T>> {
        self.rows.first().map(T::from_row).transpose()
    }

    /// Every row as a column → value map.
    pub fn records(&self) -> ModelResult<Vec<Record>> {
        self.rows_as()
    }
}
