//! PostgreSQL implementation of [`Connection`] and [`QueryBuilder`].
//!
//! ```ignore
//! use pgmodel::pg::PgConnection;
//! use pgmodel::{Registry, Session};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(Registry::new());
//! registry.set("database", PgConnection::new(pgmodel::create_pool(&url)?));
//!
//! let mut session = Session::new(Arc::clone(&registry));
//! let adults = session
//!     .model::<User>()
//!     .filter(("age", ">=", 18))
//!     .all()
//!     .await?
//!     .records()?;
//! ```
//!
//! Filter arguments are interpreted as follows:
//!
//! | arguments                         | renders                  |
//! |-----------------------------------|--------------------------|
//! | `("deleted_at IS NULL",)`         | `(deleted_at IS NULL)`   |
//! | `("age > ? AND age < ?", 18, 65)` | `(age > $1 AND age < $2)`|
//! | `("name", "Amy")`                 | `name = $1`              |
//! | `("name", None::<String>)`        | `name IS NULL`           |
//! | `("age", ">=", 18)`               | `age >= $1`              |
//!
//! Operators for the three-argument form are listed in
//! [`COMPARISON_OPERATORS`]. Filters are combined with `AND`.

mod render;
mod response;

pub use render::COMPARISON_OPERATORS;
pub use response::QueryResponse;

use crate::client::GenericClient;
use crate::config::BuilderConfig;
use crate::connection::{Connection, Direction, JoinKind, QueryBuilder};
use crate::error::{ModelError, ModelResult};
use crate::sql::{Sql, returns_rows};
use crate::value::{Record, Value};
use render::{Clauses, Join, Select};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// A registry entry backed by any [`GenericClient`]: a single
/// `tokio_postgres::Client` or a `deadpool_postgres::Pool`.
pub struct PgConnection<Cl> {
    client: Arc<Cl>,
    config: BuilderConfig,
}

impl<Cl: GenericClient> PgConnection<Cl> {
    pub fn new(client: Cl) -> Self {
        Self::from_shared(Arc::new(client))
    }

    /// Wrap a client that is also used elsewhere.
    pub fn from_shared(client: Arc<Cl>) -> Self {
        Self {
            client,
            config: BuilderConfig::default(),
        }
    }

    /// Replace the configuration handed to every builder.
    pub fn with_config(mut self, config: BuilderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn client(&self) -> &Arc<Cl> {
        &self.client
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }
}

impl<Cl: GenericClient + 'static> Connection for PgConnection<Cl> {
    type Builder = PgQueryBuilder<Cl>;

    fn query(&self) -> PgQueryBuilder<Cl> {
        PgQueryBuilder {
            client: Arc::clone(&self.client),
            config: self.config.clone(),
            clauses: Clauses::default(),
        }
    }
}

impl<Cl> fmt::Debug for PgConnection<Cl> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgConnection")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Accumulates clauses and renders them into one statement per terminal call.
///
/// Every terminal call starts the next query from empty clauses, whether it
/// succeeded or not. `raw_query` leaves accumulated clauses untouched.
pub struct PgQueryBuilder<Cl> {
    client: Arc<Cl>,
    config: BuilderConfig,
    clauses: Clauses,
}

impl<Cl: GenericClient> PgQueryBuilder<Cl> {
    /// Render the current clauses as the statement `all()` would run.
    pub fn to_sql(&self) -> ModelResult<String> {
        Ok(self.clauses.select(Select::All)?.to_sql())
    }

    fn take_clauses(&mut self) -> Clauses {
        std::mem::take(&mut self.clauses)
    }

    async fn run(&self, op: &'static str, sql: Sql, fetch_rows: bool) -> ModelResult<QueryResponse> {
        let text = sql.to_sql();
        let params = sql.params_ref();
        tracing::debug!(
            target: "pgmodel.sql",
            op,
            param_count = params.len(),
            sql = %truncate_sql(&text, self.config.max_logged_sql_length),
            "executing"
        );

        let started = Instant::now();
        let result = if fetch_rows {
            self.client.query(&text, &params).await.map(|r| (r, None))
        } else {
            self.client
                .execute(&text, &params)
                .await
                .map(|n| (Vec::new(), Some(n)))
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok((rows, affected)) => {
                let response = match affected {
                    Some(n) => QueryResponse::from_affected(text, n),
                    None => QueryResponse::from_rows(text, rows),
                };
                tracing::debug!(
                    target: "pgmodel.sql",
                    op,
                    elapsed_ms,
                    affected_rows = response.affected_rows(),
                    "completed"
                );
                Ok(response)
            }
            Err(err) => {
                tracing::warn!(target: "pgmodel.sql", op, elapsed_ms, error = %err, "failed");
                Err(err)
            }
        }
    }
}

impl<Cl: GenericClient + 'static> QueryBuilder for PgQueryBuilder<Cl> {
    type Response = QueryResponse;

    fn from(&mut self, table: &str, fields: &[String]) {
        self.clauses.table = Some(table.to_string());
        self.clauses.fields = fields.to_vec();
    }

    fn join(&mut self, kind: JoinKind, table: &str, on: &str, fields: &[String]) {
        self.clauses.joins.push(Join {
            kind,
            table: table.to_string(),
            on: on.to_string(),
            fields: fields.to_vec(),
        });
    }

    fn limit(&mut self, max: u64, page: u64) {
        self.clauses.limit = Some((max, page));
    }

    fn unique(&mut self) {
        self.clauses.distinct = true;
    }

    fn order(&mut self, field: &str, direction: Direction) {
        self.clauses.orders.push((field.to_string(), direction));
    }

    fn filter(&mut self, args: Vec<Value>) {
        self.clauses.filters.push(args);
    }

    async fn save(&mut self, data: Record, auto_timestamp: bool) -> ModelResult<QueryResponse> {
        let sql = self
            .take_clauses()
            .save(data, &self.config, auto_timestamp)?;
        self.run("save", sql, true).await
    }

    async fn save_bulk(
        &mut self,
        data: Vec<Record>,
        fields: Option<Vec<String>>,
        ids: Option<Vec<Value>>,
        key: Option<String>,
        auto_timestamp: bool,
    ) -> ModelResult<QueryResponse> {
        let sql = self.take_clauses().save_bulk(
            data,
            fields,
            ids,
            key,
            &self.config,
            auto_timestamp,
        )?;
        self.run("save_bulk", sql, true).await
    }

    async fn delete(&mut self) -> ModelResult<QueryResponse> {
        let sql = self.take_clauses().delete(&self.config)?;
        self.run("delete", sql, false).await
    }

    async fn first(&mut self) -> ModelResult<QueryResponse> {
        let sql = self.take_clauses().select(Select::First)?;
        self.run("first", sql, true).await
    }

    async fn count(&mut self) -> ModelResult<QueryResponse> {
        let sql = self.take_clauses().select(Select::Count)?;
        self.run("count", sql, true).await?.into_count()
    }

    async fn all(&mut self) -> ModelResult<QueryResponse> {
        let sql = self.take_clauses().select(Select::All)?;
        self.run("all", sql, true).await
    }

    async fn raw_query(&mut self, text: &str) -> ModelResult<QueryResponse> {
        if text.trim().is_empty() {
            return Err(ModelError::validation("raw query text is empty"));
        }
        self.run("raw_query", Sql::new(text), returns_rows(text))
            .await
    }
}

impl<Cl> fmt::Debug for PgQueryBuilder<Cl> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgQueryBuilder")
            .field("clauses", &self.clauses)
            .finish_non_exhaustive()
    }
}

fn truncate_sql(sql: &str, max_bytes: Option<usize>) -> Cow<'_, str> {
    match max_bytes {
        Some(max) if sql.len() > max => {
            let mut end = max;
            while end > 0 && !sql.is_char_boundary(end) {
                end -= 1;
            }
            Cow::Owned(format!("{}...", &sql[..end]))
        }
        _ => Cow::Borrowed(sql),
    }
}
