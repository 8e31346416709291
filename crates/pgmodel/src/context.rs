//! Per-model query state and the fluent API built on it.
//!
//! A [`QueryContext`] is the state one model owns inside a [`Session`](crate::Session):
//! the lazily acquired connection and query builder, plus whether the current
//! query has bound its table yet. Clause methods mutate the builder and return
//! the context again, so a chain reads
//!
//! ```ignore
//! session
//!     .model::<User>()
//!     .from_table("users")
//!     .filter(("age", ">", 18))
//!     .order_asc("name")
//!     .limit(10, 1)
//!     .all()
//!     .await?;
//! ```
//!
//! Terminal methods bind the model's default table if the chain did not, run
//! the builder's terminal, and consume the binding so the next query starts
//! unbound again.

use crate::connection::{Connection, Direction, JoinKind, QueryBuilder, Registry};
use crate::error::{ModelError, ModelResult};
use crate::model::Model;
use crate::value::{IntoArgs, Record, Value};
use std::any::type_name;
use std::cell::OnceCell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// What terminal calls on a context over connection `C` return.
pub type ResponseOf<C> = <<C as Connection>::Builder as QueryBuilder>::Response;

struct Acquired<C: Connection> {
    connection: Arc<C>,
    builder: C::Builder,
}

/// Fluent query state for model `M` over connections of type `C`.
///
/// Obtained from [`Session::model`](crate::Session::model); there is no public
/// constructor and the context cannot be duplicated:
///
/// ```compile_fail
/// use pgmodel::{Connection, Model, QueryContext};
///
/// fn duplicate<M: Model, C: Connection>(ctx: &QueryContext<M, C>) -> QueryContext<M, C> {
///     ctx.clone()
/// }
/// ```
///
/// ```compile_fail
/// use pgmodel::{QueryContext, Registry};
/// use pgmodel::pg::PgConnection;
/// use std::sync::Arc;
///
/// enum User {}
/// impl pgmodel::Model for User {
///     const TABLE: &'static str = "users";
/// }
///
/// let registry = Arc::new(Registry::<PgConnection<tokio_postgres::Client>>::new());
/// let ctx = QueryContext::<User, _>::new(registry, "database".to_string());
/// ```
pub struct QueryContext<M: Model, C: Connection> {
    registry: Arc<Registry<C>>,
    entry: String,
    state: OnceCell<Acquired<C>>,
    table_bound: bool,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model, C: Connection> QueryContext<M, C> {
    pub(crate) fn new(registry: Arc<Registry<C>>, entry: String) -> Self {
        Self {
            registry,
            entry,
            state: OnceCell::new(),
            table_bound: false,
            _model: PhantomData,
        }
    }

    /// Whether a connection and builder have been acquired.
    pub fn is_acquired(&self) -> bool {
        self.state.get().is_some()
    }

    /// Whether the current query has bound its table.
    pub fn is_table_bound(&self) -> bool {
        self.table_bound
    }

    /// The connection backing this context, once acquired.
    pub fn connection(&self) -> Option<&Arc<C>> {
        self.state.get().map(|acquired| &acquired.connection)
    }

    /// Acquire the connection and builder on first use; later calls reuse
    /// them. A registry miss is not remembered, so an entry registered later
    /// is picked up by the next call.
    fn acquire(&mut self) -> Option<&mut C::Builder> {
        if self.state.get().is_none() {
            let Some(connection) = self.registry.get(&self.entry) else {
                tracing::debug!(
                    target: "pgmodel",
                    model = type_name::<M>(),
                    entry = %self.entry,
                    "registry has no connection entry"
                );
                return None;
            };
            let builder = connection.query();
            tracing::debug!(
                target: "pgmodel",
                model = type_name::<M>(),
                entry = %self.entry,
                "acquired query builder"
            );
            let _ = self.state.set(Acquired {
                connection,
                builder,
            });
        }
        self.state.get_mut().map(|acquired| &mut acquired.builder)
    }

    fn builder(&mut self) -> ModelResult<&mut C::Builder> {
        let entry = &self.entry;
        match self.state.get_mut() {
            Some(acquired) => Ok(&mut acquired.builder),
            None => {
                tracing::warn!(
                    target: "pgmodel",
                    model = type_name::<M>(),
                    entry = %entry,
                    "terminal call without a registry connection"
                );
                Err(ModelError::configuration(format!(
                    "registry has no connection named '{entry}'"
                )))
            }
        }
    }

    /// Bind the default table if needed and hand out the builder for a
    /// terminal call. The binding is consumed here, before the terminal is
    /// awaited, so a terminal future dropped mid-flight leaves the next query
    /// unbound.
    fn terminal(&mut self) -> ModelResult<&mut C::Builder> {
        self.from(None, None);
        self.table_bound = false;
        self.builder()
    }

    /// Bind the table and fields for the current query.
    ///
    /// With `table` absent the model's [`Model::TABLE`] and [`Model::FIELDS`]
    /// are used; an explicit table defaults to all fields (`*`). Once the
    /// current query is bound, further calls leave the binding untouched.
    pub fn from(&mut self, table: Option<&str>, fields: Option<&[&str]>) -> &mut Self {
        if self.table_bound {
            return self;
        }

        let (table, fields) = match table {
            Some(table) => (table, fields.unwrap_or(&["*"])),
            None => (M::TABLE, fields.unwrap_or(M::FIELDS)),
        };
        let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();

        tracing::trace!(target: "pgmodel", model = type_name::<M>(), table, "binding table");
        if let Some(builder) = self.acquire() {
            builder.from(table, &fields);
        }
        self.table_bound = true;
        self
    }

    /// Bind an explicit table with all fields.
    pub fn from_table(&mut self, table: &str) -> &mut Self {
        self.from(Some(table), None)
    }

    /// Join `table` on `on`, selecting `fields` from it as well.
    pub fn join(&mut self, kind: JoinKind, table: &str, on: &str, fields: &[&str]) -> &mut Self {
        let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        if let Some(builder) = self.acquire() {
            builder.join(kind, table, on, &fields);
        }
        self
    }

    /// Return at most `max` rows of page `page` (pages start at 1).
    pub fn limit(&mut self, max: u64, page: u64) -> &mut Self {
        if let Some(builder) = self.acquire() {
            builder.limit(max, page);
        }
        self
    }

    /// Return at most `max` rows from the first page.
    pub fn take(&mut self, max: u64) -> &mut Self {
        self.limit(max, 1)
    }

    /// Return distinct rows only.
    pub fn unique(&mut self) -> &mut Self {
        if let Some(builder) = self.acquire() {
            builder.unique();
        }
        self
    }

    /// Sort by `field` in `direction`.
    pub fn order(&mut self, field: &str, direction: Direction) -> &mut Self {
        if let Some(builder) = self.acquire() {
            builder.order(field, direction);
        }
        self
    }

    /// Sort by `field` ascending.
    pub fn order_asc(&mut self, field: &str) -> &mut Self {
        self.order(field, Direction::Asc)
    }

    /// Add a filter. The arguments are forwarded as-is; see the builder for
    /// the forms it understands.
    pub fn filter(&mut self, args: impl IntoArgs) -> &mut Self {
        let args = args.into_args();
        if let Some(builder) = self.acquire() {
            builder.filter(args);
        }
        self
    }

    /// Insert one row, or update the filtered rows.
    pub async fn save(&mut self, data: Record) -> ModelResult<ResponseOf<C>> {
        self.terminal()?.save(data, M::UPDATE_TIMESTAMPS).await
    }

    /// Insert many rows, or update the rows whose `key` column is in `ids`.
    pub async fn save_bulk(
        &mut self,
        data: Vec<Record>,
        fields: Option<Vec<String>>,
        ids: Option<Vec<Value>>,
        key: Option<String>,
    ) -> ModelResult<ResponseOf<C>> {
        self.terminal()?
            .save_bulk(data, fields, ids, key, M::UPDATE_TIMESTAMPS)
            .await
    }

    /// Delete the rows matching the chained filters.
    pub async fn delete(&mut self) -> ModelResult<ResponseOf<C>> {
        self.terminal()?.delete().await
    }

    /// Fetch the first matching row.
    pub async fn first(&mut self) -> ModelResult<ResponseOf<C>> {
        self.terminal()?.first().await
    }

    /// Count the matching rows.
    pub async fn count(&mut self) -> ModelResult<ResponseOf<C>> {
        self.terminal()?.count().await
    }

    /// Fetch every matching row.
    pub async fn all(&mut self) -> ModelResult<ResponseOf<C>> {
        self.terminal()?.all().await
    }

    /// Execute `text` as-is. No table is bound.
    pub async fn raw_query(&mut self, text: &str) -> ModelResult<ResponseOf<C>> {
        self.acquire();
        self.builder()?.raw_query(text).await
    }
}

impl<M: Model, C: Connection> fmt::Debug for QueryContext<M, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryContext")
            .field("model", &type_name::<M>())
            .field("entry", &self.entry)
            .field("acquired", &self.is_acquired())
            .field("table_bound", &self.table_bound)
            .finish()
    }
}
