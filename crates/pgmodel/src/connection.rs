//! The collaborator seams driven by [`QueryContext`](crate::QueryContext).
//!
//! A [`Registry`] hands out named [`Connection`]s; a connection produces a
//! [`QueryBuilder`], which accumulates clauses until a terminal call executes
//! them. pgmodel ships a PostgreSQL implementation in [`crate::pg`]; tests and
//! other backends can plug in their own.

use crate::error::ModelResult;
use crate::value::{Record, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

/// Registry entry a [`Session`](crate::Session) looks up by default.
pub const DEFAULT_ENTRY: &str = "database";

/// Join flavour for [`QueryBuilder::join`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
    Right,
    Full,
}

impl JoinKind {
    pub fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
        }
    }
}

/// Sort direction for [`QueryBuilder::order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// A clause accumulator that executes on its terminal calls.
///
/// Clause methods only record state and cannot fail; anything wrong with the
/// accumulated clauses is reported by the terminal call that renders them.
pub trait QueryBuilder: Send {
    /// What terminal calls hand back to the caller, unmodified by the facade.
    type Response: Send;

    /// Bind the target table and the fields to select.
    fn from(&mut self, table: &str, fields: &[String]);

    /// Add a join; `fields` are appended to the select list.
    fn join(&mut self, kind: JoinKind, table: &str, on: &str, fields: &[String]);

    /// Limit rows to `max`, skipping `(page - 1) * max` rows (pages start at 1).
    fn limit(&mut self, max: u64, page: u64);

    /// Select distinct rows only.
    fn unique(&mut self);

    /// Add a sort key.
    fn order(&mut self, field: &str, direction: Direction);

    /// Add a filter; the argument list is interpreted by the builder.
    fn filter(&mut self, args: Vec<Value>);

    /// Insert one row, or update the filtered rows when filters are present.
    fn save(
        &mut self,
        data: Record,
        auto_timestamp: bool,
    ) -> impl Future<Output = ModelResult<Self::Response>> + Send;

    /// Insert many rows, or update rows keyed by `key` when `ids` is given.
    fn save_bulk(
        &mut self,
        data: Vec<Record>,
        fields: Option<Vec<String>>,
        ids: Option<Vec<Value>>,
        key: Option<String>,
        auto_timestamp: bool,
    ) -> impl Future<Output = ModelResult<Self::Response>> + Send;

    /// Delete the filtered rows.
    fn delete(&mut self) -> impl Future<Output = ModelResult<Self::Response>> + Send;

    /// Fetch the first matching row, if any.
    fn first(&mut self) -> impl Future<Output = ModelResult<Self::Response>> + Send;

    /// Count the matching rows.
    fn count(&mut self) -> impl Future<Output = ModelResult<Self::Response>> + Send;

    /// Fetch every matching row.
    fn all(&mut self) -> impl Future<Output = ModelResult<Self::Response>> + Send;

    /// Execute literal SQL, bypassing accumulated clauses.
    fn raw_query(&mut self, text: &str) -> impl Future<Output = ModelResult<Self::Response>> + Send;
}

/// A live database handle able to hand out query builders.
pub trait Connection: Send + Sync + 'static {
    type Builder: QueryBuilder + 'static;

    /// Create a fresh query builder bound to this connection.
    fn query(&self) -> Self::Builder;
}

/// Named, shareable connection registry.
///
/// Sessions borrow connections from here; the registry keeps ownership.
pub struct Registry<C> {
    entries: RwLock<HashMap<String, Arc<C>>>,
}

impl<C> Registry<C> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Store `connection` under `name`, returning the previous entry if any.
    pub fn set(&self, name: impl Into<String>, connection: C) -> Option<Arc<C>> {
        self.set_shared(name, Arc::new(connection))
    }

    /// Store an already shared connection under `name`.
    pub fn set_shared(&self, name: impl Into<String>, connection: Arc<C>) -> Option<Arc<C>> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), connection)
    }

    /// Look up the connection stored under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<C>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Remove the entry stored under `name`.
    pub fn remove(&self, name: &str) -> Option<Arc<C>> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    /// Whether an entry named `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }
}

impl<C> Default for Registry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for Registry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<&String> = entries.keys().collect();
        names.sort();
        f.debug_struct("Registry").field("entries", &names).finish()
    }
}
