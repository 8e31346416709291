//! # pgmodel
//!
//! A fluent, model-level query facade for PostgreSQL.
//!
//! ## Features
//!
//! - **Per-model contexts**: a [`Session`] owns one [`QueryContext`] per model,
//!   created on first use and reused for every later chain
//! - **Lazy acquisition**: the connection is looked up in the [`Registry`] and
//!   a query builder created the first time a model is queried, never earlier
//! - **Default tables**: terminal calls bind [`Model::TABLE`] when the chain
//!   did not name a table
//! - **Swappable backends**: the facade only talks to the [`Connection`] and
//!   [`QueryBuilder`] traits; [`pg`] is the PostgreSQL implementation
//! - **Safe defaults**: identifiers are validated, values are always bound,
//!   and `delete()` without filters is refused unless configured otherwise
//!
//! ## Quick start
//!
//! ```ignore
//! use pgmodel::prelude::*;
//! use std::sync::Arc;
//!
//! #[derive(Model)]
//! #[model(table = "users", timestamps)]
//! enum User {}
//!
//! let registry = Arc::new(Registry::new());
//! registry.set("database", PgConnection::from_url(&url)?);
//!
//! let mut session = Session::new(Arc::clone(&registry));
//!
//! session.model::<User>().save(record! { "name" => "Amy", "age" => 31 }).await?;
//!
//! let adults = session
//!     .model::<User>()
//!     .filter(("age", ">=", 18))
//!     .order_asc("name")
//!     .limit(20, 1)
//!     .all()
//!     .await?
//!     .records()?;
//! ```

extern crate self as pgmodel;

pub mod client;
pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod model;
pub mod pg;
pub mod row;
pub mod session;
pub mod sql;
pub mod value;

#[cfg(feature = "pool")]
pub mod pool;

pub use client::GenericClient;
pub use config::{BuilderConfig, SessionConfig};
pub use connection::{Connection, DEFAULT_ENTRY, Direction, JoinKind, QueryBuilder, Registry};
pub use context::{QueryContext, ResponseOf};
pub use error::{ModelError, ModelResult};
pub use model::Model;
pub use row::{FromRow, RowExt};
pub use session::Session;
pub use sql::Sql;
pub use value::{IntoArgs, Record, Value};

#[cfg(feature = "pool")]
pub use pool::{PoolConfig, create_pool, create_pool_with_config};

#[cfg(feature = "derive")]
pub use pgmodel_derive::Model;

/// The types most chains need.
pub mod prelude {
    pub use crate::pg::{PgConnection, QueryResponse};
    pub use crate::{
        Direction, FromRow, JoinKind, Model, ModelError, ModelResult, Record, Registry, RowExt,
        Session, Value, args, record,
    };
}
