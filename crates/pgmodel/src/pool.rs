//! Pool-backed registry entries.

use crate::config::BuilderConfig;
use crate::error::{ModelError, ModelResult};
use crate::pg::PgConnection;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::NoTls;

/// Sizing and recycling of the pool behind a [`PgConnection`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of pooled connections.
    pub max_size: usize,
    /// Run a test query on a connection before handing it out again.
    pub verify_on_recycle: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 16,
            verify_on_recycle: false,
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn verify_on_recycle(mut self, verify: bool) -> Self {
        self.verify_on_recycle = verify;
        self
    }

    /// Read `PGMODEL_POOL_MAX_SIZE` and `PGMODEL_POOL_VERIFY`, falling back to
    /// defaults for unset ones.
    pub fn from_env() -> ModelResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ModelResult<Self> {
        let mut config = Self::default();

        if let Some(v) = lookup("PGMODEL_POOL_MAX_SIZE") {
            config.max_size = v
                .trim()
                .parse()
                .ok()
                .filter(|size| *size > 0)
                .ok_or_else(|| {
                    ModelError::configuration(format!(
                        "PGMODEL_POOL_MAX_SIZE must be a positive number, got '{v}'"
                    ))
                })?;
        }
        if let Some(v) = lookup("PGMODEL_POOL_VERIFY") {
            config.verify_on_recycle = v.trim().parse().map_err(|_| {
                ModelError::configuration(format!(
                    "PGMODEL_POOL_VERIFY must be true or false, got '{v}'"
                ))
            })?;
        }

        Ok(config)
    }

    fn recycling_method(&self) -> RecyclingMethod {
        if self.verify_on_recycle {
            RecyclingMethod::Verified
        } else {
            RecyclingMethod::Fast
        }
    }
}

/// A pool over `database_url` with default [`PoolConfig`].
pub fn create_pool(database_url: &str) -> ModelResult<Pool> {
    create_pool_with_config(database_url, &PoolConfig::default())
}

/// A pool over `database_url`. No connection is opened until the first query.
pub fn create_pool_with_config(database_url: &str, config: &PoolConfig) -> ModelResult<Pool> {
    let pg_config = database_url
        .parse::<tokio_postgres::Config>()
        .map_err(|e| ModelError::Connection(e.to_string()))?;

    let manager_config = ManagerConfig {
        recycling_method: config.recycling_method(),
    };
    let pool = Pool::builder(Manager::from_config(pg_config, NoTls, manager_config))
        .max_size(config.max_size)
        .build()
        .map_err(|e| ModelError::Pool(e.to_string()))?;

    tracing::debug!(
        target: "pgmodel",
        max_size = config.max_size,
        verify_on_recycle = config.verify_on_recycle,
        "created connection pool"
    );
    Ok(pool)
}

impl PgConnection<Pool> {
    /// A registry entry over a new pool to `database_url`.
    ///
    /// Pool settings come from [`PoolConfig::from_env`] and builder settings
    /// from [`BuilderConfig::from_env`]:
    ///
    /// ```ignore
    /// registry.set("database", PgConnection::from_url(&url)?);
    /// ```
    pub fn from_url(database_url: &str) -> ModelResult<Self> {
        let pool = create_pool_with_config(database_url, &PoolConfig::from_env()?)?;
        Ok(Self::new(pool).with_config(BuilderConfig::from_env()?))
    }
}
