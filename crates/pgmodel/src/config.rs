//! Session and builder configuration.
//!
//! Both configs follow the same shape: `Default`, chained setters, and
//! `from_env()` for deployments that configure through the environment.

use crate::connection::DEFAULT_ENTRY;
use crate::error::{ModelError, ModelResult};

/// Configuration for a [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Registry entry holding the connection.
    pub registry_entry: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            registry_entry: DEFAULT_ENTRY.to_string(),
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look connections up under `name` instead of `"database"`.
    pub fn registry_entry(mut self, name: impl Into<String>) -> Self {
        self.registry_entry = name.into();
        self
    }

    /// Read `PGMODEL_REGISTRY_ENTRY`, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(entry) = lookup("PGMODEL_REGISTRY_ENTRY").filter(|v| !v.is_empty()) {
            config.registry_entry = entry;
        }
        config
    }
}

/// Configuration for [`PgQueryBuilder`](crate::pg::PgQueryBuilder).
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Column filled on insert when timestamps are enabled.
    pub created_at_column: String,
    /// Column filled on insert and update when timestamps are enabled.
    pub updated_at_column: String,
    /// Key column used by `save_bulk` updates when the caller names none.
    pub bulk_key: String,
    /// Whether `delete()` without any filter is executed (deletes every row).
    pub allow_unfiltered_delete: bool,
    /// Truncate SQL in log events (in bytes). `None` means no truncation.
    pub max_logged_sql_length: Option<usize>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            created_at_column: "created_at".to_string(),
            updated_at_column: "updated_at".to_string(),
            bulk_key: "id".to_string(),
            allow_unfiltered_delete: false,
            max_logged_sql_length: Some(200),
        }
    }
}

impl BuilderConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set both timestamp column names.
    pub fn timestamp_columns(
        mut self,
        created_at: impl Into<String>,
        updated_at: impl Into<String>,
    ) -> Self {
        self.created_at_column = created_at.into();
        self.updated_at_column = updated_at.into();
        self
    }

    /// Set the default `save_bulk` key column.
    pub fn bulk_key(mut self, key: impl Into<String>) -> Self {
        self.bulk_key = key.into();
        self
    }

    /// Allow `delete()` with no filters.
    pub fn allow_unfiltered_delete(mut self, allow: bool) -> Self {
        self.allow_unfiltered_delete = allow;
        self
    }

    /// Set maximum SQL length in log events.
    pub fn max_logged_sql_length(mut self, len: usize) -> Self {
        self.max_logged_sql_length = Some(len);
        self
    }

    /// Log SQL without truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_logged_sql_length = None;
        self
    }

    /// Read `PGMODEL_*` variables, falling back to defaults for unset ones.
    ///
    /// Recognized: `PGMODEL_CREATED_AT_COLUMN`, `PGMODEL_UPDATED_AT_COLUMN`,
    /// `PGMODEL_BULK_KEY`, `PGMODEL_ALLOW_UNFILTERED_DELETE` (`true`/`false`),
    /// `PGMODEL_MAX_LOGGED_SQL_LENGTH` (bytes, `0` disables truncation).
    pub fn from_env() -> ModelResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ModelResult<Self> {
        let mut config = Self::default();

        if let Some(v) = lookup("PGMODEL_CREATED_AT_COLUMN") {
            config.created_at_column = v;
        }
        if let Some(v) = lookup("PGMODEL_UPDATED_AT_COLUMN") {
            config.updated_at_column = v;
        }
        if let Some(v) = lookup("PGMODEL_BULK_KEY") {
            config.bulk_key = v;
        }
        if let Some(v) = lookup("PGMODEL_ALLOW_UNFILTERED_DELETE") {
            config.allow_unfiltered_delete = v.trim().parse().map_err(|_| {
                ModelError::configuration(format!(
                    "PGMODEL_ALLOW_UNFILTERED_DELETE must be true or false, got '{v}'"
                ))
            })?;
        }
        if let Some(v) = lookup("PGMODEL_MAX_LOGGED_SQL_LENGTH") {
            let len: usize = v.trim().parse().map_err(|_| {
                ModelError::configuration(format!(
                    "PGMODEL_MAX_LOGGED_SQL_LENGTH must be a byte count, got '{v}'"
                ))
            })?;
            config.max_logged_sql_length = (len > 0).then_some(len);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        move |key| map.get(key).map(|v| v.to_string())
    }

    #[test]
    fn session_defaults_to_database_entry() {
        assert_eq!(SessionConfig::default().registry_entry, "database");
        assert_eq!(SessionConfig::from_lookup(lookup(&[])).registry_entry, "database");
    }

    #[test]
    fn session_entry_from_env() {
        let config = SessionConfig::from_lookup(lookup(&[("PGMODEL_REGISTRY_ENTRY", "replica")]));
        assert_eq!(config.registry_entry, "replica");
    }

    #[test]
    fn builder_config_setters_chain() {
        let config = BuilderConfig::new()
            .timestamp_columns("date_created", "date_modified")
            .bulk_key("uuid")
            .allow_unfiltered_delete(true)
            .no_truncate();

        assert_eq!(config.created_at_column, "date_created");
        assert_eq!(config.updated_at_column, "date_modified");
        assert_eq!(config.bulk_key, "uuid");
        assert!(config.allow_unfiltered_delete);
        assert_eq!(config.max_logged_sql_length, None);
    }

    #[test]
    fn builder_config_from_env() {
        let config = BuilderConfig::from_lookup(lookup(&[
            ("PGMODEL_UPDATED_AT_COLUMN", "modified"),
            ("PGMODEL_ALLOW_UNFILTERED_DELETE", "true"),
            ("PGMODEL_MAX_LOGGED_SQL_LENGTH", "0"),
        ]))
        .unwrap();

        assert_eq!(config.created_at_column, "created_at");
        assert_eq!(config.updated_at_column, "modified");
        assert!(config.allow_unfiltered_delete);
        assert_eq!(config.max_logged_sql_length, None);
    }

    #[test]
    fn builder_config_rejects_bad_bool() {
        let err = BuilderConfig::from_lookup(lookup(&[("PGMODEL_ALLOW_UNFILTERED_DELETE", "yes")]))
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
