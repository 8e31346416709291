//! The scope that owns per-model query state.

use crate::config::SessionConfig;
use crate::connection::{Connection, Registry};
use crate::context::QueryContext;
use crate::model::Model;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// One unit of work (a request, a job, a test) issuing model queries.
///
/// Each model gets exactly one [`QueryContext`] per session, created the first
/// time [`Session::model`] is called for it and reused afterwards, together
/// with the connection and query builder it acquires. Chains borrow the
/// session mutably, so two chains can never interleave on the same builder;
/// share work across tasks by giving each its own session over a shared
/// [`Registry`].
///
/// ```compile_fail
/// use pgmodel::{Connection, Session};
///
/// fn fork<C: Connection>(session: &Session<C>) -> Session<C> {
///     session.clone()
/// }
/// ```
pub struct Session<C: Connection> {
    registry: Arc<Registry<C>>,
    config: SessionConfig,
    contexts: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl<C: Connection> Session<C> {
    /// Create a session reading connections from `registry` with default config.
    pub fn new(registry: Arc<Registry<C>>) -> Self {
        Self::with_config(registry, SessionConfig::default())
    }

    /// Create a session with explicit configuration.
    pub fn with_config(registry: Arc<Registry<C>>, config: SessionConfig) -> Self {
        Self {
            registry,
            config,
            contexts: HashMap::new(),
        }
    }

    /// The query context for model `M`, created on first use.
    pub fn model<M: Model>(&mut self) -> &mut QueryContext<M, C> {
        let (registry, entry) = (&self.registry, &self.config.registry_entry);
        self.contexts
            .entry(TypeId::of::<M>())
            .or_insert_with(|| {
                Box::new(QueryContext::<M, C>::new(
                    Arc::clone(registry),
                    entry.clone(),
                ))
            })
            .downcast_mut::<QueryContext<M, C>>()
            .expect("contexts are keyed by their model's TypeId")
    }

    /// Whether a context for `M` has been created in this session.
    pub fn has_context<M: Model>(&self) -> bool {
        self.contexts.contains_key(&TypeId::of::<M>())
    }

    /// The registry connections are read from.
    pub fn registry(&self) -> &Arc<Registry<C>> {
        &self.registry
    }

    /// The session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl<C: Connection> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("registry_entry", &self.config.registry_entry)
            .field("models", &self.contexts.len())
            .finish()
    }
}
