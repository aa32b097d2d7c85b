//! Job kind registry.
//!
//! Jobs are persisted as a kind name plus a JSON parameter blob. The
//! registry maps each kind name to a factory that rebuilds the job, given
//! the parameters and a caller-supplied context `C` (typically a handle to
//! the world the job acts on).

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::{TimerError, TimerJob};

/// Builds a job of one kind from its persisted parameters.
pub type JobFactory<C> =
    Box<dyn Fn(&Value, &C) -> Result<Box<dyn TimerJob>, TimerError> + Send + Sync>;

/// Answers whether a job kind can be rebuilt from a snapshot.
///
/// The timer consults a catalog on insertion so that a job which could never
/// be restored is rejected up front.
pub trait JobCatalog: Send + Sync {
    /// Whether `kind` has a factory.
    fn is_registered(&self, kind: &str) -> bool;
}

/// Kind name to factory.
pub struct JobRegistry<C> {
    factories: BTreeMap<String, JobFactory<C>>,
}

impl<C> JobRegistry<C> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Register (or replace) the factory for `kind`.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&Value, &C) -> Result<Box<dyn TimerJob>, TimerError> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Box::new(factory));
    }

    /// Registered kind names, sorted.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Rebuild a job of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::UnregisteredJobKind`] if no factory exists for
    /// `kind`, or whatever error the factory reports.
    pub fn instantiate(
        &self,
        kind: &str,
        params: &Value,
        ctx: &C,
    ) -> Result<Box<dyn TimerJob>, TimerError> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| TimerError::UnregisteredJobKind {
                kind: kind.to_owned(),
            })?;
        factory(params, ctx)
    }
}

impl<C> JobCatalog for JobRegistry<C> {
    fn is_registered(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }
}

impl<C> Default for JobRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for JobRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRegistry")
            .field("kinds", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
