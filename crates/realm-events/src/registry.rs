//! Kind-name registry for rebuilding persisted triggers.
//!
//! A registry is an ordinary value owned by the game runtime and handed to
//! whoever restores listeners, so tests can build isolated registries with
//! just the kinds they need.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::RegistryError;
use crate::listener::EventListener;
use crate::trigger::EventTrigger;

/// Persisted form of one trigger registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerSnapshot {
    /// Event name the trigger is registered under.
    pub event: String,
    /// Kind name used to find the factory.
    pub kind: String,
    /// Kind-specific parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Factory that rebuilds a trigger from its parameters and a runtime
/// context `C` (typically a handle to the game).
pub type TriggerFactory<C> =
    Box<dyn Fn(&serde_json::Value, &C) -> Result<Arc<dyn EventTrigger>, RegistryError> + Send + Sync>;

/// Maps trigger kind names to factories.
pub struct TriggerRegistry<C> {
    factories: BTreeMap<String, TriggerFactory<C>>,
}

impl<C> TriggerRegistry<C> {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Register (or replace) the factory for `kind`.
    pub fn register(&mut self, kind: impl Into<String>, factory: TriggerFactory<C>) {
        self.factories.insert(kind.into(), factory);
    }

    /// Return whether `kind` has a factory.
    pub fn is_registered(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Return the registered kind names in sorted order.
    pub fn kinds(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Rebuild a single trigger.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnregisteredKind`] for an unknown kind, or
    /// whatever the factory reports for bad parameters.
    pub fn instantiate(
        &self,
        snapshot: &TriggerSnapshot,
        context: &C,
    ) -> Result<Arc<dyn EventTrigger>, RegistryError> {
        let factory =
            self.factories
                .get(&snapshot.kind)
                .ok_or_else(|| RegistryError::UnregisteredKind {
                    kind: snapshot.kind.clone(),
                })?;
        factory(&snapshot.params, context)
    }

    /// Rebuild a whole listener from its persisted triggers.
    ///
    /// # Errors
    ///
    /// Fails on the first trigger that cannot be rebuilt.
    pub fn restore_listener(
        &self,
        snapshots: &[TriggerSnapshot],
        context: &C,
    ) -> Result<EventListener, RegistryError> {
        let listener = EventListener::new();
        for snapshot in snapshots {
            listener.add_trigger(snapshot.event.clone(), self.instantiate(snapshot, context)?);
        }
        Ok(listener)
    }
}

impl<C> Default for TriggerRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> core::fmt::Debug for TriggerRegistry<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TriggerRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
