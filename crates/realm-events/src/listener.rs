//! Ordered collections of triggers keyed by event name.
//!
//! Each entity owns one [`EventListener`] and the game owns a global one.
//! The trigger table sits behind a read/write lock so triggers can be added
//! from any thread; a dispatch clones the handful of `Arc`s registered for
//! its event name and releases the lock before running them, which lets a
//! trigger register further triggers without deadlocking.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use core::fmt;

use tracing::debug;

use crate::dispatch::Event;
use crate::registry::TriggerSnapshot;
use crate::trigger::{EventReturn, EventTrigger};

/// Triggers registered under one event name, in registration order.
type TriggerList = Vec<Arc<dyn EventTrigger>>;

/// Owns the triggers an entity (or the game) reacts with.
#[derive(Default)]
pub struct EventListener {
    triggers: RwLock<BTreeMap<String, TriggerList>>,
}

impl EventListener {
    /// Create a listener with no triggers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a trigger to the list for `event`.
    pub fn add_trigger(&self, event: impl Into<String>, trigger: Arc<dyn EventTrigger>) {
        let mut triggers = self
            .triggers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        triggers.entry(event.into()).or_default().push(trigger);
    }

    /// Remove every trigger registered for `event`, returning how many were
    /// removed.
    pub fn clear_event(&self, event: &str) -> usize {
        let mut triggers = self
            .triggers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        triggers.remove(event).map_or(0, |list| list.len())
    }

    /// Return the triggers registered for `event`, in registration order.
    pub fn triggers_for(&self, event: &str) -> Vec<Arc<dyn EventTrigger>> {
        let triggers = self.triggers.read().unwrap_or_else(PoisonError::into_inner);
        triggers.get(event).cloned().unwrap_or_default()
    }

    /// Return the names of all events that have at least one trigger.
    pub fn event_names(&self) -> Vec<String> {
        let triggers = self.triggers.read().unwrap_or_else(PoisonError::into_inner);
        triggers.keys().cloned().collect()
    }

    /// Return whether no trigger is registered for any event.
    pub fn is_empty(&self) -> bool {
        let triggers = self.triggers.read().unwrap_or_else(PoisonError::into_inner);
        triggers.values().all(Vec::is_empty)
    }

    /// Run this listener's triggers for `event` and aggregate their verdicts.
    ///
    /// A listener with nothing registered for the event name returns
    /// [`EventReturn::PROCEED`]. A veto sticks for the rest of the run; a
    /// stop verdict skips the remaining triggers immediately.
    pub fn execute(&self, event: &Event) -> EventReturn {
        let mut verdict = EventReturn::PROCEED;

        for trigger in self.triggers_for(event.name()) {
            let result = trigger.fire(event);

            if !result.allow_action && verdict.allow_action {
                debug!(event = event.name(), trigger = trigger.kind(), "Trigger vetoed action");
                verdict.allow_action = false;
            }

            if !result.continue_execution {
                debug!(event = event.name(), trigger = trigger.kind(), "Trigger stopped execution");
                verdict.continue_execution = false;
                break;
            }
        }

        verdict
    }

    /// Return the persisted form of every persistent trigger, grouped by
    /// event name in registration order.
    pub fn snapshot(&self) -> Vec<TriggerSnapshot> {
        let triggers = self.triggers.read().unwrap_or_else(PoisonError::into_inner);
        triggers
            .iter()
            .flat_map(|(event, list)| {
                list.iter()
                    .filter(|trigger| trigger.is_persistent())
                    .map(|trigger| TriggerSnapshot {
                        event: event.clone(),
                        kind: trigger.kind().to_owned(),
                        params: trigger.params(),
                    })
            })
            .collect()
    }
}

impl Clone for EventListener {
    /// Copy the trigger table. Triggers are stateless, so the copy shares
    /// the trigger objects but owns its own table.
    fn clone(&self) -> Self {
        let triggers = self.triggers.read().unwrap_or_else(PoisonError::into_inner);
        Self {
            triggers: RwLock::new(triggers.clone()),
        }
    }
}

impl fmt::Debug for EventListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let triggers = self.triggers.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_map()
            .entries(triggers.iter().map(|(event, list)| (event, list.len())))
            .finish()
    }
}
