//! A single unit of reactive logic attached to an event name.

use core::fmt;

use crate::dispatch::Event;

/// The verdict a trigger returns for one event.
///
/// `allow_action == false` suppresses the action that fired the event.
/// `continue_execution == false` stops every trigger that has not run yet in
/// the same dispatch, including triggers owned by other listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventReturn {
    /// Whether the triggering action may proceed.
    pub allow_action: bool,
    /// Whether remaining triggers should keep running.
    pub continue_execution: bool,
}

impl EventReturn {
    /// Allow the action and keep running the remaining triggers.
    pub const PROCEED: Self = Self::new(true, true);

    /// Build a verdict from its two flags.
    pub const fn new(allow_action: bool, continue_execution: bool) -> Self {
        Self {
            allow_action,
            continue_execution,
        }
    }
}

impl Default for EventReturn {
    fn default() -> Self {
        Self::PROCEED
    }
}

/// Reactive logic fired when an event it is registered for is dispatched.
///
/// Triggers are stateless with respect to a dispatch: the verdict is a pure
/// return value and the dispatcher owns the aggregation. Side effects (a
/// message, inserting a timer job) are the trigger's own business. A panic
/// inside [`fire`](EventTrigger::fire) is not caught by the dispatcher.
pub trait EventTrigger: Send + Sync + fmt::Debug {
    /// Kind name used to look up this trigger's factory when restoring.
    fn kind(&self) -> &'static str;

    /// React to the event and return a verdict.
    fn fire(&self, event: &Event) -> EventReturn;

    /// Parameters needed to rebuild this trigger through its registered
    /// factory.
    fn params(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Whether this trigger can be persisted and rebuilt from a registry.
    fn is_persistent(&self) -> bool {
        true
    }
}

/// Boxed callback run by an [`FnTrigger`].
type TriggerFn = dyn Fn(&Event) -> EventReturn + Send + Sync;

/// A native trigger backed by a closure.
///
/// Closures cannot be persisted, so these triggers are skipped when a
/// listener is snapshotted.
pub struct FnTrigger {
    callback: Box<TriggerFn>,
}

impl FnTrigger {
    /// Wrap a closure as a trigger.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Event) -> EventReturn + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }
}

impl fmt::Debug for FnTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTrigger").finish_non_exhaustive()
    }
}

impl EventTrigger for FnTrigger {
    fn kind(&self) -> &'static str {
        "native"
    }

    fn fire(&self, event: &Event) -> EventReturn {
        (self.callback)(event)
    }

    fn is_persistent(&self) -> bool {
        false
    }
}
