//! Event descriptors and the dispatch protocol.
//!
//! [`dispatch`] walks the event's listeners in order and aggregates their
//! verdicts; [`EventHandler`] is the game-level wrapper that always puts
//! the global listener first.

use std::sync::Arc;

use realm_types::EventArgument;

use crate::listener::EventListener;
use crate::trigger::EventReturn;

/// A fire-and-forget request to notify listeners about an action.
#[derive(Debug, Clone)]
pub struct Event {
    name: String,
    listeners: Vec<Arc<EventListener>>,
    arguments: Vec<EventArgument>,
}

impl Event {
    /// Describe an event: its name, the listeners to notify in order, and
    /// the positional arguments handed to every trigger.
    pub fn new(
        name: impl Into<String>,
        listeners: Vec<Arc<EventListener>>,
        arguments: Vec<EventArgument>,
    ) -> Self {
        Self {
            name: name.into(),
            listeners,
            arguments,
        }
    }

    /// Return the event's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the listeners that will be notified, in order.
    pub fn listeners(&self) -> &[Arc<EventListener>] {
        &self.listeners
    }

    /// Return the event's arguments.
    pub fn arguments(&self) -> &[EventArgument] {
        &self.arguments
    }

    /// Return the argument at `index`, if present.
    pub fn argument(&self, index: usize) -> Option<&EventArgument> {
        self.arguments.get(index)
    }

    /// Put a listener in front of all others.
    ///
    /// Reserved for wrappers that need their own listener to hear every
    /// event first, as [`EventHandler`] does with the global listener.
    pub fn prepend_listener(&mut self, listener: Arc<EventListener>) {
        self.listeners.insert(0, listener);
    }
}

/// Run the dispatch protocol for `event`.
///
/// Listeners are visited in order and each runs its triggers for the event
/// name. A veto from any trigger makes the aggregate `allow_action` false
/// for good. A stop verdict ends the whole dispatch: the rest of that
/// listener's triggers and every later listener are skipped.
pub fn dispatch(event: &Event) -> EventReturn {
    let mut verdict = EventReturn::PROCEED;

    for listener in event.listeners() {
        let result = listener.execute(event);

        if !result.allow_action {
            verdict.allow_action = false;
        }

        if !result.continue_execution {
            verdict.continue_execution = false;
            break;
        }
    }

    verdict
}

/// The game container's single entry point for running an event.
///
/// Implementations decide which extra listeners hear every event; callers
/// only care whether the action is allowed.
pub trait EventDispatcher: Send + Sync {
    /// Dispatch `event` and return whether the action may proceed.
    fn event(&self, event: Event) -> bool;
}

/// Dispatcher that prepends a global, game-wide listener to every event.
#[derive(Debug, Clone, Default)]
pub struct EventHandler {
    global: Arc<EventListener>,
}

impl EventHandler {
    /// Create a handler with an empty global listener.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handler around an existing global listener.
    pub const fn with_global(global: Arc<EventListener>) -> Self {
        Self { global }
    }

    /// Return the global listener.
    pub const fn global(&self) -> &Arc<EventListener> {
        &self.global
    }
}

impl EventDispatcher for EventHandler {
    fn event(&self, mut event: Event) -> bool {
        event.prepend_listener(Arc::clone(&self.global));
        dispatch(&event).allow_action
    }
}
