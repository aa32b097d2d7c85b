//! Event interception pipeline for the Realm world engine.
//!
//! Every mutating action in the world (movement, combat, taking and dropping
//! items, resource transfers) fires a `beforeX` event, aborts if any trigger
//! vetoes it, performs the mutation, then fires an `afterX` event. This
//! crate owns the machinery behind that contract.
//!
//! # Modules
//!
//! - [`trigger`] -- The [`EventTrigger`] trait, [`EventReturn`] verdicts and
//!   the closure-backed [`FnTrigger`].
//! - [`listener`] -- [`EventListener`]: ordered triggers keyed by event name.
//! - [`dispatch`] -- [`Event`], the [`dispatch`](dispatch::dispatch) function,
//!   the [`EventDispatcher`] seam and the global-listener [`EventHandler`].
//! - [`registry`] -- [`TriggerRegistry`]: kind name to factory, used to
//!   rebuild triggers from snapshots.
//!
//! # Short-circuit rules
//!
//! | First trigger returns | Aggregate `allow_action` | Second trigger runs |
//! |---|---|---|
//! | `(true, true)` | second trigger decides | yes |
//! | `(true, false)` | `true` | no |
//! | `(false, true)` | `false` (sticky) | yes |
//! | `(false, false)` | `false` | no |
//!
//! A `continue_execution == false` verdict also halts every listener that
//! has not run yet in the same dispatch.

pub mod dispatch;
pub mod listener;
pub mod registry;
pub mod trigger;

pub use dispatch::{Event, EventDispatcher, EventHandler, dispatch};
pub use listener::EventListener;
pub use registry::{TriggerFactory, TriggerRegistry, TriggerSnapshot};
pub use trigger::{EventReturn, EventTrigger, FnTrigger};

/// Errors raised when rebuilding triggers from their persisted form.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No factory is registered under the requested kind name.
    #[error("event trigger kind '{kind}' has not been registered")]
    UnregisteredKind {
        /// The unknown kind name.
        kind: String,
    },

    /// A factory rejected the persisted parameters.
    #[error("invalid parameters for event trigger kind '{kind}': {reason}")]
    InvalidParams {
        /// The kind whose factory failed.
        kind: String,
        /// Why the parameters were rejected.
        reason: String,
    },
}
