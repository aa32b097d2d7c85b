//! Error types for the game container.

use realm_types::EntityId;

use crate::entity::EntityKind;

/// Errors raised by [`Game`](crate::Game) operations.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// No entity or resource has this id.
    #[error("entity {id} not found")]
    EntityNotFound {
        /// The missing id.
        id: EntityId,
    },

    /// The name is already taken.
    #[error("an entity named '{name}' already exists")]
    DuplicateName {
        /// The conflicting name.
        name: String,
    },

    /// The entity is of the wrong kind for the operation.
    #[error("entity {id} is not a {expected:?}")]
    WrongKind {
        /// The entity's id.
        id: EntityId,
        /// The kind the operation needs.
        expected: EntityKind,
    },

    /// Scheduling failed.
    #[error("timer error: {source}")]
    Timer {
        /// The underlying timer error.
        #[from]
        source: realm_timer::TimerError,
    },

    /// Resource configuration or restore failed.
    #[error("resource error: {source}")]
    Resource {
        /// The underlying resource error.
        #[from]
        source: realm_ledger::ResourceError,
    },

    /// A persisted trigger could not be rebuilt.
    #[error("trigger error: {source}")]
    Trigger {
        /// The underlying registry error.
        #[from]
        source: realm_events::RegistryError,
    },
}
