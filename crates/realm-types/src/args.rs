//! Typed arguments carried by an event dispatch.
//!
//! Every `beforeX`/`afterX` event is fired with a short positional argument
//! list. Triggers pattern-match on the variants they care about instead of
//! downcasting opaque values.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::EntityId;

/// A single positional event argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventArgument {
    /// A tangible entity taking part in the action (holder, aggressor, ...).
    Entity(EntityId),
    /// The resource an allocation event refers to.
    Resource(EntityId),
    /// A resource quantity.
    Amount(Decimal),
    /// An integral value (damage dealt, tick number, ...).
    Integer(i64),
    /// Free-form text (command verbs, directions).
    Text(String),
    /// A boolean flag.
    Flag(bool),
}

impl EventArgument {
    /// Return the entity id if this argument is [`EventArgument::Entity`].
    pub const fn as_entity(&self) -> Option<EntityId> {
        match self {
            Self::Entity(id) => Some(*id),
            _ => None,
        }
    }

    /// Return the resource id if this argument is [`EventArgument::Resource`].
    pub const fn as_resource(&self) -> Option<EntityId> {
        match self {
            Self::Resource(id) => Some(*id),
            _ => None,
        }
    }

    /// Return the amount if this argument is [`EventArgument::Amount`].
    pub const fn as_amount(&self) -> Option<Decimal> {
        match self {
            Self::Amount(amount) => Some(*amount),
            _ => None,
        }
    }

    /// Return the integer if this argument is [`EventArgument::Integer`].
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }
}
