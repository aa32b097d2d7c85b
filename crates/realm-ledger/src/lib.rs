//! Transactional resource ledger for the Realm world engine.
//!
//! A [`Resource`] is a named quantity (gold, water, arrows) that world
//! entities can hold amounts of. It keeps a ledger of holder balances and
//! enforces four policies on every change:
//!
//! - an optional global cap on the total allocated (`amount_available`),
//! - an optional cap on each holder's balance (`max_amount_per_depositor`),
//! - optional integer-only allocations,
//! - strictly positive balances (a holder that reaches zero is removed).
//!
//! Every gameplay operation ([`Resource::allocate`], [`Resource::free`],
//! [`Resource::transfer`]) fires a `before*` event that may veto it and an
//! `after*` event once it has happened. Policy failures are returned as an
//! [`AllocationStatus`], never as errors.
//!
//! # Locking
//!
//! A resource's ledger lock is always taken before any holder-side state.
//! Holder callbacks ([`Tangible::record_resource_allocation`] and
//! [`Tangible::remove_resource_allocation`]) run while the ledger lock is
//! held, so a holder must never call back into a resource from inside them.
//! Events are dispatched with no lock held.

mod allocation;
pub mod holder;
mod ledger;
pub mod resource;
pub mod snapshot;
pub mod status;

pub use allocation::{
    AFTER_ALLOCATE, AFTER_FREE, AFTER_TRANSFER, BEFORE_ALLOCATE, BEFORE_FREE, BEFORE_TRANSFER,
};
pub use holder::{HolderDirectory, Tangible};
pub use resource::{EPHEMERAL_TAG, Resource, ResourceLimits, STICKY_TAG};
pub use snapshot::{DepositorSnapshot, ResourceSnapshot};
pub use status::AllocationStatus;

use rust_decimal::Decimal;

/// Errors raised by resource configuration and restore.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    /// A new cap would be below what is already allocated.
    #[error("amount available {requested} is less than the {allocated} already allocated")]
    AmountAvailableTooSmall {
        /// The rejected cap.
        requested: Decimal,
        /// Total currently allocated.
        allocated: Decimal,
    },

    /// A persisted depositor does not name a known holder.
    #[error("depositor '{name}' does not exist")]
    UnknownDepositor {
        /// The unresolved holder name.
        name: String,
    },

    /// A persisted balance violates the resource's policies.
    #[error("invalid balance {amount} for depositor '{depositor}'")]
    InvalidDepositAmount {
        /// The holder the balance belongs to.
        depositor: String,
        /// The rejected balance.
        amount: Decimal,
    },

    /// A persisted trigger could not be rebuilt.
    #[error("trigger restore failed: {source}")]
    Trigger {
        /// The registry error.
        #[from]
        source: realm_events::RegistryError,
    },
}
