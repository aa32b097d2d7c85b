//! What the ledger needs from the entities that hold resources.

use std::sync::Arc;

use realm_events::EventListener;
use realm_types::EntityId;
use rust_decimal::Decimal;

/// An entity that can hold amounts of resources.
///
/// The ledger refers to holders by [`EntityId`] only, so a resource never
/// keeps a holder alive. Liveness is checked through
/// [`Resource::prune`](crate::Resource::prune).
pub trait Tangible: Send + Sync {
    /// Stable identifier used as the ledger key.
    fn id(&self) -> EntityId;

    /// Unique name, used when persisting the ledger.
    fn name(&self) -> String;

    /// Listener notified of this holder's resource events.
    fn listener(&self) -> Arc<EventListener>;

    /// The holder's balance of `resource` is now `balance`.
    ///
    /// Called with the resource's ledger lock held; must not call back into
    /// any resource.
    fn record_resource_allocation(&self, resource: EntityId, balance: Decimal);

    /// The holder no longer holds any of `resource`.
    ///
    /// Same locking rules as [`Tangible::record_resource_allocation`].
    fn remove_resource_allocation(&self, resource: EntityId);
}

/// Resolves persisted holder names back to live holders.
pub trait HolderDirectory {
    /// Look up a holder by name.
    fn holder(&self, name: &str) -> Option<Arc<dyn Tangible>>;
}
