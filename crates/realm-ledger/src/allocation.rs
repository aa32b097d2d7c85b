//! Balance-changing operations on a [`Resource`].
//!
//! Each gameplay operation comes in two flavours: the event-gated form
//! (`allocate`, `free`, `transfer`) used by gameplay code, and a
//! `*_silently` form that only applies the ledger rules. The gated form
//! dispatches `before*` with no lock held, applies the silent form, and on
//! success dispatches `after*`.

use realm_events::{Event, EventDispatcher};
use realm_types::{EntityId, EventArgument};
use rust_decimal::Decimal;
use tracing::debug;

use crate::resource::lock;
use crate::{AllocationStatus, Resource, Tangible};

/// Fired before an allocation; a veto aborts it.
pub const BEFORE_ALLOCATE: &str = "beforeAllocateResource";
/// Fired after a successful allocation.
pub const AFTER_ALLOCATE: &str = "afterAllocateResource";
/// Fired before a free; a veto aborts it.
pub const BEFORE_FREE: &str = "beforeFreeResource";
/// Fired after a successful free.
pub const AFTER_FREE: &str = "afterFreeResource";
/// Fired before a transfer; a veto aborts it.
pub const BEFORE_TRANSFER: &str = "beforeTransferResource";
/// Fired after a successful transfer.
pub const AFTER_TRANSFER: &str = "afterTransferResource";

impl Resource {
    fn holder_event(&self, name: &str, holder: &dyn Tangible, amount: Decimal) -> Event {
        Event::new(
            name,
            vec![self.listener(), holder.listener()],
            vec![
                EventArgument::Resource(self.id()),
                EventArgument::Entity(holder.id()),
                EventArgument::Amount(amount),
            ],
        )
    }

    fn transfer_event(
        &self,
        name: &str,
        from: &dyn Tangible,
        to: &dyn Tangible,
        amount: Decimal,
    ) -> Event {
        Event::new(
            name,
            vec![self.listener(), from.listener(), to.listener()],
            vec![
                EventArgument::Resource(self.id()),
                EventArgument::Entity(from.id()),
                EventArgument::Entity(to.id()),
                EventArgument::Amount(amount),
            ],
        )
    }

    /// Allocation event for a draw from a sticky source. The holder
    /// arguments match [`BEFORE_ALLOCATE`] with the source appended, and
    /// the source's listener hears it too.
    fn draw_event(
        &self,
        name: &str,
        source: &dyn Tangible,
        taker: &dyn Tangible,
        amount: Decimal,
    ) -> Event {
        Event::new(
            name,
            vec![self.listener(), source.listener(), taker.listener()],
            vec![
                EventArgument::Resource(self.id()),
                EventArgument::Entity(taker.id()),
                EventArgument::Amount(amount),
                EventArgument::Entity(source.id()),
            ],
        )
    }

    // -----------------------------------------------------------------------
    // Allocate
    // -----------------------------------------------------------------------

    /// Give `holder` another `amount` of this resource.
    pub fn allocate(
        &self,
        dispatcher: &dyn EventDispatcher,
        holder: &dyn Tangible,
        amount: Decimal,
    ) -> AllocationStatus {
        if !dispatcher.event(self.holder_event(BEFORE_ALLOCATE, holder, amount)) {
            debug!(resource = %self.name(), holder = %holder.id(), %amount, "Allocation vetoed");
            return AllocationStatus::Abort;
        }

        let status = self.allocate_silently(holder, amount);
        if status.is_success() {
            dispatcher.event(self.holder_event(AFTER_ALLOCATE, holder, amount));
        }
        status
    }

    /// [`Resource::allocate`] without events.
    pub fn allocate_silently(&self, holder: &dyn Tangible, amount: Decimal) -> AllocationStatus {
        let mut ledger = lock(&self.ledger);
        match ledger.credit(holder.id(), &holder.name(), amount) {
            Ok(balance) => {
                holder.record_resource_allocation(self.id(), balance);
                debug!(resource = %self.name(), holder = %holder.id(), %amount, %balance, "Resource allocated");
                AllocationStatus::Success
            }
            Err(status) => status,
        }
    }

    // -----------------------------------------------------------------------
    // Free
    // -----------------------------------------------------------------------

    /// Take `amount` of this resource away from `holder`. An amount of zero
    /// frees the holder's whole balance; [`AFTER_FREE`] carries the amount
    /// actually freed.
    pub fn free(
        &self,
        dispatcher: &dyn EventDispatcher,
        holder: &dyn Tangible,
        amount: Decimal,
    ) -> AllocationStatus {
        if !dispatcher.event(self.holder_event(BEFORE_FREE, holder, amount)) {
            debug!(resource = %self.name(), holder = %holder.id(), %amount, "Free vetoed");
            return AllocationStatus::Abort;
        }

        match self.debit_holder(holder, amount) {
            Ok(freed) => {
                dispatcher.event(self.holder_event(AFTER_FREE, holder, freed));
                AllocationStatus::Success
            }
            Err(status) => status,
        }
    }

    /// [`Resource::free`] without events.
    pub fn free_silently(&self, holder: &dyn Tangible, amount: Decimal) -> AllocationStatus {
        match self.debit_holder(holder, amount) {
            Ok(_) => AllocationStatus::Success,
            Err(status) => status,
        }
    }

    /// Debit `holder` and report the amount freed.
    fn debit_holder(
        &self,
        holder: &dyn Tangible,
        amount: Decimal,
    ) -> Result<Decimal, AllocationStatus> {
        let mut ledger = lock(&self.ledger);
        let debit = ledger.debit(holder.id(), amount)?;
        notify_balance(holder, self.id(), debit.remaining);
        debug!(resource = %self.name(), holder = %holder.id(), freed = %debit.freed, "Resource freed");
        Ok(debit.freed)
    }

    // -----------------------------------------------------------------------
    // Transfer
    // -----------------------------------------------------------------------

    /// Move `amount` from one holder to another, all or nothing.
    pub fn transfer(
        &self,
        dispatcher: &dyn EventDispatcher,
        from: &dyn Tangible,
        to: &dyn Tangible,
        amount: Decimal,
    ) -> AllocationStatus {
        if !dispatcher.event(self.transfer_event(BEFORE_TRANSFER, from, to, amount)) {
            debug!(
                resource = %self.name(),
                from = %from.id(),
                to = %to.id(),
                %amount,
                "Transfer vetoed"
            );
            return AllocationStatus::Abort;
        }

        let status = self.transfer_silently(from, to, amount);
        if status.is_success() {
            dispatcher.event(self.transfer_event(AFTER_TRANSFER, from, to, amount));
        }
        status
    }

    /// [`Resource::transfer`] without events.
    ///
    /// Frees from the source, then allocates to the destination, under the
    /// transfer lock and the ledger lock. If the allocation fails the source
    /// is credited back before returning, so the ledger is unchanged.
    pub fn transfer_silently(
        &self,
        from: &dyn Tangible,
        to: &dyn Tangible,
        amount: Decimal,
    ) -> AllocationStatus {
        let _transfer = lock(&self.transfer_lock);
        let mut ledger = lock(&self.ledger);

        let debit = match ledger.debit(from.id(), amount) {
            Ok(debit) => debit,
            Err(status) => return status,
        };

        match ledger.credit(to.id(), &to.name(), amount) {
            Ok(balance) => {
                let from_balance = ledger.balance(from.id());
                notify_balance(from, self.id(), from_balance);
                to.record_resource_allocation(self.id(), balance);
                debug!(
                    resource = %self.name(),
                    from = %from.id(),
                    to = %to.id(),
                    %amount,
                    "Resource transferred"
                );
                AllocationStatus::Success
            }
            Err(status) => {
                ledger.recredit(from.id(), &from.name(), debit.freed);
                debug!(
                    resource = %self.name(),
                    from = %from.id(),
                    to = %to.id(),
                    %amount,
                    %status,
                    "Transfer rolled back"
                );
                status
            }
        }
    }

    // -----------------------------------------------------------------------
    // Take and drop
    // -----------------------------------------------------------------------

    /// `taker` picks up `amount` from `source` (usually a place).
    ///
    /// For a sticky resource with unlimited supply the source keeps its
    /// balance and the taker is allocated new supply, as long as the request
    /// does not exceed what the source holds. The source balance is checked
    /// again under the ledger lock right before allocating. The allocation
    /// events of a draw reach the source's listener as well, so a place can
    /// veto it, and name the source as a fourth argument. Anything else is
    /// an ordinary transfer.
    pub fn take(
        &self,
        dispatcher: &dyn EventDispatcher,
        source: &dyn Tangible,
        taker: &dyn Tangible,
        amount: Decimal,
    ) -> AllocationStatus {
        if !self.is_sticky() || self.amount_available().is_some() {
            return self.transfer(dispatcher, source, taker, amount);
        }

        if self.balance_of(source.id()) < amount {
            return AllocationStatus::FreeExceedsAllocation;
        }
        if !dispatcher.event(self.draw_event(BEFORE_ALLOCATE, source, taker, amount)) {
            debug!(
                resource = %self.name(),
                source = %source.id(),
                holder = %taker.id(),
                %amount,
                "Draw vetoed"
            );
            return AllocationStatus::Abort;
        }

        let status = {
            let _transfer = lock(&self.transfer_lock);
            let mut ledger = lock(&self.ledger);
            if ledger.balance(source.id()) < amount {
                AllocationStatus::FreeExceedsAllocation
            } else {
                match ledger.credit(taker.id(), &taker.name(), amount) {
                    Ok(balance) => {
                        taker.record_resource_allocation(self.id(), balance);
                        debug!(
                            resource = %self.name(),
                            source = %source.id(),
                            holder = %taker.id(),
                            %amount,
                            "Sticky resource drawn"
                        );
                        AllocationStatus::Success
                    }
                    Err(status) => status,
                }
            }
        };

        if status.is_success() {
            dispatcher.event(self.draw_event(AFTER_ALLOCATE, source, taker, amount));
        }
        status
    }

    /// `dropper` puts down `amount` in `place`. Ephemeral resources are
    /// freed outright; anything else is transferred to the place.
    pub fn drop_into(
        &self,
        dispatcher: &dyn EventDispatcher,
        dropper: &dyn Tangible,
        place: &dyn Tangible,
        amount: Decimal,
    ) -> AllocationStatus {
        if self.is_ephemeral() {
            self.free(dispatcher, dropper, amount)
        } else {
            self.transfer(dispatcher, dropper, place, amount)
        }
    }

    // -----------------------------------------------------------------------
    // Maintenance
    // -----------------------------------------------------------------------

    /// Drop ledger entries of holders that no longer exist. Returns how many
    /// were removed.
    pub fn prune(&self, is_alive: impl Fn(EntityId) -> bool) -> usize {
        let pruned = lock(&self.ledger).prune(is_alive);
        if !pruned.is_empty() {
            debug!(resource = %self.name(), pruned = pruned.len(), "Pruned dead holders");
        }
        pruned.len()
    }

    /// Free everything `holder` has of this resource without events. Used
    /// when the holder is being destroyed.
    pub fn release(&self, holder: &dyn Tangible) -> Option<Decimal> {
        let mut ledger = lock(&self.ledger);
        ledger.debit(holder.id(), Decimal::ZERO).ok().map(|debit| {
            holder.remove_resource_allocation(self.id());
            debit.freed
        })
    }
}

/// Tell a holder its new balance, or that it holds none.
fn notify_balance(holder: &dyn Tangible, resource: EntityId, balance: Decimal) {
    if balance > Decimal::ZERO {
        holder.record_resource_allocation(resource, balance);
    } else {
        holder.remove_resource_allocation(resource);
    }
}
