//! The [`Resource`] entity: identity, display names, tags and limits.
//! Balance-changing operations live in the allocation module.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use realm_events::EventListener;
use realm_types::EntityId;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ResourceError;
use crate::ledger::Ledger;

/// With no supply cap, a place holding a sticky resource keeps its balance
/// when a being takes some from it.
pub const STICKY_TAG: &str = "sticky";

/// An ephemeral resource vanishes when dropped instead of landing in the
/// dropper's location.
pub const EPHEMERAL_TAG: &str = "ephemeral";

/// Allocation policies of a resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Total supply. `None` means unlimited.
    #[serde(default)]
    pub amount_available: Option<Decimal>,
    /// Largest balance any one holder may have. `None` means unlimited.
    #[serde(default)]
    pub max_amount_per_depositor: Option<Decimal>,
    /// Only whole-number amounts may be allocated or freed.
    #[serde(default)]
    pub require_integer_allocations: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct Details {
    pub(crate) title: String,
    pub(crate) plural_name: String,
    pub(crate) plural_title: String,
    pub(crate) tags: BTreeSet<String>,
}

/// A divisible quantity that world entities can hold amounts of.
pub struct Resource {
    id: EntityId,
    name: String,
    details: RwLock<Details>,
    pub(crate) ledger: Mutex<Ledger>,
    pub(crate) transfer_lock: Mutex<()>,
    listener: Arc<EventListener>,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Resource {
    /// Create a resource with a fresh id and an empty ledger.
    pub fn new(name: impl Into<String>, limits: ResourceLimits) -> Self {
        Self::with_id(EntityId::new(), name, limits)
    }

    /// Create a resource with a known id.
    pub fn with_id(id: EntityId, name: impl Into<String>, limits: ResourceLimits) -> Self {
        let name = name.into();
        let plural_name = format!("{name}s");
        Self::assemble(
            id,
            name.clone(),
            Details {
                title: name,
                plural_title: plural_name.clone(),
                plural_name,
                tags: BTreeSet::new(),
            },
            Ledger::new(limits),
            Arc::new(EventListener::new()),
        )
    }

    pub(crate) fn assemble(
        id: EntityId,
        name: String,
        details: Details,
        ledger: Ledger,
        listener: Arc<EventListener>,
    ) -> Self {
        Self {
            id,
            name,
            details: RwLock::new(details),
            ledger: Mutex::new(ledger),
            transfer_lock: Mutex::new(()),
            listener,
        }
    }

    /// Copy this resource under a new id and name.
    ///
    /// Limits, display names, tags and the trigger lists of the listener are
    /// copied. The ledger is not: allocations belong to specific holders,
    /// not to the resource template.
    pub fn clone_as(&self, id: EntityId, name: impl Into<String>) -> Self {
        let limits = *lock(&self.ledger).limits();
        Self::assemble(
            id,
            name.into(),
            self.details().clone(),
            Ledger::new(limits),
            Arc::new((*self.listener).clone()),
        )
    }

    pub(crate) fn details(&self) -> RwLockReadGuard<'_, Details> {
        self.details.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn details_mut(&self) -> RwLockWriteGuard<'_, Details> {
        self.details.write().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Identity and display
    // -----------------------------------------------------------------------

    /// Stable identifier.
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Listener notified of this resource's events.
    pub fn listener(&self) -> Arc<EventListener> {
        Arc::clone(&self.listener)
    }

    /// Singular display title.
    pub fn title(&self) -> String {
        self.details().title.clone()
    }

    /// Set the singular display title.
    pub fn set_title(&self, title: impl Into<String>) {
        self.details_mut().title = title.into();
    }

    /// Plural name. Defaults to the name with an "s" appended.
    pub fn plural_name(&self) -> String {
        self.details().plural_name.clone()
    }

    /// Set the plural name.
    pub fn set_plural_name(&self, plural: impl Into<String>) {
        self.details_mut().plural_name = plural.into();
    }

    /// Plural display title.
    pub fn plural_title(&self) -> String {
        self.details().plural_title.clone()
    }

    /// Set the plural display title.
    pub fn set_plural_title(&self, plural_title: impl Into<String>) {
        self.details_mut().plural_title = plural_title.into();
    }

    /// Whether `name` is this resource's plural name.
    pub fn is_plural(&self, name: &str) -> bool {
        self.details().plural_name == name
    }

    /// Render `amount`. Integer-only resources round to a whole number.
    pub fn amount_to_string(&self, amount: Decimal) -> String {
        if self.require_integer_allocations() {
            amount
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_string()
        } else {
            amount.normalize().to_string()
        }
    }

    /// Title to show next to `amount`: singular for exactly one unit of an
    /// integer-only resource, plural otherwise.
    pub fn title_for(&self, amount: Decimal) -> String {
        let one = amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            == Decimal::ONE;
        if self.require_integer_allocations() && one {
            self.title()
        } else {
            self.plural_title()
        }
    }

    // -----------------------------------------------------------------------
    // Tags
    // -----------------------------------------------------------------------

    /// Set a tag.
    pub fn set_tag(&self, tag: impl Into<String>) {
        self.details_mut().tags.insert(tag.into());
    }

    /// Remove a tag. Returns whether it was set.
    pub fn remove_tag(&self, tag: &str) -> bool {
        self.details_mut().tags.remove(tag)
    }

    /// Whether a tag is set.
    pub fn is_tag_set(&self, tag: &str) -> bool {
        self.details().tags.contains(tag)
    }

    /// All tags, sorted.
    pub fn tags(&self) -> Vec<String> {
        self.details().tags.iter().cloned().collect()
    }

    /// Whether the [`STICKY_TAG`] is set.
    pub fn is_sticky(&self) -> bool {
        self.is_tag_set(STICKY_TAG)
    }

    /// Whether the [`EPHEMERAL_TAG`] is set.
    pub fn is_ephemeral(&self) -> bool {
        self.is_tag_set(EPHEMERAL_TAG)
    }

    // -----------------------------------------------------------------------
    // Limits
    // -----------------------------------------------------------------------

    /// Current allocation policies.
    pub fn limits(&self) -> ResourceLimits {
        *lock(&self.ledger).limits()
    }

    /// Total supply, `None` if unlimited.
    pub fn amount_available(&self) -> Option<Decimal> {
        lock(&self.ledger).limits().amount_available
    }

    /// Change the total supply. `None` makes it unlimited.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::AmountAvailableTooSmall`] if the new cap is
    /// below what is already allocated; the old cap is kept.
    pub fn set_amount_available(&self, amount_available: Option<Decimal>) -> Result<(), ResourceError> {
        lock(&self.ledger).set_amount_available(amount_available)?;
        info!(
            resource = %self.name,
            amount_available = ?amount_available,
            "Resource supply changed"
        );
        Ok(())
    }

    /// Largest balance any one holder may have, `None` if unlimited.
    pub fn max_amount_per_depositor(&self) -> Option<Decimal> {
        lock(&self.ledger).limits().max_amount_per_depositor
    }

    /// Change the per-holder cap. Always accepted: holders already above a
    /// lowered cap keep their balance but cannot allocate more.
    pub fn set_max_amount_per_depositor(&self, max: Option<Decimal>) {
        lock(&self.ledger).set_max_amount_per_depositor(max);
    }

    /// Whether only whole-number amounts may be allocated or freed.
    pub fn require_integer_allocations(&self) -> bool {
        lock(&self.ledger).limits().require_integer_allocations
    }

    /// Turn the integer-only policy on or off. Existing balances are not
    /// revisited.
    pub fn set_require_integer_allocations(&self, required: bool) {
        lock(&self.ledger).set_require_integer_allocations(required);
    }

    // -----------------------------------------------------------------------
    // Ledger reads
    // -----------------------------------------------------------------------

    /// Sum of all holder balances.
    pub fn total_allocated(&self) -> Decimal {
        lock(&self.ledger).total()
    }

    /// A holder's balance, zero if it holds none.
    pub fn balance_of(&self, holder: EntityId) -> Decimal {
        lock(&self.ledger).balance(holder)
    }

    /// Every holder with its balance, ordered by id.
    pub fn depositors(&self) -> Vec<(EntityId, Decimal)> {
        lock(&self.ledger)
            .deposits()
            .map(|(id, deposit)| (id, deposit.amount))
            .collect()
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("limits", &self.limits())
            .field("total_allocated", &self.total_allocated())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn gold() -> Resource {
        Resource::new(
            "gold coin",
            ResourceLimits {
                require_integer_allocations: true,
                ..ResourceLimits::default()
            },
        )
    }

    #[test]
    fn plural_defaults_to_name_plus_s() {
        let resource = gold();
        assert_eq!(resource.plural_name(), "gold coins");
        assert!(resource.is_plural("gold coins"));
        assert!(!resource.is_plural("gold coin"));
    }

    #[test]
    fn titles_follow_amount() {
        let resource = gold();
        resource.set_title("shiny gold coin");
        resource.set_plural_title("shiny gold coins");
        assert_eq!(resource.title_for(dec!(1)), "shiny gold coin");
        assert_eq!(resource.title_for(dec!(2)), "shiny gold coins");

        resource.set_require_integer_allocations(false);
        assert_eq!(resource.title_for(dec!(1)), "shiny gold coins");
    }

    #[test]
    fn amounts_render_by_policy() {
        let resource = gold();
        assert_eq!(resource.amount_to_string(dec!(2.5)), "3");
        resource.set_require_integer_allocations(false);
        assert_eq!(resource.amount_to_string(dec!(2.50)), "2.5");
    }

    #[test]
    fn tags_toggle() {
        let resource = gold();
        assert!(!resource.is_sticky());
        resource.set_tag(STICKY_TAG);
        resource.set_tag(EPHEMERAL_TAG);
        assert!(resource.is_sticky());
        assert!(resource.is_ephemeral());
        assert!(resource.remove_tag(STICKY_TAG));
        assert!(!resource.remove_tag(STICKY_TAG));
        assert_eq!(resource.tags(), vec![EPHEMERAL_TAG.to_owned()]);
    }

    #[test]
    fn clone_copies_policy_but_not_ledger() {
        let resource = gold();
        resource.set_amount_available(Some(dec!(10))).unwrap();
        resource.set_tag(STICKY_TAG);
        {
            let mut ledger = lock(&resource.ledger);
            ledger.credit(EntityId::new(), "someone", dec!(4)).unwrap();
        }

        let copy = resource.clone_as(EntityId::new(), "silver coin");
        assert_eq!(copy.name(), "silver coin");
        assert_eq!(copy.amount_available(), Some(dec!(10)));
        assert!(copy.require_integer_allocations());
        assert!(copy.is_sticky());
        assert_eq!(copy.total_allocated(), Decimal::ZERO);
        assert!(copy.depositors().is_empty());
        assert_eq!(resource.total_allocated(), dec!(4));
    }

    #[test]
    fn lowering_per_holder_cap_is_always_accepted() {
        let resource = gold();
        {
            let mut ledger = lock(&resource.ledger);
            ledger.credit(EntityId::new(), "someone", dec!(8)).unwrap();
        }
        resource.set_max_amount_per_depositor(Some(dec!(2)));
        assert_eq!(resource.max_amount_per_depositor(), Some(dec!(2)));
        assert_eq!(resource.total_allocated(), dec!(8));
    }
}
