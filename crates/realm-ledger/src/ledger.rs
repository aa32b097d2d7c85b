//! The bookkeeping behind a [`Resource`](crate::Resource): limits, holder
//! balances and their running total. No locking and no events here; the
//! resource wraps a ledger in its mutex.

use std::collections::BTreeMap;

use realm_types::EntityId;
use rust_decimal::Decimal;

use crate::{AllocationStatus, ResourceError, ResourceLimits};

/// One holder's entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Deposit {
    pub(crate) holder_name: String,
    pub(crate) amount: Decimal,
}

/// Outcome of a successful debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Debit {
    /// How much was actually taken off (the whole balance for a zero free).
    pub(crate) freed: Decimal,
    /// What the holder has left; zero means the entry was removed.
    pub(crate) remaining: Decimal,
}

fn has_fraction(amount: Decimal) -> bool {
    !amount.fract().is_zero()
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Ledger {
    limits: ResourceLimits,
    deposits: BTreeMap<EntityId, Deposit>,
    total: Decimal,
}

impl Ledger {
    pub(crate) fn new(limits: ResourceLimits) -> Self {
        Self {
            limits,
            deposits: BTreeMap::new(),
            total: Decimal::ZERO,
        }
    }

    pub(crate) const fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    pub(crate) const fn total(&self) -> Decimal {
        self.total
    }

    pub(crate) fn balance(&self, holder: EntityId) -> Decimal {
        self.deposits
            .get(&holder)
            .map_or(Decimal::ZERO, |deposit| deposit.amount)
    }

    pub(crate) fn deposits(&self) -> impl Iterator<Item = (EntityId, &Deposit)> {
        self.deposits.iter().map(|(id, deposit)| (*id, deposit))
    }

    // -----------------------------------------------------------------------
    // Limits
    // -----------------------------------------------------------------------

    pub(crate) fn set_amount_available(
        &mut self,
        amount_available: Option<Decimal>,
    ) -> Result<(), ResourceError> {
        if let Some(requested) = amount_available {
            if requested < self.total {
                return Err(ResourceError::AmountAvailableTooSmall {
                    requested,
                    allocated: self.total,
                });
            }
        }
        self.limits.amount_available = amount_available;
        Ok(())
    }

    pub(crate) const fn set_max_amount_per_depositor(&mut self, max: Option<Decimal>) {
        self.limits.max_amount_per_depositor = max;
    }

    pub(crate) const fn set_require_integer_allocations(&mut self, required: bool) {
        self.limits.require_integer_allocations = required;
    }

    // -----------------------------------------------------------------------
    // Balance changes
    // -----------------------------------------------------------------------

    /// Add `amount` to `holder`, enforcing every policy. Returns the new
    /// balance.
    pub(crate) fn credit(
        &mut self,
        holder: EntityId,
        holder_name: &str,
        amount: Decimal,
    ) -> Result<Decimal, AllocationStatus> {
        if amount <= Decimal::ZERO {
            return Err(AllocationStatus::ZeroOrNegativeAmount);
        }
        if self.limits.require_integer_allocations && has_fraction(amount) {
            return Err(AllocationStatus::AllocateIntRequired);
        }

        let total = self
            .total
            .checked_add(amount)
            .ok_or(AllocationStatus::TotalAmountExceeded)?;
        if let Some(available) = self.limits.amount_available {
            if total > available {
                return Err(AllocationStatus::TotalAmountExceeded);
            }
        }

        let balance = self
            .balance(holder)
            .checked_add(amount)
            .ok_or(AllocationStatus::MaxPerDepositorExceeded)?;
        if let Some(max) = self.limits.max_amount_per_depositor {
            if balance > max {
                return Err(AllocationStatus::MaxPerDepositorExceeded);
            }
        }

        self.put(holder, holder_name, balance);
        self.total = total;
        Ok(balance)
    }

    /// Take `amount` off `holder`. Zero takes the whole balance.
    pub(crate) fn debit(
        &mut self,
        holder: EntityId,
        amount: Decimal,
    ) -> Result<Debit, AllocationStatus> {
        if amount < Decimal::ZERO {
            return Err(AllocationStatus::FreeNegativeValue);
        }
        if self.limits.require_integer_allocations && has_fraction(amount) {
            return Err(AllocationStatus::FreeIntRequired);
        }

        let Some(deposit) = self.deposits.get_mut(&holder) else {
            return Err(AllocationStatus::FreeExceedsAllocation);
        };
        if deposit.amount < amount {
            return Err(AllocationStatus::FreeExceedsAllocation);
        }

        let freed = if amount.is_zero() {
            deposit.amount
        } else {
            amount
        };
        let remaining = deposit.amount.saturating_sub(freed);
        if remaining <= Decimal::ZERO {
            self.deposits.remove(&holder);
        } else {
            deposit.amount = remaining;
        }
        self.total = self.total.saturating_sub(freed);

        Ok(Debit {
            freed,
            remaining: remaining.max(Decimal::ZERO),
        })
    }

    /// Put back an amount that was just debited, bypassing policy checks.
    /// Used to roll back a half-finished transfer and to load snapshots.
    pub(crate) fn recredit(&mut self, holder: EntityId, holder_name: &str, amount: Decimal) -> Decimal {
        let balance = self.balance(holder).saturating_add(amount);
        self.put(holder, holder_name, balance);
        self.total = self.total.saturating_add(amount);
        balance
    }

    /// Drop entries whose holder is no longer alive. Returns their ids.
    pub(crate) fn prune(&mut self, is_alive: impl Fn(EntityId) -> bool) -> Vec<EntityId> {
        let dead: Vec<EntityId> = self
            .deposits
            .keys()
            .copied()
            .filter(|id| !is_alive(*id))
            .collect();
        for id in &dead {
            if let Some(deposit) = self.deposits.remove(id) {
                self.total = self.total.saturating_sub(deposit.amount);
            }
        }
        dead
    }

    fn put(&mut self, holder: EntityId, holder_name: &str, amount: Decimal) {
        self.deposits
            .entry(holder)
            .and_modify(|deposit| deposit.amount = amount)
            .or_insert_with(|| Deposit {
                holder_name: holder_name.to_owned(),
                amount,
            });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn sum(ledger: &Ledger) -> Decimal {
        ledger.deposits().map(|(_, deposit)| deposit.amount).sum()
    }

    fn capped(available: Decimal, per_holder: Decimal) -> Ledger {
        Ledger::new(ResourceLimits {
            amount_available: Some(available),
            max_amount_per_depositor: Some(per_holder),
            require_integer_allocations: false,
        })
    }

    #[test]
    fn credit_checks_run_in_order() {
        let mut ledger = Ledger::new(ResourceLimits {
            amount_available: Some(dec!(10)),
            max_amount_per_depositor: Some(dec!(3)),
            require_integer_allocations: true,
        });
        let holder = EntityId::new();

        // Zero beats integer check; fraction beats caps.
        assert_eq!(
            ledger.credit(holder, "h", dec!(0)),
            Err(AllocationStatus::ZeroOrNegativeAmount)
        );
        assert_eq!(
            ledger.credit(holder, "h", dec!(20.5)),
            Err(AllocationStatus::AllocateIntRequired)
        );
        assert_eq!(
            ledger.credit(holder, "h", dec!(20)),
            Err(AllocationStatus::TotalAmountExceeded)
        );
        assert_eq!(
            ledger.credit(holder, "h", dec!(4)),
            Err(AllocationStatus::MaxPerDepositorExceeded)
        );
        assert_eq!(ledger.credit(holder, "h", dec!(3)), Ok(dec!(3)));
        assert_eq!(ledger.total(), dec!(3));
    }

    #[test]
    fn per_holder_cap_counts_existing_balance() {
        let mut ledger = capped(dec!(100), dec!(5));
        let holder = EntityId::new();
        ledger.credit(holder, "h", dec!(4)).unwrap();
        assert_eq!(
            ledger.credit(holder, "h", dec!(2)),
            Err(AllocationStatus::MaxPerDepositorExceeded)
        );
        assert_eq!(ledger.credit(holder, "h", dec!(1)), Ok(dec!(5)));
    }

    #[test]
    fn debit_zero_frees_everything() {
        let mut ledger = Ledger::default();
        let holder = EntityId::new();
        ledger.credit(holder, "h", dec!(2.5)).unwrap();

        let debit = ledger.debit(holder, Decimal::ZERO).unwrap();
        assert_eq!(debit.freed, dec!(2.5));
        assert_eq!(debit.remaining, Decimal::ZERO);
        assert_eq!(ledger.deposits().count(), 0);
        assert_eq!(ledger.total(), Decimal::ZERO);
    }

    #[test]
    fn debit_failures_leave_ledger_alone() {
        let mut ledger = Ledger::default();
        let holder = EntityId::new();
        ledger.credit(holder, "h", dec!(2)).unwrap();

        assert_eq!(
            ledger.debit(holder, dec!(-1)),
            Err(AllocationStatus::FreeNegativeValue)
        );
        assert_eq!(
            ledger.debit(holder, dec!(3)),
            Err(AllocationStatus::FreeExceedsAllocation)
        );
        assert_eq!(
            ledger.debit(EntityId::new(), dec!(1)),
            Err(AllocationStatus::FreeExceedsAllocation)
        );
        assert_eq!(ledger.balance(holder), dec!(2));
        assert_eq!(ledger.total(), dec!(2));
    }

    #[test]
    fn integer_policy_applies_to_frees() {
        let mut ledger = Ledger::new(ResourceLimits {
            require_integer_allocations: true,
            ..ResourceLimits::default()
        });
        let holder = EntityId::new();
        ledger.credit(holder, "h", dec!(2)).unwrap();
        assert_eq!(
            ledger.debit(holder, dec!(0.5)),
            Err(AllocationStatus::FreeIntRequired)
        );
        assert_eq!(ledger.balance(holder), dec!(2));
    }

    #[test]
    fn total_tracks_sum_of_balances() {
        let mut ledger = capped(dec!(50), dec!(20));
        let a = EntityId::new();
        let b = EntityId::new();

        ledger.credit(a, "a", dec!(7.25)).unwrap();
        ledger.credit(b, "b", dec!(12)).unwrap();
        ledger.debit(a, dec!(0.25)).unwrap();
        ledger.credit(a, "a", dec!(1)).unwrap();
        ledger.debit(b, Decimal::ZERO).unwrap();
        let _ = ledger.credit(b, "b", dec!(30));

        assert_eq!(ledger.total(), sum(&ledger));
        assert_eq!(ledger.total(), dec!(8));
        assert!(ledger.deposits().all(|(_, d)| d.amount > Decimal::ZERO));
    }

    #[test]
    fn cap_cannot_drop_below_total() {
        let mut ledger = Ledger::new(ResourceLimits {
            amount_available: Some(dec!(5)),
            ..ResourceLimits::default()
        });
        ledger.credit(EntityId::new(), "h", dec!(5)).unwrap();

        assert!(matches!(
            ledger.set_amount_available(Some(dec!(2))),
            Err(ResourceError::AmountAvailableTooSmall { .. })
        ));
        assert_eq!(ledger.limits().amount_available, Some(dec!(5)));
        ledger.set_amount_available(Some(dec!(10))).unwrap();
        assert_eq!(ledger.limits().amount_available, Some(dec!(10)));
        ledger.set_amount_available(None).unwrap();
        assert_eq!(ledger.limits().amount_available, None);
    }

    #[test]
    fn prune_removes_dead_holders_and_fixes_total() {
        let mut ledger = Ledger::default();
        let alive = EntityId::new();
        let dead = EntityId::new();
        ledger.credit(alive, "alive", dec!(1)).unwrap();
        ledger.credit(dead, "dead", dec!(4)).unwrap();

        let pruned = ledger.prune(|id| id == alive);
        assert_eq!(pruned, vec![dead]);
        assert_eq!(ledger.total(), dec!(1));
    }
}
