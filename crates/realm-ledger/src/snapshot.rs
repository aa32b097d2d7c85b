//! Persisted form of a [`Resource`].
//!
//! The running total is not stored; it is recomputed from the depositors on
//! restore. Depositors are stored by holder name and resolved through a
//! [`HolderDirectory`].

use std::collections::BTreeSet;
use std::sync::Arc;

use realm_events::{TriggerRegistry, TriggerSnapshot};
use realm_types::EntityId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ledger::Ledger;
use crate::resource::{Details, lock};
use crate::{HolderDirectory, Resource, ResourceError, ResourceLimits};

/// Persisted state of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    /// Unique name.
    pub name: String,
    /// Singular display title.
    pub title: String,
    /// Plural name.
    pub plural_name: String,
    /// Plural display title.
    pub plural_title: String,
    /// Allocation policies.
    #[serde(flatten)]
    pub limits: ResourceLimits,
    /// Set tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Restorable triggers of the resource's listener.
    #[serde(default)]
    pub triggers: Vec<TriggerSnapshot>,
    /// Current holders and their balances.
    #[serde(default)]
    pub depositors: Vec<DepositorSnapshot>,
}

/// One persisted ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositorSnapshot {
    /// Holder name.
    pub depositor: String,
    /// Holder balance.
    pub amount: Decimal,
}

impl Resource {
    /// Capture this resource's state.
    pub fn snapshot(&self) -> ResourceSnapshot {
        let (limits, depositors) = {
            let ledger = lock(&self.ledger);
            let depositors = ledger
                .deposits()
                .map(|(_, deposit)| DepositorSnapshot {
                    depositor: deposit.holder_name.clone(),
                    amount: deposit.amount,
                })
                .collect();
            (*ledger.limits(), depositors)
        };
        let details = self.details();

        ResourceSnapshot {
            name: self.name().to_owned(),
            title: details.title.clone(),
            plural_name: details.plural_name.clone(),
            plural_title: details.plural_title.clone(),
            limits,
            tags: details.tags.iter().cloned().collect(),
            triggers: self.listener().snapshot(),
            depositors,
        }
    }

    /// Rebuild a resource from `snapshot`.
    ///
    /// Triggers are rebuilt through `triggers` with `context`; depositor
    /// names are resolved through `holders`, and each resolved holder is
    /// told its balance.
    ///
    /// # Errors
    ///
    /// - [`ResourceError::UnknownDepositor`] if a depositor name does not
    ///   resolve.
    /// - [`ResourceError::InvalidDepositAmount`] for a non-positive balance,
    ///   or a fractional one on an integer-only resource.
    /// - [`ResourceError::AmountAvailableTooSmall`] if the balances add up
    ///   to more than the supply cap.
    /// - [`ResourceError::Trigger`] if a trigger cannot be rebuilt.
    pub fn restore<C>(
        id: EntityId,
        snapshot: &ResourceSnapshot,
        triggers: &TriggerRegistry<C>,
        context: &C,
        holders: &dyn HolderDirectory,
    ) -> Result<Self, ResourceError> {
        let listener = triggers.restore_listener(&snapshot.triggers, context)?;

        let mut ledger = Ledger::new(snapshot.limits);
        let mut resolved = Vec::with_capacity(snapshot.depositors.len());
        for entry in &snapshot.depositors {
            let invalid = entry.amount <= Decimal::ZERO
                || (snapshot.limits.require_integer_allocations && !entry.amount.fract().is_zero());
            if invalid {
                return Err(ResourceError::InvalidDepositAmount {
                    depositor: entry.depositor.clone(),
                    amount: entry.amount,
                });
            }
            let holder =
                holders
                    .holder(&entry.depositor)
                    .ok_or_else(|| ResourceError::UnknownDepositor {
                        name: entry.depositor.clone(),
                    })?;
            let balance = ledger.recredit(holder.id(), &entry.depositor, entry.amount);
            resolved.push((holder, balance));
        }

        if let Some(requested) = snapshot.limits.amount_available {
            if requested < ledger.total() {
                return Err(ResourceError::AmountAvailableTooSmall {
                    requested,
                    allocated: ledger.total(),
                });
            }
        }

        let resource = Self::assemble(
            id,
            snapshot.name.clone(),
            Details {
                title: snapshot.title.clone(),
                plural_name: snapshot.plural_name.clone(),
                plural_title: snapshot.plural_title.clone(),
                tags: snapshot.tags.iter().cloned().collect::<BTreeSet<_>>(),
            },
            ledger,
            Arc::new(listener),
        );

        {
            let _ledger = lock(&resource.ledger);
            for (holder, balance) in &resolved {
                holder.record_resource_allocation(id, *balance);
            }
        }
        debug!(
            resource = %resource.name(),
            depositors = resolved.len(),
            "Resource restored from snapshot"
        );
        Ok(resource)
    }
}
