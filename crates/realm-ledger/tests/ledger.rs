//! Ledger behavior through the public, event-gated API.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use realm_events::{EventHandler, EventListener, EventReturn, FnTrigger, TriggerRegistry};
use realm_ledger::{
    AFTER_ALLOCATE, AFTER_FREE, AFTER_TRANSFER, AllocationStatus, BEFORE_ALLOCATE, BEFORE_FREE,
    BEFORE_TRANSFER, EPHEMERAL_TAG, HolderDirectory, Resource, ResourceError, ResourceLimits,
    STICKY_TAG, Tangible,
};
use realm_types::{EntityId, EventArgument};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Minimal holder that mirrors the ledger on its own side.
#[derive(Debug)]
struct Holder {
    id: EntityId,
    name: String,
    listener: Arc<EventListener>,
    held: Mutex<BTreeMap<EntityId, Decimal>>,
}

impl Holder {
    fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            id: EntityId::new(),
            name: name.to_owned(),
            listener: Arc::new(EventListener::new()),
            held: Mutex::new(BTreeMap::new()),
        })
    }

    fn holds(&self, resource: &Resource) -> Option<Decimal> {
        self.held.lock().unwrap().get(&resource.id()).copied()
    }
}

impl Tangible for Holder {
    fn id(&self) -> EntityId {
        self.id
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn listener(&self) -> Arc<EventListener> {
        Arc::clone(&self.listener)
    }

    fn record_resource_allocation(&self, resource: EntityId, balance: Decimal) {
        self.held.lock().unwrap().insert(resource, balance);
    }

    fn remove_resource_allocation(&self, resource: EntityId) {
        self.held.lock().unwrap().remove(&resource);
    }
}

struct Directory(Vec<Arc<Holder>>);

impl HolderDirectory for Directory {
    fn holder(&self, name: &str) -> Option<Arc<dyn Tangible>> {
        self.0
            .iter()
            .find(|h| h.name == name)
            .map(|h| Arc::clone(h) as Arc<dyn Tangible>)
    }
}

fn veto() -> Arc<FnTrigger> {
    Arc::new(FnTrigger::new(|_| EventReturn::new(false, true)))
}

fn sum_of_balances(resource: &Resource) -> Decimal {
    resource.depositors().iter().map(|(_, amount)| *amount).sum()
}

#[test]
fn totals_are_conserved_across_operations() {
    let events = EventHandler::new();
    let gold = Resource::new(
        "gold",
        ResourceLimits {
            amount_available: Some(dec!(100)),
            max_amount_per_depositor: Some(dec!(40)),
            require_integer_allocations: false,
        },
    );
    let alice = Holder::new("alice");
    let bob = Holder::new("bob");

    let steps = [
        gold.allocate(&events, alice.as_ref(), dec!(30)),
        gold.allocate(&events, bob.as_ref(), dec!(12.5)),
        gold.transfer(&events, alice.as_ref(), bob.as_ref(), dec!(10)),
        gold.free(&events, bob.as_ref(), dec!(2.5)),
        gold.transfer(&events, bob.as_ref(), alice.as_ref(), dec!(20)),
        gold.free(&events, alice.as_ref(), Decimal::ZERO),
        gold.allocate(&events, bob.as_ref(), dec!(101)),
    ];
    assert_eq!(&steps[..6], &[AllocationStatus::Success; 6]);
    assert_eq!(steps[6], AllocationStatus::TotalAmountExceeded);

    assert_eq!(gold.total_allocated(), sum_of_balances(&gold));
    assert!(gold.depositors().iter().all(|(_, amount)| *amount > Decimal::ZERO));
    assert_eq!(alice.holds(&gold), None);
    assert_eq!(gold.balance_of(alice.id()), Decimal::ZERO);
    assert_eq!(bob.holds(&gold), None);
}

#[test]
fn failed_transfer_restores_the_source() {
    let events = EventHandler::new();
    let arrows = Resource::new(
        "arrow",
        ResourceLimits {
            max_amount_per_depositor: Some(dec!(5)),
            ..ResourceLimits::default()
        },
    );
    let archer = Holder::new("archer");
    let quiver = Holder::new("quiver");
    arrows.allocate(&events, archer.as_ref(), dec!(4));
    arrows.allocate(&events, quiver.as_ref(), dec!(4));

    let status = arrows.transfer(&events, archer.as_ref(), quiver.as_ref(), dec!(3));

    assert_eq!(status, AllocationStatus::MaxPerDepositorExceeded);
    assert_eq!(arrows.balance_of(archer.id()), dec!(4));
    assert_eq!(archer.holds(&arrows), Some(dec!(4)));
    assert_eq!(arrows.total_allocated(), dec!(8));
}

#[test]
fn transfer_of_entire_balance_removes_source_entry() {
    let events = EventHandler::new();
    let water = Resource::new("water", ResourceLimits::default());
    let well = Holder::new("well");
    let bucket = Holder::new("bucket");
    water.allocate(&events, well.as_ref(), dec!(2));

    let status = water.transfer(&events, well.as_ref(), bucket.as_ref(), dec!(2));

    assert!(status.is_success());
    assert_eq!(well.holds(&water), None);
    assert_eq!(bucket.holds(&water), Some(dec!(2)));
    assert_eq!(water.depositors(), vec![(bucket.id(), dec!(2))]);
}

#[test]
fn integer_policy_rejects_fractions() {
    let events = EventHandler::new();
    let coins = Resource::new(
        "coin",
        ResourceLimits {
            require_integer_allocations: true,
            ..ResourceLimits::default()
        },
    );
    let purse = Holder::new("purse");
    coins.allocate(&events, purse.as_ref(), dec!(3));

    assert_eq!(
        coins.allocate(&events, purse.as_ref(), dec!(1.5)),
        AllocationStatus::AllocateIntRequired
    );
    assert_eq!(
        coins.free(&events, purse.as_ref(), dec!(0.5)),
        AllocationStatus::FreeIntRequired
    );
    assert_eq!(coins.balance_of(purse.id()), dec!(3));
    assert_eq!(coins.total_allocated(), dec!(3));
}

#[test]
fn supply_cap_cannot_drop_below_allocated() {
    let events = EventHandler::new();
    let mana = Resource::new(
        "mana",
        ResourceLimits {
            amount_available: Some(dec!(5.0)),
            ..ResourceLimits::default()
        },
    );
    let mage = Holder::new("mage");
    mana.allocate(&events, mage.as_ref(), dec!(5.0));

    assert!(matches!(
        mana.set_amount_available(Some(dec!(2.0))),
        Err(ResourceError::AmountAvailableTooSmall { .. })
    ));
    assert_eq!(mana.amount_available(), Some(dec!(5.0)));
    mana.set_amount_available(Some(dec!(10.0))).unwrap();
    assert_eq!(mana.amount_available(), Some(dec!(10.0)));

    mana.set_amount_available(None).unwrap();
    assert!(mana.allocate(&events, mage.as_ref(), dec!(1000)).is_success());
}

#[test]
fn vetoes_abort_without_touching_the_ledger() {
    let events = EventHandler::new();
    let gold = Resource::new("gold", ResourceLimits::default());
    let miser = Holder::new("miser");
    let thief = Holder::new("thief");
    gold.allocate(&events, miser.as_ref(), dec!(10));

    miser.listener.add_trigger(BEFORE_FREE, veto());
    thief.listener.add_trigger(BEFORE_TRANSFER, veto());
    events.global().add_trigger(BEFORE_ALLOCATE, veto());

    assert_eq!(
        gold.free(&events, miser.as_ref(), dec!(1)),
        AllocationStatus::Abort
    );
    assert_eq!(
        gold.transfer(&events, miser.as_ref(), thief.as_ref(), dec!(1)),
        AllocationStatus::Abort
    );
    assert_eq!(
        gold.allocate(&events, thief.as_ref(), dec!(1)),
        AllocationStatus::Abort
    );
    assert_eq!(gold.depositors(), vec![(miser.id(), dec!(10))]);

    // Silent operations bypass the pipeline.
    assert!(gold.allocate_silently(thief.as_ref(), dec!(1)).is_success());
}

#[test]
fn after_event_carries_transfer_arguments() {
    let events = EventHandler::new();
    let gold = Resource::new("gold", ResourceLimits::default());
    let from = Holder::new("from");
    let to = Holder::new("to");
    gold.allocate(&events, from.as_ref(), dec!(3));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    gold.listener().add_trigger(
        AFTER_TRANSFER,
        Arc::new(FnTrigger::new(move |event| {
            sink.lock().unwrap().extend_from_slice(event.arguments());
            EventReturn::PROCEED
        })),
    );

    gold.transfer(&events, from.as_ref(), to.as_ref(), dec!(2));
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            EventArgument::Resource(gold.id()),
            EventArgument::Entity(from.id()),
            EventArgument::Entity(to.id()),
            EventArgument::Amount(dec!(2)),
        ]
    );
}

#[test]
fn failed_operations_fire_no_after_event() {
    let events = EventHandler::new();
    let gold = Resource::new("gold", ResourceLimits::default());
    let holder = Holder::new("holder");

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    gold.listener().add_trigger(
        "afterFreeResource",
        Arc::new(FnTrigger::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            EventReturn::PROCEED
        })),
    );

    assert_eq!(
        gold.free(&events, holder.as_ref(), dec!(1)),
        AllocationStatus::FreeExceedsAllocation
    );
    assert_eq!(fired.load(Ordering::SeqCst), 0);
    gold.allocate(&events, holder.as_ref(), dec!(1));
    gold.free(&events, holder.as_ref(), dec!(1));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn freeing_everything_reports_the_amount_freed() {
    let events = EventHandler::new();
    let gold = Resource::new("gold", ResourceLimits::default());
    let holder = Holder::new("holder");
    gold.allocate(&events, holder.as_ref(), dec!(7.5));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    gold.listener().add_trigger(
        AFTER_FREE,
        Arc::new(FnTrigger::new(move |event| {
            sink.lock().unwrap().push(event.argument(2).cloned());
            EventReturn::PROCEED
        })),
    );

    assert!(gold.free(&events, holder.as_ref(), Decimal::ZERO).is_success());
    assert_eq!(
        *seen.lock().unwrap(),
        vec![Some(EventArgument::Amount(dec!(7.5)))]
    );
    assert_eq!(gold.balance_of(holder.id()), Decimal::ZERO);
}

#[test]
fn sticky_reservoir_is_never_depleted() {
    let events = EventHandler::new();
    let water = Resource::new("water", ResourceLimits::default());
    water.set_tag(STICKY_TAG);
    let fountain = Holder::new("fountain");
    let traveler = Holder::new("traveler");
    water.allocate(&events, fountain.as_ref(), dec!(10));

    assert!(water.take(&events, fountain.as_ref(), traveler.as_ref(), dec!(4)).is_success());
    assert!(water.take(&events, fountain.as_ref(), traveler.as_ref(), dec!(10)).is_success());
    assert_eq!(
        water.take(&events, fountain.as_ref(), traveler.as_ref(), dec!(11)),
        AllocationStatus::FreeExceedsAllocation
    );

    assert_eq!(water.balance_of(fountain.id()), dec!(10));
    assert_eq!(water.balance_of(traveler.id()), dec!(14));
    assert_eq!(water.total_allocated(), dec!(24));
}

#[test]
fn source_can_veto_a_sticky_draw() {
    let events = EventHandler::new();
    let water = Resource::new("water", ResourceLimits::default());
    water.set_tag(STICKY_TAG);
    let spring = Holder::new("spring");
    let pilgrim = Holder::new("pilgrim");
    water.allocate(&events, spring.as_ref(), dec!(10));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    spring.listener.add_trigger(
        AFTER_ALLOCATE,
        Arc::new(FnTrigger::new(move |event| {
            sink.lock().unwrap().extend_from_slice(event.arguments());
            EventReturn::PROCEED
        })),
    );
    assert!(water.take(&events, spring.as_ref(), pilgrim.as_ref(), dec!(2)).is_success());
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            EventArgument::Resource(water.id()),
            EventArgument::Entity(pilgrim.id()),
            EventArgument::Amount(dec!(2)),
            EventArgument::Entity(spring.id()),
        ]
    );

    spring.listener.add_trigger(BEFORE_ALLOCATE, veto());
    assert_eq!(
        water.take(&events, spring.as_ref(), pilgrim.as_ref(), dec!(2)),
        AllocationStatus::Abort
    );
    assert_eq!(water.balance_of(pilgrim.id()), dec!(2));
    assert_eq!(water.total_allocated(), dec!(12));
}

#[test]
fn capped_sticky_resource_takes_by_transfer() {
    let events = EventHandler::new();
    let water = Resource::new(
        "water",
        ResourceLimits {
            amount_available: Some(dec!(10)),
            ..ResourceLimits::default()
        },
    );
    water.set_tag(STICKY_TAG);
    let well = Holder::new("well");
    let cup = Holder::new("cup");
    water.allocate(&events, well.as_ref(), dec!(10));

    assert!(water.take(&events, well.as_ref(), cup.as_ref(), dec!(3)).is_success());
    assert_eq!(water.balance_of(well.id()), dec!(7));
    assert_eq!(water.total_allocated(), dec!(10));
}

#[test]
fn ephemeral_drops_vanish() {
    let events = EventHandler::new();
    let smoke = Resource::new("smoke", ResourceLimits::default());
    let torch = Resource::new("torch", ResourceLimits::default());
    smoke.set_tag(EPHEMERAL_TAG);
    let player = Holder::new("player");
    let room = Holder::new("room");
    smoke.allocate(&events, player.as_ref(), dec!(2));
    torch.allocate(&events, player.as_ref(), dec!(2));

    assert!(smoke.drop_into(&events, player.as_ref(), room.as_ref(), dec!(2)).is_success());
    assert!(torch.drop_into(&events, player.as_ref(), room.as_ref(), dec!(2)).is_success());

    assert_eq!(smoke.total_allocated(), Decimal::ZERO);
    assert_eq!(torch.balance_of(room.id()), dec!(2));
}

#[test]
fn concurrent_transfers_conserve_the_total() {
    let events = Arc::new(EventHandler::new());
    let gold = Arc::new(Resource::new("gold", ResourceLimits::default()));
    let a = Holder::new("a");
    let b = Holder::new("b");
    gold.allocate(events.as_ref(), a.as_ref(), dec!(500));
    gold.allocate(events.as_ref(), b.as_ref(), dec!(500));

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let (events, gold, a, b) = (
                Arc::clone(&events),
                Arc::clone(&gold),
                Arc::clone(&a),
                Arc::clone(&b),
            );
            thread::spawn(move || {
                for _ in 0..200 {
                    if i % 2 == 0 {
                        gold.transfer(events.as_ref(), a.as_ref(), b.as_ref(), dec!(3));
                    } else {
                        gold.transfer(events.as_ref(), b.as_ref(), a.as_ref(), dec!(3));
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(gold.total_allocated(), dec!(1000));
    assert_eq!(sum_of_balances(&gold), dec!(1000));
}

#[test]
fn prune_forgets_dead_holders() {
    let events = EventHandler::new();
    let gold = Resource::new("gold", ResourceLimits::default());
    let living = Holder::new("living");
    let departed = Holder::new("departed");
    gold.allocate(&events, living.as_ref(), dec!(1));
    gold.allocate(&events, departed.as_ref(), dec!(2));

    let alive = living.id();
    assert_eq!(gold.prune(|id| id == alive), 1);
    assert_eq!(gold.total_allocated(), dec!(1));
}

#[test]
fn snapshot_restores_through_the_directory() {
    let events = EventHandler::new();
    let gold = Resource::new(
        "gold",
        ResourceLimits {
            amount_available: Some(dec!(50)),
            ..ResourceLimits::default()
        },
    );
    gold.set_plural_title("piles of gold");
    let alice = Holder::new("alice");
    let bob = Holder::new("bob");
    gold.allocate(&events, alice.as_ref(), dec!(7));
    gold.allocate(&events, bob.as_ref(), dec!(3));

    let snapshot = gold.snapshot();
    let json = serde_json::to_value(&snapshot).unwrap();
    assert!(json.get("total_allocated").is_none());
    assert_eq!(json["depositors"].as_array().unwrap().len(), 2);

    let fresh_alice = Holder::new("alice");
    let fresh_bob = Holder::new("bob");
    let directory = Directory(vec![Arc::clone(&fresh_alice), Arc::clone(&fresh_bob)]);
    let registry: TriggerRegistry<()> = TriggerRegistry::new();
    let restored =
        Resource::restore(EntityId::new(), &snapshot, &registry, &(), &directory).unwrap();

    assert_eq!(restored.total_allocated(), dec!(10));
    assert_eq!(restored.plural_title(), "piles of gold");
    assert_eq!(restored.balance_of(fresh_alice.id()), dec!(7));
    assert_eq!(fresh_bob.holds(&restored), Some(dec!(3)));

    let strangers = Directory(vec![fresh_alice]);
    assert!(matches!(
        Resource::restore(EntityId::new(), &snapshot, &registry, &(), &strangers),
        Err(ResourceError::UnknownDepositor { name }) if name == "bob"
    ));
}
