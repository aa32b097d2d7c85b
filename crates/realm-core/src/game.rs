//! The game container.
//!
//! A [`Game`] owns the global event handler, the timer, the job and trigger
//! registries, and every entity and resource in the world. It is always
//! handled through an `Arc`; jobs and triggers keep a [`GameRef`] back to
//! it so they never keep a finished game alive.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use realm_events::{
    Event, EventDispatcher, EventHandler, EventListener, TriggerRegistry, TriggerSnapshot,
};
use realm_ledger::{HolderDirectory, Resource, ResourceSnapshot, Tangible};
use realm_timer::{Executions, JobCatalog, JobRegistry, Schedule, Timer, TimerJob, TimerSnapshot};
use realm_types::{EntityId, EventArgument, JobId};
use tracing::{debug, info};

use crate::config::GameConfig;
use crate::entity::{Entity, EntityKind};
use crate::error::GameError;
use crate::jobs::{self, AutoAttackJob, WanderJob};
use crate::triggers::{self, RespawnTrigger};

/// Weak handle to a game, handed to jobs and triggers.
pub type GameRef = Weak<Game>;

/// Fired before one being attacks another; a veto cancels the attack.
pub const BEFORE_ATTACK: &str = "beforeAttack";
/// Fired after an attack landed.
pub const AFTER_ATTACK: &str = "afterAttack";
/// Fired before a being dies; a veto keeps it alive.
pub const BEFORE_DIE: &str = "beforeDie";
/// Fired after a being died.
pub const AFTER_DIE: &str = "afterDie";
/// Fired before a dead being comes back; a veto keeps it dead.
pub const BEFORE_RESPAWN: &str = "beforeRespawn";
/// Fired after a being came back.
pub const AFTER_RESPAWN: &str = "afterRespawn";
/// Fired before an entity moves to another place; a veto keeps it put.
pub const BEFORE_MOVE: &str = "beforeMove";
/// Fired after an entity moved.
pub const AFTER_MOVE: &str = "afterMove";

/// Name-unique store of shared values.
struct Directory<T> {
    by_id: BTreeMap<EntityId, Arc<T>>,
    by_name: BTreeMap<String, EntityId>,
}

impl<T> Directory<T> {
    const fn new() -> Self {
        Self {
            by_id: BTreeMap::new(),
            by_name: BTreeMap::new(),
        }
    }

    fn insert(&mut self, id: EntityId, name: &str, value: T) -> Result<Arc<T>, GameError> {
        if self.by_name.contains_key(name) {
            return Err(GameError::DuplicateName {
                name: name.to_owned(),
            });
        }
        let value = Arc::new(value);
        self.by_name.insert(name.to_owned(), id);
        self.by_id.insert(id, Arc::clone(&value));
        Ok(value)
    }

    fn get(&self, id: EntityId) -> Option<Arc<T>> {
        self.by_id.get(&id).cloned()
    }

    fn by_name(&self, name: &str) -> Option<Arc<T>> {
        self.by_name.get(name).and_then(|id| self.get(*id))
    }

    fn remove(&mut self, id: EntityId, name: &str) -> Option<Arc<T>> {
        let removed = self.by_id.remove(&id)?;
        self.by_name.remove(name);
        Some(removed)
    }

    fn values(&self) -> Vec<Arc<T>> {
        self.by_id.values().cloned().collect()
    }
}

/// A running world.
pub struct Game {
    name: String,
    events: EventHandler,
    timer: Timer,
    jobs: Arc<JobRegistry<GameRef>>,
    triggers: TriggerRegistry<GameRef>,
    entities: RwLock<Directory<Entity>>,
    resources: RwLock<Directory<Resource>>,
    this: GameRef,
}

impl Game {
    /// Build a game from its configuration. The timer starts stopped.
    ///
    /// The built-in job kinds (`autoattack`, `wander`, `respawn`) and trigger
    /// kinds (`respawn`) are registered, and a respawn trigger is installed on
    /// the global listener for `afterDie`.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Timer`] if the timer configuration is invalid.
    pub fn new(config: &GameConfig) -> Result<Arc<Self>, GameError> {
        let jobs = Arc::new(jobs::builtin_registry());
        let catalog: Arc<dyn JobCatalog> = Arc::clone(&jobs) as Arc<dyn JobCatalog>;
        let timer = Timer::with_catalog(config.timer, catalog)?;

        let game = Arc::new_cyclic(|this: &GameRef| {
            let events = EventHandler::new();
            events
                .global()
                .add_trigger(AFTER_DIE, Arc::new(RespawnTrigger::new(this.clone())));
            Self {
                name: config.game.name.clone(),
                events,
                timer,
                jobs,
                triggers: triggers::builtin_registry(),
                entities: RwLock::new(Directory::new()),
                resources: RwLock::new(Directory::new()),
                this: this.clone(),
            }
        });

        info!(
            game = %game.name,
            tick_interval_ms = config.timer.tick_interval_ms,
            "Game created"
        );
        Ok(game)
    }

    fn entities(&self) -> RwLockReadGuard<'_, Directory<Entity>> {
        self.entities.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn entities_mut(&self) -> RwLockWriteGuard<'_, Directory<Entity>> {
        self.entities.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn resources(&self) -> RwLockReadGuard<'_, Directory<Resource>> {
        self.resources.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn resources_mut(&self) -> RwLockWriteGuard<'_, Directory<Resource>> {
        self.resources.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Game name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Weak handle to this game.
    pub fn handle(&self) -> GameRef {
        self.this.clone()
    }

    /// The game-wide listener that hears every event first.
    pub const fn global_listener(&self) -> &Arc<EventListener> {
        self.events.global()
    }

    /// Job kinds this game can schedule and restore.
    pub fn job_registry(&self) -> &JobRegistry<GameRef> {
        &self.jobs
    }

    /// Trigger kinds this game can restore.
    pub const fn trigger_registry(&self) -> &TriggerRegistry<GameRef> {
        &self.triggers
    }

    // -----------------------------------------------------------------------
    // Timer
    // -----------------------------------------------------------------------

    /// The game clock.
    pub const fn timer(&self) -> &Timer {
        &self.timer
    }

    /// Start the game clock.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Timer`] if the clock thread cannot start.
    pub fn start(&self) -> Result<(), GameError> {
        self.timer.start()?;
        Ok(())
    }

    /// Stop the game clock.
    pub fn stop(&self) {
        self.timer.stop();
    }

    /// Schedule a job.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Timer`] if the job kind is not registered.
    pub fn insert_job(
        &self,
        job: Box<dyn TimerJob>,
        schedule: Schedule,
    ) -> Result<JobId, GameError> {
        Ok(self.timer.insert_job(job, schedule)?)
    }

    /// Have `aggressor` attack `defender` every `interval` ticks until one
    /// of them dies or they part ways.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Timer`] if `interval` is zero.
    pub fn start_autoattack(
        &self,
        aggressor: EntityId,
        defender: EntityId,
        interval: u64,
    ) -> Result<JobId, GameError> {
        let job = AutoAttackJob::new(self.handle(), aggressor, defender);
        self.insert_job(Box::new(job), Schedule::every(interval)?)
    }

    /// Let a being wander according to its wander settings.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::EntityNotFound`] or [`GameError::WrongKind`] if
    /// `being` is not a being, or [`GameError::Timer`] if its wander
    /// interval is zero.
    pub fn start_wandering(&self, being: EntityId) -> Result<JobId, GameError> {
        let entity = self.being(being)?;
        let interval = entity.wander_settings().interval;
        let job = WanderJob::new(self.handle(), being);
        let schedule = Schedule::new(interval, Executions::Infinite, interval)?;
        self.insert_job(Box::new(job), schedule)
    }

    /// Capture the clock and its queue.
    pub fn timer_snapshot(&self) -> TimerSnapshot {
        self.timer.snapshot()
    }

    /// Replace the clock and its queue, rebuilding jobs through this
    /// game's job registry. Starts the clock if the snapshot was running.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Timer`] if a job cannot be rebuilt or the clock
    /// cannot start.
    pub fn restore_timer(&self, snapshot: &TimerSnapshot) -> Result<(), GameError> {
        self.timer.restore(snapshot, &self.jobs, &self.handle())?;
        if snapshot.active {
            self.timer.start()?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Entities and resources
    // -----------------------------------------------------------------------

    /// Add an entity to the world.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DuplicateName`] if the name is taken.
    pub fn insert_entity(&self, entity: Entity) -> Result<Arc<Entity>, GameError> {
        let id = entity.id();
        let name = entity.name().to_owned();
        let entity = self.entities_mut().insert(id, &name, entity)?;
        debug!(entity = %name, id = %id, kind = ?entity.kind(), "Entity inserted");
        Ok(entity)
    }

    /// Look up an entity.
    pub fn entity(&self, id: EntityId) -> Option<Arc<Entity>> {
        self.entities().get(id)
    }

    /// Look up an entity by name.
    pub fn entity_by_name(&self, name: &str) -> Option<Arc<Entity>> {
        self.entities().by_name(name)
    }

    fn require(&self, id: EntityId) -> Result<Arc<Entity>, GameError> {
        self.entity(id).ok_or(GameError::EntityNotFound { id })
    }

    fn require_kind(&self, id: EntityId, expected: EntityKind) -> Result<Arc<Entity>, GameError> {
        let entity = self.require(id)?;
        if entity.kind() == expected {
            Ok(entity)
        } else {
            Err(GameError::WrongKind { id, expected })
        }
    }

    fn being(&self, id: EntityId) -> Result<Arc<Entity>, GameError> {
        self.require_kind(id, EntityKind::Being)
    }

    /// Remove an entity from the world and release everything it holds.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::EntityNotFound`] if no entity has this id.
    pub fn remove_entity(&self, id: EntityId) -> Result<Arc<Entity>, GameError> {
        let entity = self.require(id)?;
        self.entities_mut().remove(id, entity.name());

        let resources = self.resources().values();
        for resource in resources {
            if let Some(amount) = resource.release(&*entity) {
                debug!(
                    entity = %entity.name(),
                    resource = %resource.name(),
                    %amount,
                    "Released holdings"
                );
            }
        }
        debug!(entity = %entity.name(), id = %id, "Entity removed");
        Ok(entity)
    }

    /// Add a resource to the world.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DuplicateName`] if the name is taken.
    pub fn insert_resource(&self, resource: Resource) -> Result<Arc<Resource>, GameError> {
        let id = resource.id();
        let name = resource.name().to_owned();
        let resource = self.resources_mut().insert(id, &name, resource)?;
        debug!(resource = %name, id = %id, "Resource inserted");
        Ok(resource)
    }

    /// Look up a resource.
    pub fn resource(&self, id: EntityId) -> Option<Arc<Resource>> {
        self.resources().get(id)
    }

    /// Look up a resource by name.
    pub fn resource_by_name(&self, name: &str) -> Option<Arc<Resource>> {
        self.resources().by_name(name)
    }

    /// Rebuild a resource from a snapshot and add it to the world.
    /// Depositors are resolved against this game's entities.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Resource`] if the snapshot cannot be restored,
    /// or [`GameError::DuplicateName`] if the name is taken.
    pub fn restore_resource(
        &self,
        snapshot: &ResourceSnapshot,
    ) -> Result<Arc<Resource>, GameError> {
        let resource = Resource::restore(
            EntityId::new(),
            snapshot,
            &self.triggers,
            &self.handle(),
            self,
        )?;
        self.insert_resource(resource)
    }

    /// Add persisted triggers to an entity's listener.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::EntityNotFound`] for an unknown entity, or
    /// [`GameError::Trigger`] if a trigger kind is unknown.
    pub fn restore_triggers(
        &self,
        id: EntityId,
        snapshots: &[TriggerSnapshot],
    ) -> Result<(), GameError> {
        let entity = self.require(id)?;
        let handle = self.handle();
        let mut rebuilt = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            let trigger = self.triggers.instantiate(snapshot, &handle)?;
            rebuilt.push((snapshot.event.clone(), trigger));
        }
        for (event, trigger) in rebuilt {
            entity.event_listener().add_trigger(event, trigger);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    /// One attack from `aggressor` on `defender`. Kills the defender when
    /// its health reaches zero. Returns whether the attack happened.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::EntityNotFound`] or [`GameError::WrongKind`] if
    /// either party is not a being.
    pub fn attack(&self, aggressor: EntityId, defender: EntityId) -> Result<bool, GameError> {
        let attacker = self.being(aggressor)?;
        let target = self.being(defender)?;
        if !attacker.is_alive() || !target.is_alive() {
            return Ok(false);
        }

        let listeners = vec![attacker.listener(), target.listener()];
        let arguments = vec![EventArgument::Entity(aggressor), EventArgument::Entity(defender)];
        if !self.event(Event::new(BEFORE_ATTACK, listeners.clone(), arguments.clone())) {
            debug!(aggressor = %attacker.name(), defender = %target.name(), "Attack vetoed");
            return Ok(false);
        }

        let damage = attacker.attack();
        let remaining = target.wound(damage);
        let mut after = arguments;
        after.push(EventArgument::Integer(i64::from(damage)));
        self.event(Event::new(AFTER_ATTACK, listeners, after));
        debug!(
            aggressor = %attacker.name(),
            defender = %target.name(),
            damage,
            remaining,
            "Attack landed"
        );

        if remaining == 0 {
            self.die(defender)?;
        }
        Ok(true)
    }

    /// Kill a being. Returns whether it died.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::EntityNotFound`] or [`GameError::WrongKind`] if
    /// `being` is not a being.
    pub fn die(&self, being: EntityId) -> Result<bool, GameError> {
        let entity = self.being(being)?;
        if !entity.is_alive() {
            return Ok(false);
        }

        let listeners = vec![entity.listener()];
        let arguments = vec![EventArgument::Entity(being)];
        if !self.event(Event::new(BEFORE_DIE, listeners.clone(), arguments.clone())) {
            debug!(being = %entity.name(), "Death vetoed");
            return Ok(false);
        }

        entity.mark_dead();
        info!(being = %entity.name(), "Being died");
        self.event(Event::new(AFTER_DIE, listeners, arguments));
        Ok(true)
    }

    /// Bring a dead being back. Returns whether it came back.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::EntityNotFound`] or [`GameError::WrongKind`] if
    /// `being` is not a being.
    pub fn respawn(&self, being: EntityId) -> Result<bool, GameError> {
        let entity = self.being(being)?;
        if entity.is_alive() {
            return Ok(false);
        }

        let listeners = vec![entity.listener()];
        let arguments = vec![EventArgument::Entity(being)];
        if !self.event(Event::new(BEFORE_RESPAWN, listeners.clone(), arguments.clone())) {
            debug!(being = %entity.name(), "Respawn vetoed");
            return Ok(false);
        }

        let location = entity.revive();
        info!(being = %entity.name(), location = ?location, "Being respawned");
        self.event(Event::new(AFTER_RESPAWN, listeners, arguments));
        Ok(true)
    }

    /// Move an entity into a place. Returns whether it moved.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::EntityNotFound`] if either id is unknown, or
    /// [`GameError::WrongKind`] if `place` is not a place.
    pub fn move_to(&self, entity: EntityId, place: EntityId) -> Result<bool, GameError> {
        let mover = self.require(entity)?;
        let destination = self.require_kind(place, EntityKind::Place)?;

        let listeners = vec![mover.listener(), destination.listener()];
        let arguments = vec![EventArgument::Entity(entity), EventArgument::Entity(place)];
        if !self.event(Event::new(BEFORE_MOVE, listeners.clone(), arguments.clone())) {
            return Ok(false);
        }

        mover.set_location(Some(place));
        debug!(entity = %mover.name(), place = %destination.name(), "Entity moved");
        self.event(Event::new(AFTER_MOVE, listeners, arguments));
        Ok(true)
    }
}

impl EventDispatcher for Game {
    fn event(&self, event: Event) -> bool {
        self.events.event(event)
    }
}

impl HolderDirectory for Game {
    fn holder(&self, name: &str) -> Option<Arc<dyn Tangible>> {
        self.entity_by_name(name)
            .map(|entity| entity as Arc<dyn Tangible>)
    }
}

impl std::fmt::Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("name", &self.name)
            .field("timer", &self.timer)
            .finish_non_exhaustive()
    }
}
