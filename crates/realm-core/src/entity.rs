//! A minimal in-memory entity layer.
//!
//! Places are connected to each other and contain beings and things.
//! Beings have health, can die and respawn, and can wander between
//! connected places. Every entity can hold resources and owns an event
//! listener.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use realm_events::EventListener;
use realm_ledger::Tangible;
use realm_types::EntityId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What sort of entity this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A location other entities can be in.
    Place,
    /// A living creature or player.
    Being,
    /// An inanimate object.
    Thing,
}

/// When and where a being comes back after dying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RespawnSettings {
    /// Whether the being respawns at all.
    pub enabled: bool,
    /// Ticks to wait after death. Zero respawns immediately.
    pub interval: u64,
    /// Place to respawn in; `None` keeps the place the being died in.
    pub location: Option<EntityId>,
}

/// How often and how eagerly a being wanders.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WanderSettings {
    /// Whether the being wanders.
    pub enabled: bool,
    /// Ticks between wander attempts.
    pub interval: u64,
    /// Probability in `[0, 1]` of moving on each attempt.
    pub wanderlust: f64,
}

impl Default for WanderSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: 10,
            wanderlust: 0.5,
        }
    }
}

#[derive(Debug)]
struct EntityState {
    location: Option<EntityId>,
    connections: Vec<EntityId>,
    resources: BTreeMap<EntityId, Decimal>,
    health: u32,
    max_health: u32,
    alive: bool,
    attack: u32,
    respawn: RespawnSettings,
    wander: WanderSettings,
}

/// A thing in the world.
pub struct Entity {
    id: EntityId,
    name: String,
    kind: EntityKind,
    listener: Arc<EventListener>,
    state: Mutex<EntityState>,
}

impl Entity {
    fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        let (health, attack) = match kind {
            EntityKind::Being => (10, 1),
            EntityKind::Place | EntityKind::Thing => (0, 0),
        };
        Self {
            id: EntityId::new(),
            name: name.into(),
            kind,
            listener: Arc::new(EventListener::new()),
            state: Mutex::new(EntityState {
                location: None,
                connections: Vec::new(),
                resources: BTreeMap::new(),
                health,
                max_health: health,
                alive: kind == EntityKind::Being,
                attack,
                respawn: RespawnSettings::default(),
                wander: WanderSettings::default(),
            }),
        }
    }

    /// A new, unconnected place.
    pub fn place(name: impl Into<String>) -> Self {
        Self::new(EntityKind::Place, name)
    }

    /// A new living being with 10 health and 1 attack.
    pub fn being(name: impl Into<String>) -> Self {
        Self::new(EntityKind::Being, name)
    }

    /// A new thing.
    pub fn thing(name: impl Into<String>) -> Self {
        Self::new(EntityKind::Thing, name)
    }

    fn state(&self) -> MutexGuard<'_, EntityState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stable identifier.
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// What sort of entity this is.
    pub const fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Whether this entity is a being.
    pub fn is_being(&self) -> bool {
        self.kind == EntityKind::Being
    }

    /// Listener for this entity's events.
    pub fn event_listener(&self) -> &Arc<EventListener> {
        &self.listener
    }

    // -----------------------------------------------------------------------
    // Location
    // -----------------------------------------------------------------------

    /// Place the entity is in.
    pub fn location(&self) -> Option<EntityId> {
        self.state().location
    }

    /// Put the entity somewhere. Bypasses movement events.
    pub fn set_location(&self, place: Option<EntityId>) {
        self.state().location = place;
    }

    /// Add a one-way connection from this place to another.
    pub fn connect(&self, place: EntityId) {
        let mut state = self.state();
        if !state.connections.contains(&place) {
            state.connections.push(place);
        }
    }

    /// Places reachable from this one.
    pub fn connections(&self) -> Vec<EntityId> {
        self.state().connections.clone()
    }

    // -----------------------------------------------------------------------
    // Vitals
    // -----------------------------------------------------------------------

    /// Whether the being is alive. Places and things never are.
    pub fn is_alive(&self) -> bool {
        self.state().alive
    }

    /// Current health.
    pub fn health(&self) -> u32 {
        self.state().health
    }

    /// Health restored on respawn.
    pub fn max_health(&self) -> u32 {
        self.state().max_health
    }

    /// Set both current and maximum health.
    pub fn set_max_health(&self, max_health: u32) {
        let mut state = self.state();
        state.max_health = max_health;
        state.health = max_health;
    }

    /// Damage dealt per attack.
    pub fn attack(&self) -> u32 {
        self.state().attack
    }

    /// Set damage dealt per attack.
    pub fn set_attack(&self, attack: u32) {
        self.state().attack = attack;
    }

    /// Subtract `amount` health, not going below zero. Returns what is left.
    pub(crate) fn wound(&self, amount: u32) -> u32 {
        let mut state = self.state();
        state.health = state.health.saturating_sub(amount);
        state.health
    }

    pub(crate) fn mark_dead(&self) {
        let mut state = self.state();
        state.alive = false;
        state.health = 0;
    }

    pub(crate) fn revive(&self) -> Option<EntityId> {
        let mut state = self.state();
        state.alive = true;
        state.health = state.max_health;
        if let Some(place) = state.respawn.location {
            state.location = Some(place);
        }
        state.location
    }

    /// Respawn behavior.
    pub fn respawn_settings(&self) -> RespawnSettings {
        self.state().respawn
    }

    /// Change respawn behavior.
    pub fn set_respawn_settings(&self, respawn: RespawnSettings) {
        self.state().respawn = respawn;
    }

    /// Wander behavior.
    pub fn wander_settings(&self) -> WanderSettings {
        self.state().wander
    }

    /// Change wander behavior.
    pub fn set_wander_settings(&self, wander: WanderSettings) {
        self.state().wander = wander;
    }

    // -----------------------------------------------------------------------
    // Resources
    // -----------------------------------------------------------------------

    /// Resources held, by resource id, as last reported by the ledgers.
    pub fn resources(&self) -> BTreeMap<EntityId, Decimal> {
        self.state().resources.clone()
    }

    /// Amount of one resource held.
    pub fn resource_balance(&self, resource: EntityId) -> Decimal {
        self.state()
            .resources
            .get(&resource)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}

impl Tangible for Entity {
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
        self.state().resources.insert(resource, balance);
    }

    fn remove_resource_allocation(&self, resource: EntityId) {
        self.state().resources.remove(&resource);
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
