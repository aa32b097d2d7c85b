//! Game container for the Realm world engine.
//!
//! This crate ties the event pipeline, the timer, and the resource ledger
//! to a small in-memory world of places, beings, and things.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `realm-config.yaml` into
//!   strongly-typed structs.
//! - [`entity`] -- [`Entity`]: places, beings, and things with locations,
//!   vitals, and resource holdings.
//! - [`error`] -- [`GameError`].
//! - [`game`] -- [`Game`]: the world container, its event-gated actions,
//!   and snapshot restore.
//! - [`jobs`] -- Built-in timer jobs: autoattack, wander, and respawn.
//! - [`triggers`] -- Built-in event triggers: respawn on death.

pub mod config;
pub mod entity;
pub mod error;
pub mod game;
pub mod jobs;
pub mod triggers;

pub use config::{ConfigError, GameConfig};
pub use entity::{Entity, EntityKind, RespawnSettings, WanderSettings};
pub use error::GameError;
pub use game::{Game, GameRef};
