//! Shared type definitions for the Realm world engine.
//!
//! This crate sits at the bottom of the dependency graph. It holds the
//! strongly-typed identifiers that every other crate uses to refer to world
//! entities and scheduled jobs, and the typed argument list carried by
//! every event dispatch.
//!
//! # Modules
//!
//! - [`ids`] -- UUID newtypes ([`EntityId`], [`JobId`]).
//! - [`args`] -- The [`EventArgument`] enum passed to event triggers.

pub mod args;
pub mod ids;

pub use args::EventArgument;
pub use ids::{EntityId, JobId};
