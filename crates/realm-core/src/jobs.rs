//! Built-in timer jobs.
//!
//! Each job keeps a [`GameRef`] and the ids it acts on. A job whose game
//! is gone, or whose entities no longer exist, cancels itself.

use rand::Rng;
use rand::seq::IndexedRandom;
use realm_timer::{JobContext, JobRegistry, TimerError, TimerJob};
use realm_types::EntityId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::game::GameRef;

/// Kind name of [`AutoAttackJob`].
pub const AUTOATTACK_KIND: &str = "autoattack";
/// Kind name of [`WanderJob`].
pub const WANDER_KIND: &str = "wander";
/// Kind name of [`RespawnJob`].
pub const RESPAWN_KIND: &str = "respawn";

/// A registry with every built-in job kind.
pub fn builtin_registry() -> JobRegistry<GameRef> {
    let mut registry = JobRegistry::new();
    registry.register(AUTOATTACK_KIND, |params: &Value, game: &GameRef| {
        let AutoAttackParams { aggressor, defender } = parse(AUTOATTACK_KIND, params)?;
        Ok(Box::new(AutoAttackJob::new(game.clone(), aggressor, defender)) as Box<dyn TimerJob>)
    });
    registry.register(WANDER_KIND, |params: &Value, game: &GameRef| {
        let BeingParams { being } = parse(WANDER_KIND, params)?;
        Ok(Box::new(WanderJob::new(game.clone(), being)) as Box<dyn TimerJob>)
    });
    registry.register(RESPAWN_KIND, |params: &Value, game: &GameRef| {
        let BeingParams { being } = parse(RESPAWN_KIND, params)?;
        Ok(Box::new(RespawnJob::new(game.clone(), being)) as Box<dyn TimerJob>)
    });
    registry
}

fn parse<T: DeserializeOwned>(kind: &str, params: &Value) -> Result<T, TimerError> {
    serde_json::from_value(params.clone()).map_err(|e| TimerError::InvalidJobParams {
        kind: kind.to_owned(),
        reason: e.to_string(),
    })
}

fn to_params<T: Serialize>(params: &T) -> Value {
    serde_json::to_value(params).unwrap_or(Value::Null)
}

#[derive(Debug, Serialize, Deserialize)]
struct AutoAttackParams {
    aggressor: EntityId,
    defender: EntityId,
}

#[derive(Debug, Serialize, Deserialize)]
struct BeingParams {
    being: EntityId,
}

// ---------------------------------------------------------------------------
// Autoattack
// ---------------------------------------------------------------------------

/// One being attacking another on every run, until either dies or they
/// stop sharing a location.
#[derive(Debug)]
pub struct AutoAttackJob {
    game: GameRef,
    aggressor: EntityId,
    defender: EntityId,
}

impl AutoAttackJob {
    /// Build the job.
    pub const fn new(game: GameRef, aggressor: EntityId, defender: EntityId) -> Self {
        Self {
            game,
            aggressor,
            defender,
        }
    }
}

impl TimerJob for AutoAttackJob {
    fn kind(&self) -> &'static str {
        AUTOATTACK_KIND
    }

    fn execute(&mut self, ctx: &mut JobContext<'_>) {
        let Some(game) = self.game.upgrade() else {
            ctx.cancel();
            return;
        };
        let (Some(aggressor), Some(defender)) =
            (game.entity(self.aggressor), game.entity(self.defender))
        else {
            ctx.cancel();
            return;
        };

        let engaged = aggressor.is_alive()
            && defender.is_alive()
            && aggressor.location() == defender.location();
        if !engaged {
            debug!(
                aggressor = %aggressor.name(),
                defender = %defender.name(),
                "Autoattack ended"
            );
            ctx.cancel();
            return;
        }

        match game.attack(self.aggressor, self.defender) {
            Ok(_) => {
                if !defender.is_alive() {
                    ctx.cancel();
                }
            }
            Err(e) => {
                warn!(error = %e, "Autoattack failed");
                ctx.cancel();
            }
        }
    }

    fn params(&self) -> Value {
        to_params(&AutoAttackParams {
            aggressor: self.aggressor,
            defender: self.defender,
        })
    }
}

// ---------------------------------------------------------------------------
// Wander
// ---------------------------------------------------------------------------

/// A being drifting between connected places.
///
/// Every run rereads the being's wander settings: the job stops when
/// wandering is turned off and follows changes to the interval.
#[derive(Debug)]
pub struct WanderJob {
    game: GameRef,
    being: EntityId,
}

impl WanderJob {
    /// Build the job.
    pub const fn new(game: GameRef, being: EntityId) -> Self {
        Self { game, being }
    }
}

/// Clamp a wanderlust to a valid probability.
fn move_probability(wanderlust: f64) -> f64 {
    if wanderlust.is_finite() {
        wanderlust.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

impl TimerJob for WanderJob {
    fn kind(&self) -> &'static str {
        WANDER_KIND
    }

    fn execute(&mut self, ctx: &mut JobContext<'_>) {
        let Some(game) = self.game.upgrade() else {
            ctx.cancel();
            return;
        };
        let Some(being) = game.entity(self.being) else {
            ctx.cancel();
            return;
        };

        let settings = being.wander_settings();
        if !settings.enabled {
            ctx.cancel();
            return;
        }
        if settings.interval != ctx.schedule().interval() {
            if let Err(e) = ctx.schedule_mut().set_interval(settings.interval) {
                warn!(being = %being.name(), error = %e, "Invalid wander interval");
            }
        }
        if !being.is_alive() {
            return;
        }

        let mut rng = rand::rng();
        if !rng.random_bool(move_probability(settings.wanderlust)) {
            return;
        }
        let Some(here) = being.location().and_then(|place| game.entity(place)) else {
            return;
        };
        let exits = here.connections();
        let Some(&destination) = exits.choose(&mut rng) else {
            return;
        };
        if let Err(e) = game.move_to(self.being, destination) {
            warn!(being = %being.name(), error = %e, "Wander move failed");
        }
    }

    fn params(&self) -> Value {
        to_params(&BeingParams { being: self.being })
    }
}

// ---------------------------------------------------------------------------
// Respawn
// ---------------------------------------------------------------------------

/// Brings a dead being back.
#[derive(Debug)]
pub struct RespawnJob {
    game: GameRef,
    being: EntityId,
}

impl RespawnJob {
    /// Build the job.
    pub const fn new(game: GameRef, being: EntityId) -> Self {
        Self { game, being }
    }
}

impl TimerJob for RespawnJob {
    fn kind(&self) -> &'static str {
        RESPAWN_KIND
    }

    fn execute(&mut self, ctx: &mut JobContext<'_>) {
        let Some(game) = self.game.upgrade() else {
            ctx.cancel();
            return;
        };
        if let Err(e) = game.respawn(self.being) {
            warn!(being = %self.being, error = %e, "Respawn failed");
        }
    }

    fn params(&self) -> Value {
        to_params(&BeingParams { being: self.being })
    }
}
