//! Built-in event triggers.

use std::sync::Arc;

use realm_events::{Event, EventReturn, EventTrigger, TriggerRegistry};
use realm_timer::Schedule;
use tracing::warn;

use crate::game::GameRef;
use crate::jobs::RespawnJob;

/// Kind name of [`RespawnTrigger`].
pub const RESPAWN_TRIGGER_KIND: &str = "respawn";

/// A registry with every built-in trigger kind.
pub fn builtin_registry() -> TriggerRegistry<GameRef> {
    let mut registry = TriggerRegistry::new();
    registry.register(
        RESPAWN_TRIGGER_KIND,
        Box::new(|_params: &serde_json::Value, game: &GameRef| {
            Ok(Arc::new(RespawnTrigger::new(game.clone())) as Arc<dyn EventTrigger>)
        }),
    );
    registry
}

/// Schedules a respawn when a being dies.
///
/// Listens for `afterDie`. Reads the dead being from the first event
/// argument and consults its respawn settings: a zero interval brings it
/// back at once, anything else schedules a one-shot respawn job. Never
/// vetoes.
#[derive(Debug)]
pub struct RespawnTrigger {
    game: GameRef,
}

impl RespawnTrigger {
    /// Build the trigger.
    pub const fn new(game: GameRef) -> Self {
        Self { game }
    }
}

impl EventTrigger for RespawnTrigger {
    fn kind(&self) -> &'static str {
        RESPAWN_TRIGGER_KIND
    }

    fn fire(&self, event: &Event) -> EventReturn {
        let Some(game) = self.game.upgrade() else {
            return EventReturn::PROCEED;
        };
        let Some(being) = event.argument(0).and_then(|arg| arg.as_entity()) else {
            return EventReturn::PROCEED;
        };
        let Some(entity) = game.entity(being) else {
            return EventReturn::PROCEED;
        };

        let settings = entity.respawn_settings();
        if !settings.enabled {
            return EventReturn::PROCEED;
        }

        let result = if settings.interval == 0 {
            game.respawn(being).map(|_| ())
        } else {
            Schedule::once_after(settings.interval)
                .map_err(Into::into)
                .and_then(|schedule| {
                    let job = RespawnJob::new(self.game.clone(), being);
                    game.insert_job(Box::new(job), schedule).map(|_| ())
                })
        };
        if let Err(e) = result {
            warn!(being = %entity.name(), error = %e, "Could not schedule respawn");
        }
        EventReturn::PROCEED
    }
}
