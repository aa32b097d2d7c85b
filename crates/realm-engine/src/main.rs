//! Realm world engine binary.
//!
//! Loads configuration, builds a game, seeds a small demonstration world,
//! and runs the game clock until interrupted.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `realm-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the game and seed the world
//! 4. Start the game clock
//! 5. Wait for Ctrl-C, then stop the clock

mod error;

use std::path::Path;
use std::sync::Arc;

use realm_core::{Entity, Game, GameConfig, RespawnSettings, WanderSettings};
use realm_ledger::{Resource, ResourceLimits, STICKY_TAG};
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Configuration file looked up in the working directory.
const CONFIG_PATH: &str = "realm-config.yaml";

#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config)?;
    info!(
        game = config.game.name,
        tick_interval_ms = config.timer.tick_interval_ms,
        poll_interval_ms = config.timer.poll_interval_ms,
        "realm-engine starting"
    );

    // 3. Build the game and seed the world.
    let game = Game::new(&config)?;
    seed_world(&game)?;

    // 4. Start the clock.
    game.start()?;
    info!("Game clock running, press Ctrl-C to stop");

    // 5. Run until interrupted.
    tokio::signal::ctrl_c().await?;
    game.stop();
    info!(
        ticks = game.timer().time(),
        pending_jobs = game.timer().job_count(),
        "realm-engine stopped"
    );
    Ok(())
}

/// Load configuration from `realm-config.yaml`, or use defaults if the
/// file does not exist.
fn load_config() -> Result<GameConfig, EngineError> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        Ok(GameConfig::from_file(config_path)?)
    } else {
        let mut config = GameConfig::default();
        config.logging.apply_env_overrides();
        Ok(config)
    }
}

fn init_logging(config: &GameConfig) -> Result<(), EngineError> {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let installed = if config.logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| EngineError::Logging {
        message: e.to_string(),
    })
}

/// Two connected rooms, a fight, a wanderer, and a pile of gold.
fn seed_world(game: &Arc<Game>) -> Result<(), EngineError> {
    let cave = game.insert_entity(Entity::place("cave"))?;
    let hall = game.insert_entity(Entity::place("hall"))?;
    cave.connect(hall.id());
    hall.connect(cave.id());

    let hero = game.insert_entity(Entity::being("hero"))?;
    hero.set_location(Some(hall.id()));
    hero.set_attack(2);

    let troll = game.insert_entity(Entity::being("troll"))?;
    troll.set_location(Some(hall.id()));
    troll.set_max_health(12);
    troll.set_respawn_settings(RespawnSettings {
        enabled: true,
        interval: 5,
        location: Some(cave.id()),
    });

    let rat = game.insert_entity(Entity::being("rat"))?;
    rat.set_location(Some(cave.id()));
    rat.set_wander_settings(WanderSettings {
        enabled: true,
        interval: 3,
        wanderlust: 0.3,
    });

    let gold = game.insert_resource(Resource::new(
        "gold",
        ResourceLimits {
            require_integer_allocations: true,
            ..ResourceLimits::default()
        },
    ))?;
    gold.set_tag(STICKY_TAG);
    let pile = Decimal::from(100);
    let status = gold.allocate(&**game, &*cave, pile);
    if !status.is_success() {
        return Err(EngineError::Seed {
            message: format!("could not place {pile} gold in the cave: {status}"),
        });
    }
    let status = gold.take(&**game, &*cave, &*hero, Decimal::TEN);
    if !status.is_success() {
        return Err(EngineError::Seed {
            message: format!("hero could not take gold: {status}"),
        });
    }

    game.start_autoattack(hero.id(), troll.id(), 2)?;
    game.start_wandering(rat.id())?;

    info!(
        entities = 5,
        hero_gold = %gold.amount_to_string(hero.resource_balance(gold.id())),
        "World seeded"
    );
    Ok(())
}
