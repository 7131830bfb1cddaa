//! # hearthd — hearth daemon
//!
//! Composition root that wires the store, bus, registry, and drivers
//! together and runs the hub.
//!
//! ## Responsibilities
//! - Parse configuration (TOML file, env vars)
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct the event bus and device registry
//! - Register driver makers and kick off demo discovery
//! - Handle graceful shutdown (SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;
use std::time::Duration;

use hearth_adapter_storage_sqlite_sqlx::SqliteDeviceStore;
use hearth_app::bus::EventBus;
use hearth_app::message::{BusMessage, topic};
use hearth_app::registry::DeviceRegistry;
use hearth_domain::discovery::DiscoveryInfo;
use hearth_domain::id::DeviceUid;

use config::Config;

const VIRTUAL_SENSOR_UID: &str = "virtual-sensor-1";
const SIMULATION_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.logging.filter))
        .init();

    // Database
    let db = hearth_adapter_storage_sqlite_sqlx::Config {
        database_url: config.database.url.clone(),
    }
    .build()
    .await?;
    let store = SqliteDeviceStore::new(db.pool().clone());

    // Bus & registry
    let bus = Arc::new(EventBus::new());
    let registry = DeviceRegistry::new(store, Arc::clone(&bus));
    registry.init();

    // Telemetry consumer: log every state delta leaving the core.
    bus.subscribe(topic::TELEMETRY_EGRESS, |message| {
        if let BusMessage::Updates(value) = message {
            tracing::info!(%value, "telemetry");
        }
        Ok(())
    });

    // Drivers
    if config.drivers.virtual_enabled {
        hearth_adapter_virtual::register(&registry);
        if let Some(device_id) = registry
            .discover(DiscoveryInfo::new(
                VIRTUAL_SENSOR_UID,
                hearth_adapter_virtual::SENSOR_TYPE,
                "Virtual Sensor",
            ))
            .await?
        {
            tracing::info!(%device_id, "virtual sensor registered");
        }

        if let Some(handle) = registry.device_by_uid(&DeviceUid::from(VIRTUAL_SENSOR_UID)) {
            hearth_adapter_virtual::sensor::spawn_simulation(
                registry.shared(),
                Arc::clone(handle.device()),
                SIMULATION_INTERVAL,
            );
        }
    }

    tracing::info!(health = ?registry.health(), "hearthd ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    registry.shutdown();

    Ok(())
}
