//! Simulated environment sensor — temperature, humidity, signal strength.
//!
//! Mirrors the shape of a real wireless sensor driver: readings arrive as
//! notifications, connection state wanders between `present`, `idle`, and
//! `absent`, and every observation funnels through the change engine so
//! unchanged readings stay off the bus.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;

use hearth_app::registry::RegistryShared;
use hearth_domain::device::{Device, DeviceCore, SharedDevice, with_device};
use hearth_domain::discovery::DiscoveryInfo;
use hearth_domain::id::{DeviceId, DeviceUid};
use hearth_domain::status::DeviceStatus;

/// One sensor observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Degrees Celsius.
    pub temperature: f64,
    /// Relative humidity, percent.
    pub humidity: f64,
}

/// A simulated environment sensor.
pub struct VirtualSensor {
    core: DeviceCore,
}

impl VirtualSensor {
    /// Construct from a discovery payload. Present from birth; signal
    /// strength is seeded from the payload when the transport reported
    /// one.
    #[must_use]
    pub fn new(id: DeviceId, uid: DeviceUid, info: &DiscoveryInfo) -> Self {
        let mut core = DeviceCore::new(id, uid, info.device_type.clone(), &info.device.name);
        core.status = DeviceStatus::Present;
        let rssi = info.extra.get("rssi").cloned().unwrap_or_else(|| (-50).into());
        core.info.insert("rssi".to_string(), rssi);
        Self { core }
    }
}

impl Device for VirtualSensor {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }
}

/// Feed one reading through the change engine. Publishes only when a
/// value actually moved.
pub fn report_reading(shared: &RegistryShared, device: &SharedDevice, reading: Reading) {
    let moved = with_device(device, |d| {
        let core = d.core_mut();
        let mut moved = core.record("temperature", Value::from(reading.temperature));
        moved |= core.record("humidity", Value::from(reading.humidity));
        moved
    });
    if moved {
        shared.changed_device(device);
    }
}

/// Signal-strength update: the transport heard the sensor again, so it is
/// `present` whatever it was before.
pub fn report_signal(shared: &RegistryShared, device: &SharedDevice, rssi: i64) {
    with_device(device, |d| {
        let core = d.core_mut();
        core.status = DeviceStatus::Present;
        core.record("rssi", Value::from(rssi));
    });
    shared.changed_device(device);
}

/// Connection dropped: `idle` until the transport reconnects or gives up.
pub fn report_disconnect(shared: &RegistryShared, device: &SharedDevice) {
    with_device(device, |d| d.core_mut().status = DeviceStatus::Idle);
    shared.changed_device(device);
}

/// Reconnection window expired: the sensor is gone.
pub fn report_lost(shared: &RegistryShared, device: &SharedDevice) {
    with_device(device, |d| d.core_mut().status = DeviceStatus::Absent);
    shared.changed_device(device);
}

/// Readings the simulation loop cycles through.
const SIMULATED_READINGS: [Reading; 4] = [
    Reading {
        temperature: 21.5,
        humidity: 40.0,
    },
    Reading {
        temperature: 21.5,
        humidity: 40.0,
    },
    Reading {
        temperature: 22.0,
        humidity: 41.5,
    },
    Reading {
        temperature: 21.0,
        humidity: 43.0,
    },
];

/// Spawn the background simulation: one reading per `interval`, cycling
/// through a fixed table (with a deliberate repeat so deduplication gets
/// exercised).
pub fn spawn_simulation(
    shared: Arc<RegistryShared>,
    device: SharedDevice,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        for reading in SIMULATED_READINGS.iter().cycle() {
            ticker.tick().await;
            report_reading(&shared, &device, *reading);
        }
    })
}
