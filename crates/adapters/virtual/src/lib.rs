//! # hearth-adapter-virtual
//!
//! Virtual/demo driver that provides a simulated environment sensor for
//! testing and demonstration purposes. It plays the role a real transport
//! driver would: it registers a maker for its type tag, reports readings
//! and connection-state transitions through the change engine, and never
//! touches registry internals beyond the shared handle every driver gets.
//!
//! ## Dependency rule
//!
//! Depends on `hearth-app` (registry and shared state) and
//! `hearth-domain` only.

pub mod sensor;

use std::sync::Arc;

use hearth_app::ports::DeviceStore;
use hearth_app::registry::DeviceRegistry;
use hearth_domain::device::Device;

use sensor::VirtualSensor;

/// Type tag the virtual sensor registers under.
pub const SENSOR_TYPE: &str = "/device/climate/virtual/sensor";

/// Register the virtual sensor maker. Call once at startup, before
/// discovery begins.
pub fn register<S: DeviceStore + 'static>(registry: &DeviceRegistry<S>) {
    let shared = Arc::downgrade(&registry.shared());
    registry.register_maker(
        SENSOR_TYPE,
        Box::new(move |id, uid, info| {
            let mut sensor = VirtualSensor::new(id, uid, &info);
            // Present from birth: publish the construction-time state.
            if let Some(shared) = shared.upgrade() {
                shared.changed_core(sensor.core_mut());
            }
            Box::new(sensor)
        }),
    );
}
