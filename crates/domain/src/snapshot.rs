//! Snapshot — the canonical external view of a device's state.
//!
//! A snapshot is what consumers see on the telemetry topic and what the
//! change engine compares to decide whether anything actually changed.
//! The dedup comparison uses [`Snapshot::canonical`], a reproducible
//! encoding that excludes `updated` so that a pure timestamp advance never
//! counts as a change.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::id::DeviceId;
use crate::status::DeviceStatus;
use crate::time::{self, Timestamp};

/// Marker substituted for elided (secret) property values.
pub const REDACTED: &str = "********";

/// Canonical external view of one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Hierarchical type path of the variant.
    pub whatami: String,
    /// External identity, `device/<deviceID>`.
    pub whoami: String,
    /// Display name (empty string when unset).
    pub name: String,
    /// Current operational status.
    pub status: DeviceStatus,
    /// Public property copy — `name` stripped, elided keys redacted.
    pub info: BTreeMap<String, Value>,
    /// Last observed change, if the device ever reported one.
    pub updated: Option<Timestamp>,
}

impl Snapshot {
    /// The form published on the bus: `updated` rendered as epoch
    /// milliseconds, everything else as-is.
    #[must_use]
    pub fn publish_value(&self) -> Value {
        let mut map = self.base_value();
        map.insert(
            "updated".to_string(),
            self.updated.map_or(Value::Null, |ts| time::to_millis(ts).into()),
        );
        Value::Object(map)
    }

    /// Stable dedup encoding. Key order is fixed (sorted), `updated` is
    /// excluded, so byte-equality of two encodings means the externally
    /// visible state is unchanged.
    #[must_use]
    pub fn canonical(&self) -> String {
        Value::Object(self.base_value()).to_string()
    }

    /// External identity parsed back into a [`DeviceId`], when it has the
    /// expected `device/<id>` shape.
    #[must_use]
    pub fn device_id(&self) -> Option<DeviceId> {
        self.whoami.strip_prefix("device/")?.parse().ok()
    }

    fn base_value(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("whatami".to_string(), self.whatami.clone().into());
        map.insert("whoami".to_string(), self.whoami.clone().into());
        map.insert("name".to_string(), self.name.clone().into());
        map.insert("status".to_string(), self.status.to_string().into());
        map.insert(
            "info".to_string(),
            Value::Object(self.info.clone().into_iter().collect()),
        );
        map
    }
}
