//! Device — the polymorphic unit of state, one per physical or logical
//! device.
//!
//! Concrete variants live in driver crates and implement [`Device`] over a
//! shared [`DeviceCore`]. The core owns the uniform property model and the
//! pure half of the change engine: computing canonical snapshots and
//! deciding whether the externally visible state actually changed since
//! the last publication. Publication itself happens in the `app` crate,
//! which owns the event bus.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::id::{DeviceId, DeviceUid};
use crate::snapshot::{REDACTED, Snapshot};
use crate::status::DeviceStatus;
use crate::time::Timestamp;

/// Capability set every device variant implements.
///
/// Variants add transport-specific behavior (connection handling, command
/// execution) on top; the registry and the change engine only rely on what
/// is declared here.
pub trait Device: Send {
    /// Shared base state.
    fn core(&self) -> &DeviceCore;

    /// Mutable access to the shared base state.
    fn core_mut(&mut self) -> &mut DeviceCore;

    /// Sub-devices exposed by composite hardware (a bridge exposing
    /// multiple logical sensors). Default: none.
    fn children(&self) -> Vec<SharedDevice> {
        Vec::new()
    }
}

/// Ownable, shareable handle to a device entity.
pub type SharedDevice = Arc<Mutex<Box<dyn Device>>>;

/// Wrap a freshly constructed variant into its shareable form.
#[must_use]
pub fn share(device: Box<dyn Device>) -> SharedDevice {
    Arc::new(Mutex::new(device))
}

/// Run `f` with exclusive access to a shared device. Lock poisoning is
/// ignored: device state stays usable even if a holder panicked.
pub fn with_device<R>(device: &SharedDevice, f: impl FnOnce(&mut dyn Device) -> R) -> R {
    let mut guard = device
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    f(guard.as_mut())
}

/// Shared base state for all device variants.
#[derive(Debug)]
pub struct DeviceCore {
    device_id: DeviceId,
    device_uid: DeviceUid,
    whatami: String,
    /// Mutable human-readable label, persisted by the store.
    pub name: String,
    /// Operational status; drivers assign freely.
    pub status: DeviceStatus,
    /// Open, driver-defined property bag. Intentionally schemaless: device
    /// capabilities are extensible at runtime.
    pub info: BTreeMap<String, Value>,
    /// Keys masked in every external rendering.
    pub elide: BTreeSet<String>,
    updated: Option<Timestamp>,
    prev: Option<String>,
}

impl DeviceCore {
    /// Base state for a newly constructed variant. Status starts
    /// `unknown` until the driver reports otherwise.
    #[must_use]
    pub fn new(
        device_id: DeviceId,
        device_uid: DeviceUid,
        whatami: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            device_id,
            device_uid,
            whatami: whatami.into(),
            name: name.into(),
            status: DeviceStatus::Unknown,
            info: BTreeMap::new(),
            elide: BTreeSet::new(),
            updated: None,
            prev: None,
        }
    }

    /// Store-assigned identifier; immutable after construction.
    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Discovery-observed identifier; immutable after construction.
    #[must_use]
    pub fn device_uid(&self) -> &DeviceUid {
        &self.device_uid
    }

    /// Hierarchical type path of this variant.
    #[must_use]
    pub fn whatami(&self) -> &str {
        &self.whatami
    }

    /// Timestamp of the last observed change.
    #[must_use]
    pub fn updated(&self) -> Option<Timestamp> {
        self.updated
    }

    /// Canonical external snapshot of the current state. Pure: the `info`
    /// copy has the `name` key stripped and every elided key redacted,
    /// whatever its value.
    #[must_use]
    pub fn proplist(&self) -> Snapshot {
        let mut info = self.info.clone();
        info.remove("name");
        for key in &self.elide {
            if let Some(value) = info.get_mut(key) {
                *value = Value::from(REDACTED);
            }
        }

        Snapshot {
            whatami: self.whatami.clone(),
            whoami: self.device_id.whoami(),
            name: self.name.clone(),
            status: self.status,
            info,
            updated: self.updated,
        }
    }

    /// Dedup step of the change engine. Raises `updated` to `at` (never
    /// lowers it), recomputes the snapshot, and compares its canonical
    /// encoding against the last published one. Returns the snapshot to
    /// publish, or `None` when nothing externally visible changed.
    pub fn advance(&mut self, at: Timestamp) -> Option<Snapshot> {
        let at = self.updated.map_or(at, |current| at.max(current));
        self.updated = Some(at);

        let snapshot = self.proplist();
        let encoded = snapshot.canonical();
        if self.prev.as_deref() == Some(encoded.as_str()) {
            return None;
        }
        self.prev = Some(encoded);
        Some(snapshot)
    }

    /// Whether a snapshot has ever been published for this entity.
    #[must_use]
    pub fn has_published(&self) -> bool {
        self.prev.is_some()
    }

    /// The last published snapshot, re-parsed. Used by batch/poll paths
    /// that replay state without forcing a refresh.
    #[must_use]
    pub fn last_published(&self) -> Option<Value> {
        let prev = self.prev.as_deref()?;
        serde_json::from_str(prev).ok()
    }

    /// Record a driver reading, returning whether the stored value
    /// actually changed. Lets drivers batch readings and call `changed()`
    /// only when something moved.
    pub fn record(&mut self, key: &str, value: Value) -> bool {
        if self.info.get(key) == Some(&value) {
            return false;
        }
        self.info.insert(key.to_string(), value);
        true
    }

    /// The recovery document persisted by `persist_info`: the property bag
    /// plus guaranteed `id`, `deviceType`, and display fields, enough to
    /// reconstruct a discovery payload after a restart.
    #[must_use]
    pub fn recovery_info(&self) -> Value {
        let mut map: serde_json::Map<String, Value> =
            self.info.clone().into_iter().collect();
        map.entry("id".to_string())
            .or_insert_with(|| self.device_uid.as_str().into());
        map.entry("deviceType".to_string())
            .or_insert_with(|| self.whatami.clone().into());
        map.entry("device".to_string())
            .or_insert_with(|| serde_json::json!({ "name": self.name }));
        Value::Object(map)
    }
}
