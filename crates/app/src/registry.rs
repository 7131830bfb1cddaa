//! Device registry — owns the live set of device entities.
//!
//! The registry orchestrates discovery (type resolution, persistence
//! round-trip, entity construction), answers lookups across top-level
//! devices and their children, aggregates health, and wires the control
//! topic: ping snapshot batches and perform routing.
//!
//! Concurrency: the only race this core must handle is concurrent
//! discovery of one uid. The registry reserves the uid's slot *before*
//! the first await, so every later discovery of that uid observes the
//! reservation and no-ops. In-memory maps sit behind mutexes whose
//! critical sections never span an await.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde_json::Value;

use hearth_domain::device::{DeviceCore, SharedDevice, share, with_device};
use hearth_domain::discovery::DiscoveryInfo;
use hearth_domain::error::HearthError;
use hearth_domain::id::{DeviceId, DeviceUid};
use hearth_domain::snapshot::Snapshot;
use hearth_domain::status::Severity;
use hearth_domain::time::{self, Timestamp};

use crate::bus::{EventBus, SubscriptionId};
use crate::command;
use crate::expand::{ActorDirectory, ActorLookup, expand};
use crate::handle::DeviceHandle;
use crate::makers::{Maker, MakerRegistry};
use crate::message::{BusMessage, topic};
use crate::ports::DeviceStore;

/// One registry slot: the originating discovery payload plus the live
/// entity once construction completed. `device: None` marks a reserved
/// slot with discovery still in flight.
struct RegistryEntry {
    discovery: DiscoveryInfo,
    device: Option<SharedDevice>,
}

/// Aggregate health counts by severity bucket.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthSummary {
    pub warning: usize,
    pub attention: usize,
    pub error: usize,
}

/// State shared between the registry, device handles, and bus handlers.
///
/// Not generic over the store: bus handler closures and driver background
/// tasks hold this without caring which store adapter is wired in.
pub struct RegistryShared {
    bus: Arc<EventBus>,
    devices: Mutex<BTreeMap<DeviceUid, RegistryEntry>>,
    makers: Mutex<MakerRegistry>,
    actors: Mutex<ActorDirectory>,
    watermark: AtomicI64,
}

impl RegistryShared {
    /// Shared state bound to `bus`. Normally created by
    /// [`DeviceRegistry::new`]; standalone construction suits driver
    /// tests that only exercise the change engine.
    #[must_use]
    pub fn with_bus(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            devices: Mutex::new(BTreeMap::new()),
            makers: Mutex::new(MakerRegistry::default()),
            actors: Mutex::new(ActorDirectory::default()),
            watermark: AtomicI64::new(time::to_millis(time::now())),
        }
    }

    /// The bus this registry publishes on.
    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Process-wide high-water mark over every entity's `updated`.
    #[must_use]
    pub fn last_updated(&self) -> Timestamp {
        time::from_millis(self.watermark.load(Ordering::Relaxed))
    }

    /// Effectful half of the change engine: advance the entity, and when
    /// its externally visible state moved, publish the snapshot and
    /// escalate `reset`/`error` on the control topic. The device lock is
    /// released before anything is published.
    pub fn changed_device_at(&self, device: &SharedDevice, at: Timestamp) {
        self.watermark.fetch_max(time::to_millis(at), Ordering::Relaxed);

        let Some(snapshot) = with_device(device, |d| d.core_mut().advance(at)) else {
            return;
        };
        self.publish_snapshot(&snapshot);
    }

    /// [`changed_device_at`](Self::changed_device_at) stamped with the
    /// current time.
    pub fn changed_device(&self, device: &SharedDevice) {
        self.changed_device_at(device, time::now());
    }

    /// Change-engine entry point for a core not yet shared — makers use
    /// this to publish their construction-time state.
    pub fn changed_core(&self, core: &mut DeviceCore) {
        let at = time::now();
        self.watermark.fetch_max(time::to_millis(at), Ordering::Relaxed);
        if let Some(snapshot) = core.advance(at) {
            self.publish_snapshot(&snapshot);
        }
    }

    fn publish_snapshot(&self, snapshot: &Snapshot) {
        self.bus.publish(
            topic::TELEMETRY_EGRESS,
            &BusMessage::Updates(snapshot.publish_value()),
        );
        if snapshot.status.needs_attention() {
            self.bus.publish(topic::ACTORS, &BusMessage::Attention);
        }
    }

    /// Publish a one-shot, never-deduplicated notification carrying the
    /// current snapshot plus a free-text message.
    pub fn alert_device(&self, device: &SharedDevice, message: &str) {
        let snapshot = with_device(device, |d| d.core().proplist());
        let updated = snapshot.updated.unwrap_or_else(time::now);

        let mut info = snapshot.publish_value();
        if let Value::Object(map) = &mut info {
            map.remove("updated");
        }

        let mut record = serde_json::Map::new();
        record.insert("updated".to_string(), time::to_millis(updated).into());
        record.insert("level".to_string(), "alert".into());
        record.insert("message".to_string(), message.into());
        record.insert("whoami".to_string(), snapshot.whoami.clone().into());
        record.insert("name".to_string(), snapshot.name.clone().into());
        record.insert("info".to_string(), info);

        self.bus.publish(
            topic::TELEMETRY_EGRESS,
            &BusMessage::Updates(Value::Object(record)),
        );
    }

    /// Register a category resolver for the expansion language.
    pub fn register_actor_category(&self, category: impl Into<String>, lookup: ActorLookup) {
        self.actors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .register(category, lookup);
    }

    /// Every live entity, parents followed by their children, in stable
    /// uid order.
    fn flattened_devices(&self) -> Vec<SharedDevice> {
        let top: Vec<SharedDevice> = {
            let devices = self.devices.lock().unwrap_or_else(PoisonError::into_inner);
            devices.values().filter_map(|e| e.device.clone()).collect()
        };

        let mut all = Vec::new();
        for device in top {
            let children = with_device(&device, |d| d.children());
            all.push(device);
            all.extend(children);
        }
        all
    }

    fn device_by_id_shared(&self, id: DeviceId) -> Option<SharedDevice> {
        self.flattened_devices()
            .into_iter()
            .find(|device| with_device(device, |d| d.core().device_id()) == id)
    }

    fn device_by_uid_shared(&self, uid: &DeviceUid) -> Option<SharedDevice> {
        let devices = self.devices.lock().unwrap_or_else(PoisonError::into_inner);
        devices.get(uid).and_then(|entry| entry.device.clone())
    }

    /// Resolve a bare expansion head: numeric text as a [`DeviceId`],
    /// anything else as a [`DeviceUid`].
    fn find_device(&self, head: &str) -> Option<SharedDevice> {
        if let Ok(id) = head.parse::<DeviceId>() {
            if let Some(device) = self.device_by_id_shared(id) {
                return Some(device);
            }
        }
        self.device_by_uid_shared(&DeviceUid::from(head))
    }

    /// Ping reply: one batch of every device's last published snapshot,
    /// stamped with its current `updated`. Devices that never published
    /// get an uncached refresh instead of a batch entry. Skipped entirely
    /// when no telemetry subscriber exists.
    fn handle_ping(&self) {
        if !self.bus.has(topic::TELEMETRY_EGRESS) {
            return;
        }

        let mut batch = Vec::new();
        for device in self.flattened_devices() {
            let replay = with_device(&device, |d| {
                let core = d.core();
                core.last_published().map(|mut value| {
                    if let Value::Object(map) = &mut value {
                        map.insert(
                            "updated".to_string(),
                            core.updated()
                                .map_or(Value::Null, |ts| time::to_millis(ts).into()),
                        );
                    }
                    value
                })
            });

            match replay {
                Some(value) => batch.push(value),
                None => self.changed_device(&device),
            }
        }

        if !batch.is_empty() {
            self.bus.publish(
                topic::TELEMETRY_EGRESS,
                &BusMessage::Updates(Value::Array(batch)),
            );
        }
    }

    fn release(&self, uid: &DeviceUid) {
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(uid);
    }
}

/// Owns the live device set and orchestrates discovery against the
/// persistent store `S`.
pub struct DeviceRegistry<S> {
    store: Arc<S>,
    shared: Arc<RegistryShared>,
    subscriptions: Mutex<Vec<(&'static str, SubscriptionId)>>,
}

impl<S: DeviceStore + 'static> DeviceRegistry<S> {
    /// Create a registry publishing on `bus` and persisting through
    /// `store`. Call [`init`](Self::init) before use.
    pub fn new(store: S, bus: Arc<EventBus>) -> Self {
        Self {
            store: Arc::new(store),
            shared: Arc::new(RegistryShared::with_bus(bus)),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// The shared state handed to drivers and background tasks.
    #[must_use]
    pub fn shared(&self) -> Arc<RegistryShared> {
        Arc::clone(&self.shared)
    }

    /// The bus this registry publishes on.
    #[must_use]
    pub fn bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.shared.bus)
    }

    /// The store this registry persists through.
    #[must_use]
    pub fn store(&self) -> Arc<S> {
        Arc::clone(&self.store)
    }

    /// Wire the control topic and the `device` actor category. Weak
    /// references throughout: the bus must not keep the registry alive.
    pub fn init(&self) {
        let weak = Arc::downgrade(&self.shared);
        self.shared.register_actor_category(
            "device",
            Box::new(move |sub_id| weak.upgrade().and_then(|shared| shared.find_device(sub_id))),
        );

        let weak = Arc::downgrade(&self.shared);
        let store = Arc::clone(&self.store);
        let id = self.shared.bus.subscribe(topic::ACTORS, move |message| {
            let Some(shared) = weak.upgrade() else {
                return Ok(());
            };
            match message {
                BusMessage::Ping => shared.handle_ping(),
                BusMessage::Perform {
                    actor,
                    perform,
                    parameter,
                } => route_perform(&shared, &store, actor, perform, parameter),
                _ => {}
            }
            Ok(())
        });
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((topic::ACTORS, id));
    }

    /// Detach from the bus and drop every live entity.
    pub fn shutdown(&self) {
        let subscriptions: Vec<_> = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for (topic, id) in subscriptions {
            self.shared.bus.unsubscribe(topic, id);
        }
        self.shared
            .devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Register a maker for `type_tag`. Drivers call this once at
    /// startup.
    pub fn register_maker(&self, type_tag: impl Into<String>, maker: Maker) {
        self.shared
            .makers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .register(type_tag, maker);
    }

    /// Register a discovery candidate.
    ///
    /// Idempotent per uid: a second discovery of a known uid returns
    /// `Ok(None)` without touching anything. `Ok(Some(id))` is returned
    /// only when a brand-new store row was created; reusing a persisted
    /// id also yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// [`HearthError::NoMaker`] when neither declared type resolves, or a
    /// storage error from the id round-trip. Either way the reservation
    /// is cleared so the same uid may retry.
    #[tracing::instrument(skip(self, info), fields(uid = %info.id, device_type = %info.device_type))]
    pub async fn discover(&self, mut info: DiscoveryInfo) -> Result<Option<DeviceId>, HearthError> {
        info.validate()?;
        info.normalize();
        let uid = info.uid();

        // Reserve before the first await: the sole concurrency guard
        // against double discovery of one uid.
        {
            let mut devices = self
                .shared
                .devices
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if devices.contains_key(&uid) {
                return Ok(None);
            }
            devices.insert(
                uid.clone(),
                RegistryEntry {
                    discovery: info.clone(),
                    device: None,
                },
            );
        }

        let type_tag = {
            let makers = self
                .shared
                .makers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            makers.resolve_type(&info).map(ToString::to_string)
        };
        let Some(type_tag) = type_tag else {
            self.shared.release(&uid);
            tracing::warn!("no maker registered");
            return Err(HearthError::NoMaker {
                device_type: info.device_type.clone(),
            });
        };

        match self.store.device_id_for_uid(&uid).await {
            Err(error) => {
                self.shared.release(&uid);
                tracing::error!(%error, "device id lookup failed");
                Err(error)
            }
            Ok(Some(device_id)) => {
                self.install(&uid, device_id, &type_tag, info)?;
                tracing::info!(%device_id, %type_tag, "found device");
                Ok(None)
            }
            Ok(None) => {
                let device_id = match self
                    .store
                    .insert_device(&uid, &type_tag, &info.device.name)
                    .await
                {
                    Ok(id) => id,
                    Err(error) => {
                        self.shared.release(&uid);
                        tracing::error!(%error, "device insert failed");
                        return Err(error);
                    }
                };
                self.install(&uid, device_id, &type_tag, info)?;
                tracing::info!(%device_id, %type_tag, "adding device");
                Ok(Some(device_id))
            }
        }
    }

    fn install(
        &self,
        uid: &DeviceUid,
        device_id: DeviceId,
        type_tag: &str,
        info: DiscoveryInfo,
    ) -> Result<(), HearthError> {
        let device = {
            let makers = self
                .shared
                .makers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let Some(maker) = makers.resolve(type_tag) else {
                self.shared.release(uid);
                return Err(HearthError::NoMaker {
                    device_type: type_tag.to_string(),
                });
            };
            maker(device_id, uid.clone(), info)
        };

        let mut devices = self
            .shared
            .devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = devices.get_mut(uid) {
            entry.device = Some(share(device));
        }
        Ok(())
    }

    /// Find a device — top-level or child of a composite — by its
    /// assigned id.
    #[must_use]
    pub fn device_by_id(&self, id: DeviceId) -> Option<DeviceHandle<S>> {
        self.shared
            .device_by_id_shared(id)
            .map(|device| self.handle(device))
    }

    /// Find a top-level device by its discovery uid.
    #[must_use]
    pub fn device_by_uid(&self, uid: &DeviceUid) -> Option<DeviceHandle<S>> {
        self.shared
            .device_by_uid_shared(uid)
            .map(|device| self.handle(device))
    }

    /// The discovery payload a registered uid arrived with.
    #[must_use]
    pub fn discovery(&self, uid: &DeviceUid) -> Option<DiscoveryInfo> {
        let devices = self
            .shared
            .devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        devices.get(uid).map(|entry| entry.discovery.clone())
    }

    /// Every known device id, parents followed by their children.
    #[must_use]
    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.shared
            .flattened_devices()
            .iter()
            .map(|device| with_device(device, |d| d.core().device_id()))
            .collect()
    }

    /// Cheap health overview, independent of the bus.
    #[must_use]
    pub fn health(&self) -> HealthSummary {
        let mut summary = HealthSummary::default();
        for device in self.shared.flattened_devices() {
            match with_device(&device, |d| d.core().status.severity()) {
                Some(Severity::Warning) => summary.warning += 1,
                Some(Severity::Attention) => summary.attention += 1,
                Some(Severity::Error) => summary.error += 1,
                None => {}
            }
        }
        summary
    }

    /// Process-wide high-water mark over every entity's `updated`.
    #[must_use]
    pub fn last_updated(&self) -> Timestamp {
        self.shared.last_updated()
    }

    /// Resolve `.[` … `].` expressions in `line` against live devices
    /// and registered actor categories.
    #[must_use]
    pub fn expand(&self, line: &str, default: Option<&DeviceHandle<S>>) -> String {
        let actors = self
            .shared
            .actors
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        expand(line, default.map(DeviceHandle::device), &actors, &|head| {
            self.shared.find_device(head)
        })
    }

    /// Wrap a shared device into a handle bound to this registry's store
    /// and bus.
    #[must_use]
    pub fn handle(&self, device: SharedDevice) -> DeviceHandle<S> {
        DeviceHandle::new(device, Arc::clone(&self.shared), Arc::clone(&self.store))
    }
}

/// Route a `Perform` request to its addressed device. Execution is
/// spawned: bus handlers are synchronous, the command path is not.
fn route_perform<S: DeviceStore + 'static>(
    shared: &Arc<RegistryShared>,
    store: &Arc<S>,
    actor: &str,
    perform: &str,
    parameter: &str,
) {
    let Some(id) = actor
        .strip_prefix("device/")
        .and_then(|raw| raw.parse::<DeviceId>().ok())
    else {
        return;
    };
    let Some(device) = shared.device_by_id_shared(id) else {
        tracing::warn!(actor, "perform addressed to unknown device");
        return;
    };

    let handle = DeviceHandle::new(device, Arc::clone(shared), Arc::clone(store));
    let perform = perform.to_string();
    let parameter = parameter.to_string();
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(async move {
                let done = command::perform(&handle, &perform, &parameter).await;
                tracing::debug!(%id, perform, done, "perform routed");
            });
        }
        Err(_) => tracing::warn!(%id, "no runtime available to route perform"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::sync::atomic::AtomicBool;

    use hearth_domain::device::{Device, DeviceCore};
    use hearth_domain::status::DeviceStatus;

    struct Row {
        id: DeviceId,
        uid: DeviceUid,
        name: String,
    }

    #[derive(Default)]
    struct InMemoryDeviceStore {
        rows: Mutex<Vec<Row>>,
        next_id: AtomicI64,
        fail_writes: AtomicBool,
    }

    impl InMemoryDeviceStore {
        fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::Relaxed);
        }

        fn failure(&self) -> Option<HearthError> {
            self.fail_writes
                .load(Ordering::Relaxed)
                .then(|| HearthError::Storage(Box::new(std::io::Error::other("store down"))))
        }
    }

    impl DeviceStore for InMemoryDeviceStore {
        fn device_id_for_uid(
            &self,
            uid: &DeviceUid,
        ) -> impl Future<Output = Result<Option<DeviceId>, HearthError>> + Send {
            let rows = self.rows.lock().unwrap();
            let found = rows.iter().find(|row| row.uid == *uid).map(|row| row.id);
            async move { Ok(found) }
        }

        fn insert_device(
            &self,
            uid: &DeviceUid,
            _device_type: &str,
            name: &str,
        ) -> impl Future<Output = Result<DeviceId, HearthError>> + Send {
            let result = match self.failure() {
                Some(err) => Err(err),
                None => {
                    let id = DeviceId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
                    self.rows.lock().unwrap().push(Row {
                        id,
                        uid: uid.clone(),
                        name: name.to_string(),
                    });
                    Ok(id)
                }
            };
            async move { result }
        }

        fn device_name(
            &self,
            id: DeviceId,
        ) -> impl Future<Output = Result<Option<String>, HearthError>> + Send {
            let rows = self.rows.lock().unwrap();
            let found = rows
                .iter()
                .find(|row| row.id == id)
                .map(|row| row.name.clone());
            async move { Ok(found) }
        }

        fn update_device_name(
            &self,
            id: DeviceId,
            name: &str,
        ) -> impl Future<Output = Result<(), HearthError>> + Send {
            let result = match self.failure() {
                Some(err) => Err(err),
                None => {
                    let mut rows = self.rows.lock().unwrap();
                    if let Some(row) = rows.iter_mut().find(|row| row.id == id) {
                        row.name = name.to_string();
                    }
                    Ok(())
                }
            };
            async move { result }
        }

        fn update_device_info(
            &self,
            _id: DeviceId,
            _info: &Value,
        ) -> impl Future<Output = Result<(), HearthError>> + Send {
            let result = match self.failure() {
                Some(err) => Err(err),
                None => Ok(()),
            };
            async move { result }
        }
    }

    struct TestDevice {
        core: DeviceCore,
        children: Vec<SharedDevice>,
    }

    impl Device for TestDevice {
        fn core(&self) -> &DeviceCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut DeviceCore {
            &mut self.core
        }

        fn children(&self) -> Vec<SharedDevice> {
            self.children.clone()
        }
    }

    fn plain_maker() -> Maker {
        Box::new(|id, uid, info| {
            let mut core = DeviceCore::new(id, uid, info.device_type.clone(), info.device.name);
            core.status = DeviceStatus::Present;
            Box::new(TestDevice {
                core,
                children: Vec::new(),
            })
        })
    }

    /// Bridge maker: exposes one logical child next to the parent.
    fn bridge_maker() -> Maker {
        Box::new(|id, uid, info| {
            let mut core = DeviceCore::new(id, uid.clone(), info.device_type.clone(), info.device.name);
            core.status = DeviceStatus::Present;
            let mut child_core = DeviceCore::new(
                DeviceId::new(id.as_i64() + 1000),
                DeviceUid::from(format!("{uid}/0").as_str()),
                "/device/test/leaf",
                "Leaf",
            );
            child_core.status = DeviceStatus::Present;
            let child = share(Box::new(TestDevice {
                core: child_core,
                children: Vec::new(),
            }));
            Box::new(TestDevice {
                core,
                children: vec![child],
            })
        })
    }

    fn registry() -> DeviceRegistry<InMemoryDeviceStore> {
        let registry = DeviceRegistry::new(InMemoryDeviceStore::default(), Arc::new(EventBus::new()));
        registry.init();
        registry.register_maker("/device/test", plain_maker());
        registry
    }

    fn collect(bus: &EventBus, topic: &str) -> Arc<Mutex<Vec<BusMessage>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(topic, move |message| {
            sink.lock().unwrap().push(message.clone());
            Ok(())
        });
        seen
    }

    fn payload(uid: &str) -> DiscoveryInfo {
        DiscoveryInfo::new(uid, "/device/test", "T1")
    }

    #[tokio::test]
    async fn should_assign_a_new_id_on_first_discovery() {
        let registry = registry();
        let id = registry.discover(payload("u1")).await.unwrap();
        assert_eq!(id, Some(DeviceId::new(1)));

        let handle = registry.device_by_id(DeviceId::new(1)).unwrap();
        assert_eq!(handle.name(), "T1");
    }

    #[tokio::test]
    async fn should_noop_on_rediscovery_of_a_known_uid() {
        let registry = registry();
        assert!(registry.discover(payload("u1")).await.unwrap().is_some());
        assert_eq!(registry.discover(payload("u1")).await.unwrap(), None);
        assert_eq!(registry.device_ids().len(), 1);
    }

    #[tokio::test]
    async fn should_reuse_a_persisted_id() {
        let store = InMemoryDeviceStore::default();
        store.rows.lock().unwrap().push(Row {
            id: DeviceId::new(41),
            uid: DeviceUid::from("u1"),
            name: "Old".to_string(),
        });
        store.next_id.store(41, Ordering::Relaxed);

        let registry = DeviceRegistry::new(store, Arc::new(EventBus::new()));
        registry.register_maker("/device/test", plain_maker());

        assert_eq!(registry.discover(payload("u1")).await.unwrap(), None);
        assert!(registry.device_by_id(DeviceId::new(41)).is_some());
    }

    #[tokio::test]
    async fn should_fail_discovery_without_a_maker_and_allow_retry() {
        let registry = registry();
        let result = registry.discover(payload_type("u9", "/device/none")).await;
        assert!(matches!(result, Err(HearthError::NoMaker { .. })));
        assert!(registry.device_ids().is_empty());

        registry.register_maker("/device/none", plain_maker());
        assert!(
            registry
                .discover(payload_type("u9", "/device/none"))
                .await
                .unwrap()
                .is_some()
        );
    }

    fn payload_type(uid: &str, device_type: &str) -> DiscoveryInfo {
        DiscoveryInfo::new(uid, device_type, "T9")
    }

    #[tokio::test]
    async fn should_clear_the_reservation_on_store_failure() {
        let registry = registry();
        let store = Arc::clone(&registry.store);

        store.fail_writes(true);
        assert!(registry.discover(payload("u1")).await.is_err());
        assert!(registry.device_ids().is_empty());

        store.fail_writes(false);
        assert!(registry.discover(payload("u1")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn should_reject_a_payload_without_a_uid() {
        let registry = registry();
        let result = registry.discover(payload("")).await;
        assert!(matches!(result, Err(HearthError::Validation(_))));
    }

    #[tokio::test]
    async fn should_resolve_children_by_id() {
        let registry = registry();
        registry.register_maker("/device/bridge", bridge_maker());
        registry
            .discover(payload_type("b1", "/device/bridge"))
            .await
            .unwrap();

        let child = registry.device_by_id(DeviceId::new(1001)).unwrap();
        assert_eq!(child.name(), "Leaf");
        assert_eq!(registry.device_ids(), vec![DeviceId::new(1), DeviceId::new(1001)]);
    }

    #[tokio::test]
    async fn should_count_health_by_severity() {
        let registry = registry();
        for uid in ["u1", "u2", "u3", "u4"] {
            registry.discover(payload(uid)).await.unwrap();
        }

        let statuses = [
            DeviceStatus::Busy,
            DeviceStatus::Waiting,
            DeviceStatus::Reset,
            DeviceStatus::Error,
        ];
        for (index, status) in statuses.iter().enumerate() {
            let handle = registry.device_by_id(DeviceId::new(index as i64 + 1)).unwrap();
            with_device(handle.device(), |d| d.core_mut().status = *status);
        }

        assert_eq!(
            registry.health(),
            HealthSummary {
                warning: 2,
                attention: 1,
                error: 1
            }
        );
    }

    #[tokio::test]
    async fn should_refresh_unpublished_devices_on_ping() {
        let registry = registry();
        registry.discover(payload("u1")).await.unwrap();

        let bus = registry.bus();
        let seen = collect(&bus, topic::TELEMETRY_EGRESS);

        bus.publish(topic::ACTORS, &BusMessage::Ping);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let BusMessage::Updates(value) = &seen[0] else {
            panic!("expected an updates message");
        };
        assert_eq!(value["whoami"], Value::from("device/1"));
    }

    #[tokio::test]
    async fn should_batch_published_snapshots_on_ping() {
        let registry = registry();
        registry.discover(payload("u1")).await.unwrap();
        registry.discover(payload("u2")).await.unwrap();
        for id in [1, 2] {
            registry.device_by_id(DeviceId::new(id)).unwrap().changed();
        }

        let bus = registry.bus();
        let seen = collect(&bus, topic::TELEMETRY_EGRESS);

        bus.publish(topic::ACTORS, &BusMessage::Ping);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let BusMessage::Updates(Value::Array(batch)) = &seen[0] else {
            panic!("expected a batch");
        };
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(|entry| entry["updated"].is_i64()));
    }

    #[tokio::test]
    async fn should_skip_ping_without_telemetry_subscribers() {
        let registry = registry();
        registry.discover(payload("u1")).await.unwrap();

        registry
            .bus()
            .publish(topic::ACTORS, &BusMessage::Ping);

        let handle = registry.device_by_id(DeviceId::new(1)).unwrap();
        assert!(with_device(handle.device(), |d| !d.core().has_published()));
    }

    #[tokio::test]
    async fn should_route_performs_to_the_addressed_device() {
        let registry = registry();
        registry.discover(payload("u1")).await.unwrap();

        registry.bus().publish(
            topic::ACTORS,
            &BusMessage::Perform {
                actor: "device/1".to_string(),
                perform: "set".to_string(),
                parameter: r#"{"name":"Kitchen"}"#.to_string(),
            },
        );

        let handle = registry.device_by_id(DeviceId::new(1)).unwrap();
        for _ in 0..8 {
            if handle.name() == "Kitchen" {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(handle.name(), "Kitchen");
    }

    #[tokio::test]
    async fn should_expand_against_live_devices() {
        let registry = registry();
        registry.discover(payload("u1")).await.unwrap();

        assert_eq!(registry.expand(".[u1.status].", None), "present");
        assert_eq!(registry.expand(".[1.name].", None), "T1");
        assert_eq!(registry.expand(".[device/1.name].", None), "T1");
        assert_eq!(
            registry.expand(".[ghost.status].", None),
            ".[ghost.status]."
        );
    }

    #[tokio::test]
    async fn should_never_lower_the_last_updated_watermark() {
        let registry = registry();
        registry.discover(payload("u1")).await.unwrap();
        let handle = registry.device_by_id(DeviceId::new(1)).unwrap();

        let base = registry.last_updated();
        handle.changed_at(base + chrono::Duration::seconds(30));
        let high = registry.last_updated();
        assert_eq!(high, base + chrono::Duration::seconds(30));

        handle.changed_at(base + chrono::Duration::seconds(5));
        assert_eq!(registry.last_updated(), high);
    }

    #[tokio::test]
    async fn should_escalate_reset_and_error_on_the_control_topic() {
        let registry = registry();
        registry.discover(payload("u1")).await.unwrap();
        let handle = registry.device_by_id(DeviceId::new(1)).unwrap();
        handle.changed();

        let bus = registry.bus();
        let seen = collect(&bus, topic::ACTORS);

        with_device(handle.device(), |d| d.core_mut().status = DeviceStatus::Error);
        handle.changed();

        assert_eq!(*seen.lock().unwrap(), vec![BusMessage::Attention]);
    }

    #[tokio::test]
    async fn should_keep_the_discovery_payload() {
        let registry = registry();
        let mut info = payload("u1");
        info.url = Some("http://192.168.7.2/desc.xml".to_string());
        registry.discover(info).await.unwrap();

        let kept = registry.discovery(&DeviceUid::from("u1")).unwrap();
        assert_eq!(kept.ipaddress.as_deref(), Some("192.168.7.2"));
    }

    #[tokio::test]
    async fn should_detach_from_the_bus_on_shutdown() {
        let registry = registry();
        registry.discover(payload("u1")).await.unwrap();
        registry.shutdown();

        assert!(registry.device_ids().is_empty());
        assert!(!registry.bus().has(topic::ACTORS));
    }
}
