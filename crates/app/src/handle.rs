//! Device handle — a registry-bound view of one live entity.
//!
//! The handle pairs a shared device with the registry state and the
//! store, giving callers the full capability set: change publication,
//! alerts, and the asynchronous name/info persistence round-trips. Store
//! calls happen outside the device lock; locks never span an await.

use std::sync::Arc;

use hearth_domain::device::{SharedDevice, with_device};
use hearth_domain::error::{HearthError, ValidationError};
use hearth_domain::id::DeviceId;
use hearth_domain::snapshot::Snapshot;
use hearth_domain::time::Timestamp;

use crate::ports::DeviceStore;
use crate::registry::RegistryShared;

/// Handle to one live device entity.
pub struct DeviceHandle<S> {
    device: SharedDevice,
    shared: Arc<RegistryShared>,
    store: Arc<S>,
}

impl<S> Clone for DeviceHandle<S> {
    fn clone(&self) -> Self {
        Self {
            device: Arc::clone(&self.device),
            shared: Arc::clone(&self.shared),
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: DeviceStore> DeviceHandle<S> {
    pub(crate) fn new(device: SharedDevice, shared: Arc<RegistryShared>, store: Arc<S>) -> Self {
        Self {
            device,
            shared,
            store,
        }
    }

    /// The underlying shared entity.
    #[must_use]
    pub fn device(&self) -> &SharedDevice {
        &self.device
    }

    /// Store-assigned identifier.
    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        with_device(&self.device, |d| d.core().device_id())
    }

    /// Current display name.
    #[must_use]
    pub fn name(&self) -> String {
        with_device(&self.device, |d| d.core().name.clone())
    }

    /// Canonical external snapshot of the current state.
    #[must_use]
    pub fn proplist(&self) -> Snapshot {
        with_device(&self.device, |d| d.core().proplist())
    }

    /// Run the change engine: publish the snapshot if the externally
    /// visible state moved since the last publication.
    pub fn changed(&self) {
        self.shared.changed_device(&self.device);
    }

    /// [`changed`](Self::changed) with an explicit observation time.
    pub fn changed_at(&self, at: Timestamp) {
        self.shared.changed_device_at(&self.device, at);
    }

    /// Publish a one-shot notification; never deduplicated.
    pub fn alert(&self, message: &str) {
        self.shared.alert_device(&self.device, message);
    }

    /// Re-read the persisted display name and adopt it.
    ///
    /// # Errors
    ///
    /// Propagates store read failures.
    #[tracing::instrument(skip(self), fields(device_id = %self.device_id()))]
    pub async fn refresh_name(&self) -> Result<(), HearthError> {
        let id = self.device_id();
        let name = self.store.device_name(id).await.inspect_err(|error| {
            tracing::error!(%error, "device name lookup failed");
        })?;

        if let Some(name) = name {
            with_device(&self.device, |d| d.core_mut().name = name);
            self.changed();
        }
        Ok(())
    }

    /// Persist a new display name, then adopt it and publish the change.
    ///
    /// # Errors
    ///
    /// [`ValidationError::EmptyName`] for an empty name (nothing is
    /// written), or a store write failure (in-memory name unchanged).
    #[tracing::instrument(skip(self), fields(device_id = %self.device_id()))]
    pub async fn set_name(&self, name: &str) -> Result<(), HearthError> {
        if name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }

        let id = self.device_id();
        self.store
            .update_device_name(id, name)
            .await
            .inspect_err(|error| {
                tracing::error!(%error, "device name update failed");
            })?;

        with_device(&self.device, |d| d.core_mut().name = name.to_string());
        self.changed();
        Ok(())
    }

    /// Persist the recovery copy of the property bag.
    ///
    /// # Errors
    ///
    /// Propagates store write failures; never retried here.
    #[tracing::instrument(skip(self), fields(device_id = %self.device_id()))]
    pub async fn persist_info(&self) -> Result<(), HearthError> {
        let id = self.device_id();
        let doc = with_device(&self.device, |d| d.core().recovery_info());

        self.store
            .update_device_info(id, &doc)
            .await
            .inspect_err(|error| {
                tracing::error!(%error, "device info update failed");
            })?;

        self.changed();
        Ok(())
    }
}
