//! Storage port — the persistent operations the registry relies on.
//!
//! The store assigns `DeviceId`s, remembers them across restarts, and
//! keeps the mutable display name plus a recovery copy of the property
//! bag. Callers issue one outstanding call at a time; retry policy, if
//! any, belongs to the adapter.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use hearth_domain::error::HearthError;
use hearth_domain::id::{DeviceId, DeviceUid};

/// Persistence operations for registered devices.
pub trait DeviceStore: Send + Sync {
    /// Look up the id previously assigned to `uid`, if any.
    fn device_id_for_uid(
        &self,
        uid: &DeviceUid,
    ) -> impl Future<Output = Result<Option<DeviceId>, HearthError>> + Send;

    /// Register a new device row and return the assigned id.
    fn insert_device(
        &self,
        uid: &DeviceUid,
        device_type: &str,
        name: &str,
    ) -> impl Future<Output = Result<DeviceId, HearthError>> + Send;

    /// Read the persisted display name.
    fn device_name(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<String>, HearthError>> + Send;

    /// Overwrite the persisted display name.
    fn update_device_name(
        &self,
        id: DeviceId,
        name: &str,
    ) -> impl Future<Output = Result<(), HearthError>> + Send;

    /// Persist the recovery copy of the property bag.
    fn update_device_info(
        &self,
        id: DeviceId,
        info: &Value,
    ) -> impl Future<Output = Result<(), HearthError>> + Send;
}

impl<T: DeviceStore> DeviceStore for Arc<T> {
    fn device_id_for_uid(
        &self,
        uid: &DeviceUid,
    ) -> impl Future<Output = Result<Option<DeviceId>, HearthError>> + Send {
        (**self).device_id_for_uid(uid)
    }

    fn insert_device(
        &self,
        uid: &DeviceUid,
        device_type: &str,
        name: &str,
    ) -> impl Future<Output = Result<DeviceId, HearthError>> + Send {
        (**self).insert_device(uid, device_type, name)
    }

    fn device_name(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<String>, HearthError>> + Send {
        (**self).device_name(id)
    }

    fn update_device_name(
        &self,
        id: DeviceId,
        name: &str,
    ) -> impl Future<Output = Result<(), HearthError>> + Send {
        (**self).update_device_name(id, name)
    }

    fn update_device_info(
        &self,
        id: DeviceId,
        info: &Value,
    ) -> impl Future<Output = Result<(), HearthError>> + Send {
        (**self).update_device_info(id, info)
    }
}
