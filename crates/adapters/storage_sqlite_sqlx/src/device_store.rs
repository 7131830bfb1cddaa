//! `SQLite` implementation of the [`DeviceStore`] port.

use std::future::Future;

use serde_json::Value;
use sqlx::SqlitePool;

use hearth_app::ports::DeviceStore;
use hearth_domain::error::HearthError;
use hearth_domain::id::{DeviceId, DeviceUid};

use crate::error::StorageError;

const SELECT_ID_BY_UID: &str = "SELECT device_id FROM devices WHERE device_uid = ?";
const INSERT: &str =
    "INSERT INTO devices (device_uid, device_type, device_name, created) VALUES (?, ?, ?, datetime('now'))";
const SELECT_NAME: &str = "SELECT device_name FROM devices WHERE device_id = ?";
const UPDATE_NAME: &str = "UPDATE devices SET device_name = ? WHERE device_id = ?";
const UPSERT_INFO: &str = "INSERT INTO device_props (device_id, key, value) VALUES (?, 'info', ?) \
     ON CONFLICT (device_id, key) DO UPDATE SET value = excluded.value";

/// `SQLite`-backed device store.
pub struct SqliteDeviceStore {
    pool: SqlitePool,
}

impl SqliteDeviceStore {
    /// Create a new store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl DeviceStore for SqliteDeviceStore {
    fn device_id_for_uid(
        &self,
        uid: &DeviceUid,
    ) -> impl Future<Output = Result<Option<DeviceId>, HearthError>> + Send {
        let pool = self.pool.clone();
        let uid = uid.clone();
        async move {
            let row: Option<i64> = sqlx::query_scalar(SELECT_ID_BY_UID)
                .bind(uid.as_str())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(DeviceId::new))
        }
    }

    fn insert_device(
        &self,
        uid: &DeviceUid,
        device_type: &str,
        name: &str,
    ) -> impl Future<Output = Result<DeviceId, HearthError>> + Send {
        let pool = self.pool.clone();
        let uid = uid.clone();
        let device_type = device_type.to_string();
        let name = name.to_string();
        async move {
            let result = sqlx::query(INSERT)
                .bind(uid.as_str())
                .bind(&device_type)
                .bind(&name)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(DeviceId::new(result.last_insert_rowid()))
        }
    }

    fn device_name(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<String>, HearthError>> + Send {
        let pool = self.pool.clone();
        async move {
            let name: Option<String> = sqlx::query_scalar(SELECT_NAME)
                .bind(id.as_i64())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(name)
        }
    }

    fn update_device_name(
        &self,
        id: DeviceId,
        name: &str,
    ) -> impl Future<Output = Result<(), HearthError>> + Send {
        let pool = self.pool.clone();
        let name = name.to_string();
        async move {
            sqlx::query(UPDATE_NAME)
                .bind(&name)
                .bind(id.as_i64())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }

    fn update_device_info(
        &self,
        id: DeviceId,
        info: &Value,
    ) -> impl Future<Output = Result<(), HearthError>> + Send {
        let pool = self.pool.clone();
        let document = info.to_string();
        async move {
            sqlx::query(UPSERT_INFO)
                .bind(id.as_i64())
                .bind(&document)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }
}
