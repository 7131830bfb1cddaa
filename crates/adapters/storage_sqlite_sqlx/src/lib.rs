//! # hearth-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the `DeviceStore` port defined in `hearth-app`
//! - Manage the `SQLite` connection pool lifecycle
//! - Run embedded sqlx migrations
//! - Map between domain identifiers and database rows
//!
//! ## Dependency rule
//! Depends on `hearth-app` (for the port trait) and `hearth-domain` (for
//! domain types). The `app` and `domain` crates must never reference this
//! adapter.

mod device_store;
mod error;
pub mod pool;

pub use device_store::SqliteDeviceStore;
pub use error::StorageError;
pub use pool::{Config, Database};
