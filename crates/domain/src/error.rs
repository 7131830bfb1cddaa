//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`HearthError`] via `#[from]`. Adapter errors cross the boundary boxed
//! behind the [`Storage`](HearthError::Storage) variant so the domain does
//! not depend on any concrete store.

/// Top-level error type for registry and device operations.
#[derive(Debug, thiserror::Error)]
pub enum HearthError {
    /// A domain invariant was violated by the caller.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A referenced device does not exist.
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// No maker is registered for a discovered device type. This is a
    /// configuration error: the discovery candidate is not registered.
    #[error("no maker registered for {device_type}")]
    NoMaker {
        /// The primary type tag reported by discovery.
        device_type: String,
    },

    /// The persistent store failed; the concrete error comes from the
    /// storage adapter.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Domain invariant violations.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A device name must not be empty.
    #[error("device name must not be empty")]
    EmptyName,

    /// A discovery payload must carry a device uid.
    #[error("discovery payload is missing a device uid")]
    EmptyDeviceUid,
}

/// A lookup failed to resolve.
#[derive(Debug, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    /// What kind of thing was looked up.
    pub entity: &'static str,
    /// The identifier that failed to resolve.
    pub id: String,
}
