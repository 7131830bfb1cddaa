//! # hearth-domain
//!
//! Pure domain model for the hearth home-hub control plane.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define the polymorphic **Device** capability set and its shared base
//!   state ([`device::DeviceCore`])
//! - Compute canonical **Snapshots** of externally visible device state,
//!   including redaction and change deduplication
//! - Model **discovery payloads** produced by transport collaborators
//! - Small driver-facing helpers: value scaling, raw payload decoding
//!
//! ## Dependency rule
//! This crate has **no internal dependencies** and performs no IO.
//! It must never import anything from `app`, adapters, or IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod device;
pub mod discovery;
pub mod raw;
pub mod scale;
pub mod snapshot;
pub mod status;
