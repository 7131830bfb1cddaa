//! Typed identifier newtypes for devices.
//!
//! A device carries two identifiers with very different lifecycles:
//! [`DeviceId`] is assigned by the persistent store the first time a device
//! is registered and never changes afterwards, while [`DeviceUid`] is the
//! externally observed identifier (a hardware address, a serial number)
//! reported by discovery and used to decide whether a device is already
//! known.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Store-assigned internal identifier, unique per [`DeviceUid`].
///
/// Assigned exactly once at first registration and reused across process
/// restarts. Never recycled for a different uid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(i64);

impl DeviceId {
    /// Wrap a raw store row id.
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Access the raw row id.
    #[must_use]
    pub fn as_i64(self) -> i64 {
        self.0
    }

    /// The external identity string used on the bus and in actor paths.
    #[must_use]
    pub fn whoami(self) -> String {
        format!("device/{}", self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for DeviceId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Externally observed stable identifier supplied by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceUid(String);

impl DeviceUid {
    /// Wrap a discovery-supplied identifier.
    #[must_use]
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    /// Access the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for DeviceUid {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DeviceUid {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_roundtrip_device_id_through_display_and_from_str() {
        let id = DeviceId::new(42);
        let text = id.to_string();
        let parsed: DeviceId = text.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn should_serialize_device_id_as_plain_number() {
        let json = serde_json::to_string(&DeviceId::new(7)).unwrap();
        assert_eq!(json, "7");
    }

    #[test]
    fn should_build_whoami_from_device_id() {
        assert_eq!(DeviceId::new(12).whoami(), "device/12");
    }

    #[test]
    fn should_return_error_when_parsing_non_numeric_device_id() {
        let result: Result<DeviceId, _> = "u-12-af".parse();
        assert!(result.is_err());
    }

    #[test]
    fn should_serialize_device_uid_as_plain_string() {
        let json = serde_json::to_string(&DeviceUid::new("aa:bb:cc")).unwrap();
        assert_eq!(json, "\"aa:bb:cc\"");
    }

    #[test]
    fn should_compare_device_uids_by_value() {
        assert_eq!(DeviceUid::from("u1"), DeviceUid::new("u1"));
        assert_ne!(DeviceUid::from("u1"), DeviceUid::from("u2"));
    }
}
