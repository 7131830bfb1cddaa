//! Discovery payload — what transport collaborators hand to the registry.
//!
//! Transports (BLE scanners, network beacon listeners) only produce this
//! record; everything after that — type resolution, persistence, entity
//! construction — is the registry's job.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::id::DeviceUid;

/// A discovery candidate observed by a transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryInfo {
    /// Externally stable identifier (the future [`DeviceUid`]).
    pub id: String,
    /// Primary declared type path.
    #[serde(rename = "deviceType")]
    pub device_type: String,
    /// Secondary declared type, tried when no maker exists for the
    /// primary.
    #[serde(rename = "deviceType2", default, skip_serializing_if = "Option::is_none")]
    pub device_type2: Option<String>,
    /// Management URL, when the transport knows one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Network address, derived from `url` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipaddress: Option<String>,
    /// Nested display details.
    pub device: DiscoveredName,
    /// Transport-specific extras (peripheral handles, beacon fields),
    /// passed through to the maker untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Display details reported by the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredName {
    /// Advertised device name.
    pub name: String,
}

impl DiscoveryInfo {
    /// Minimal payload, enough for registration.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        device_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            device_type: device_type.into(),
            device_type2: None,
            url: None,
            ipaddress: None,
            device: DiscoveredName { name: name.into() },
            extra: BTreeMap::new(),
        }
    }

    /// The registry key this candidate registers under.
    #[must_use]
    pub fn uid(&self) -> DeviceUid {
        DeviceUid::from(self.id.as_str())
    }

    /// Check payload invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyDeviceUid`] when `id` is empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyDeviceUid);
        }
        Ok(())
    }

    /// Fill `ipaddress` from the host part of `url` when the transport
    /// did not report one.
    pub fn normalize(&mut self) {
        if self.ipaddress.is_some() {
            return;
        }
        let Some(raw) = self.url.as_deref() else {
            return;
        };
        if let Ok(parsed) = url::Url::parse(raw) {
            self.ipaddress = parsed.host_str().map(ToString::to_string);
        }
    }
}
