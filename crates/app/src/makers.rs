//! Maker registry — type tag to entity factory.
//!
//! Driver collaborators register one maker per device type at startup;
//! the registry consults it during discovery. The mapping is never
//! mutated afterwards.

use std::collections::HashMap;

use hearth_domain::device::Device;
use hearth_domain::discovery::DiscoveryInfo;
use hearth_domain::id::{DeviceId, DeviceUid};

/// Factory constructing one concrete device variant.
pub type Maker = Box<dyn Fn(DeviceId, DeviceUid, DiscoveryInfo) -> Box<dyn Device> + Send + Sync>;

/// Mapping from hierarchical type tag to maker.
#[derive(Default)]
pub struct MakerRegistry {
    makers: HashMap<String, Maker>,
}

impl MakerRegistry {
    /// Register `maker` under `type_tag`. Registering the same tag twice
    /// is a configuration error worth logging, not a fatal one: the last
    /// writer wins.
    pub fn register(&mut self, type_tag: impl Into<String>, maker: Maker) {
        let type_tag = type_tag.into();
        if self.makers.insert(type_tag.clone(), maker).is_some() {
            tracing::warn!(type_tag, "maker registered twice, keeping the newest");
        }
    }

    /// Whether a maker exists for `type_tag`.
    #[must_use]
    pub fn contains(&self, type_tag: &str) -> bool {
        self.makers.contains_key(type_tag)
    }

    /// The maker registered under `type_tag`.
    #[must_use]
    pub fn resolve(&self, type_tag: &str) -> Option<&Maker> {
        self.makers.get(type_tag)
    }

    /// Type resolution policy for discovery: prefer the primary declared
    /// type; fall back to the secondary when the primary has no maker and
    /// a secondary was declared; `None` when neither resolves.
    #[must_use]
    pub fn resolve_type<'a>(&self, info: &'a DiscoveryInfo) -> Option<&'a str> {
        let tag = if self.contains(&info.device_type) || info.device_type2.is_none() {
            info.device_type.as_str()
        } else {
            info.device_type2.as_deref().unwrap_or_default()
        };
        self.contains(tag).then_some(tag)
    }
}
