//! Bus topics and message shapes.

use serde_json::Value;

/// Topic names used by the control-plane core.
pub mod topic {
    /// Control topic: ping requests, perform routing, attention signals.
    pub const ACTORS: &str = "actors";
    /// High-volume state-delta topic consumed by telemetry relays.
    pub const TELEMETRY_EGRESS: &str = "telemetry-egress";
}

/// A message delivered through the event bus.
#[derive(Debug, Clone, PartialEq)]
pub enum BusMessage {
    /// A state delta on [`topic::TELEMETRY_EGRESS`] — a single snapshot,
    /// a batch array (ping replies), or an alert record.
    Updates(Value),
    /// Request for a full snapshot batch on [`topic::ACTORS`].
    Ping,
    /// Request to run a perform against one actor.
    Perform {
        /// Actor path, e.g. `device/5`.
        actor: String,
        /// Perform name, e.g. `set`.
        perform: String,
        /// JSON parameter body.
        parameter: String,
    },
    /// Low-volume escalation raised when a device enters `reset` or
    /// `error`.
    Attention,
}
