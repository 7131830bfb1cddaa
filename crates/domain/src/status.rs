//! Device status — the operational state reported by drivers.
//!
//! The base engine enforces no transition legality: drivers assign whatever
//! state reflects their transport (connect, disconnect, command execution)
//! and call `changed()`. Severity classification is purely a function of
//! the current value, not of the transition.

use serde::{Deserialize, Serialize};

/// Operational state of a device entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    #[default]
    Unknown,
    Present,
    Absent,
    Idle,
    Waiting,
    Busy,
    Reset,
    Error,
}

impl DeviceStatus {
    /// Severity bucket for health aggregation, if this status contributes
    /// to one.
    #[must_use]
    pub fn severity(self) -> Option<Severity> {
        match self {
            Self::Waiting | Self::Busy => Some(Severity::Warning),
            Self::Reset => Some(Severity::Attention),
            Self::Error => Some(Severity::Error),
            _ => None,
        }
    }

    /// Whether this status escalates on the control topic when published.
    #[must_use]
    pub fn needs_attention(self) -> bool {
        matches!(self, Self::Reset | Self::Error)
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Unknown => "unknown",
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Idle => "idle",
            Self::Waiting => "waiting",
            Self::Busy => "busy",
            Self::Reset => "reset",
            Self::Error => "error",
        };
        f.write_str(text)
    }
}

/// Health severity bucket, ordered least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Attention,
    Error,
}

impl Severity {
    /// Dashboard color name for this severity.
    #[must_use]
    pub fn color(self) -> &'static str {
        match self {
            Self::Warning => "blue",
            Self::Attention => "orange",
            Self::Error => "red",
        }
    }

    /// Dashboard color as RGB.
    #[must_use]
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            Self::Warning => (0, 0, 255),
            Self::Attention => (255, 131, 0),
            Self::Error => (255, 0, 0),
        }
    }
}

/// Color used when no severity applies (everything nominal).
pub const NORMAL_COLOR: &str = "green";
