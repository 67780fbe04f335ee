//! Events that flow from the bridge to the controller boundary.
//!
//! All components communicate via these events for loose coupling: the
//! decode pipeline publishes them and the controller-facing transport
//! subscribes to the ones it cares about.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ident::DeviceId;
use crate::value::Value;

/// Unified bridge event.
///
/// Everything the controller needs to hear leaves the bridge as one of
/// these variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BridgeEvent {
    /// A cached status value changed (or was seen for the first time).
    ///
    /// This is the primary event. Exactly one is emitted per accepted
    /// status update whose value differs from the cached one.
    StatusChanged {
        device_id: DeviceId,
        status: String,
        value: Value,
        uom: u8,
        timestamp: i64,
    },

    /// A device-initiated command report (announce DON/DOF, heartbeat,
    /// RESET acknowledgement).
    CommandSent {
        device_id: DeviceId,
        command: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
        timestamp: i64,
    },

    /// Full re-report of a device's cached values, in response to QUERY.
    StatusReport {
        device_id: DeviceId,
        values: Vec<StatusValue>,
        timestamp: i64,
    },
}

impl BridgeEvent {
    /// Get the event type name as a string.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::StatusChanged { .. } => "StatusChanged",
            Self::CommandSent { .. } => "CommandSent",
            Self::StatusReport { .. } => "StatusReport",
        }
    }

    /// Get the device this event concerns.
    pub fn device_id(&self) -> &DeviceId {
        match self {
            Self::StatusChanged { device_id, .. }
            | Self::CommandSent { device_id, .. }
            | Self::StatusReport { device_id, .. } => device_id,
        }
    }

    /// Get the timestamp of this event.
    pub fn timestamp(&self) -> i64 {
        match self {
            Self::StatusChanged { timestamp, .. }
            | Self::CommandSent { timestamp, .. }
            | Self::StatusReport { timestamp, .. } => *timestamp,
        }
    }

    pub fn is_status_event(&self) -> bool {
        matches!(self, Self::StatusChanged { .. } | Self::StatusReport { .. })
    }

    pub fn is_command_event(&self) -> bool {
        matches!(self, Self::CommandSent { .. })
    }
}

impl fmt::Display for BridgeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// One status/value/uom triple inside a [`BridgeEvent::StatusReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusValue {
    pub status: String,
    pub value: Value,
    pub uom: u8,
}

impl StatusValue {
    pub fn new(status: impl Into<String>, value: Value, uom: u8) -> Self {
        Self {
            status: status.into(),
            value,
            uom,
        }
    }
}

/// Event metadata.
///
/// Attached to each event for tracking which component published it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event ID
    pub event_id: String,
    /// Event source (component that published)
    pub source: String,
    /// Event timestamp
    pub timestamp: i64,
}

impl EventMetadata {
    /// Create new event metadata.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            source: source.into(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}
