//! Core types for NodeLink.
//!
//! This crate defines the foundational abstractions shared across the
//! project: status values with their units, validated device identifiers,
//! and the event bus that carries bridge events to the controller
//! boundary.

pub mod event;
pub mod eventbus;
pub mod ident;
pub mod value;

// Value exports
pub use value::{EnumTable, Unit, Value, ValueError, ValueKind};

// Identifier exports
pub use ident::{DeviceId, InvalidDeviceId, MAX_DEVICE_ID_LEN};

// Event exports
pub use event::{BridgeEvent, EventMetadata, StatusValue};

// Event bus exports
pub use eventbus::{
    DEFAULT_CHANNEL_CAPACITY, EventBus, EventBusReceiver, FilterBuilder, FilteredReceiver,
    SharedEventBus,
};

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::event::{BridgeEvent, EventMetadata, StatusValue};
    pub use crate::eventbus::{EventBus, SharedEventBus};
    pub use crate::ident::DeviceId;
    pub use crate::value::{Unit, Value, ValueKind};
}
