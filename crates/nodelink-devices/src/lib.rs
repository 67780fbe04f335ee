//! Device-type translation core for NodeLink.
//!
//! This crate turns raw MQTT traffic from heterogeneous smart devices
//! into one typed status/command vocabulary and back. Each supported
//! device family is described by a compiled-in [`schema::TypeSchema`];
//! the configuration binds instances of those types to topics.
//!
//! ## Architecture
//!
//! - **DeviceTable**: configuration loader and topic router, built once
//!   per configuration and swapped atomically on reload
//! - **decode / encode**: pure schema-driven translation between
//!   payload bytes and typed values
//! - **StateCache**: last known value per (device, status), the basis
//!   for exactly-once change events and command defaults
//! - **BridgeService**: the orchestrator wiring the above to an
//!   [`EventBus`](nodelink_core::EventBus) and an [`MqttPublisher`]
//!
//! The service also maintains the controller pseudo-device, which
//! reports bridge health and answers QUERY/DISCOVER for the bridge as
//! a whole.

pub mod cache;
pub mod config;
pub mod decode;
pub mod encode;
pub mod error;
pub mod registry;
pub mod schema;
pub mod service;

// Re-exports for convenience
pub use cache::{Applied, StateCache};
pub use config::{BridgeConfig, BrokerSettings, DeviceDeclaration, StatusTopics};
pub use decode::decode;
pub use encode::{encode, CommandOutcome};
pub use error::{CommandError, DecodeError, LoadError};
pub use registry::{DeviceDescriptor, DeviceTable};
pub use schema::{
    catalogue, AnnounceFire, AnnounceRule, CommandDef, CommandTarget, DonWhen, ParamDef,
    PayloadPlan, SlotSchema, StatusDef, TopicPlan, TypeSchema,
};
pub use service::{BridgeService, ChannelPublisher, HeartbeatConfig, MqttPublisher};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
