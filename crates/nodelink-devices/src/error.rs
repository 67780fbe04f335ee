//! Error taxonomy for the bridge.
//!
//! Three families with very different blast radii: [`LoadError`] is fatal
//! and stops startup (a broken device table cannot be repaired at
//! runtime), while [`DecodeError`] and [`CommandError`] are per-operation
//! and never interrupt processing of unrelated messages or commands.

use nodelink_core::{DeviceId, InvalidDeviceId, ValueError};
use thiserror::Error;

/// Fatal error while building the device table from configuration.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Device declares a type the catalogue does not know.
    #[error("device '{device}': unknown device type '{type_name}'")]
    UnknownType { device: String, type_name: String },

    /// Device id failed sanitization.
    #[error("device id '{raw}' is unusable: {source}")]
    InvalidId {
        raw: String,
        #[source]
        source: InvalidDeviceId,
    },

    /// Two declarations sanitize to the same device id.
    #[error("duplicate device id '{id}'")]
    DuplicateDevice { id: DeviceId },

    /// The id or type is reserved for the controller pseudo-device.
    #[error("'{id}' is reserved for the controller")]
    ReservedId { id: String },

    /// A resolved status topic is already bound to another device.
    #[error("status topic '{topic}' already bound to device '{existing}'")]
    DuplicateStatusTopic { topic: String, existing: DeviceId },

    /// A resolved command topic is already bound to another device.
    #[error("command topic '{topic}' already bound to device '{existing}'")]
    DuplicateCommandTopic { topic: String, existing: DeviceId },

    /// Wrong number of status topics for the type's topic plan.
    #[error("device '{device}': type '{type_name}' expects {expected} status topic(s), got {got}")]
    TopicCount {
        device: DeviceId,
        type_name: &'static str,
        expected: &'static str,
        got: usize,
    },

    /// A declared topic's trailing segment matches no slot suffix.
    #[error("device '{device}': status topic '{topic}' matches no declared suffix")]
    UnmatchedTopic { device: DeviceId, topic: String },

    /// Two declared topics resolve to the same slot suffix.
    #[error("device '{device}': suffix '{suffix}' declared more than once")]
    DuplicateSuffix {
        device: DeviceId,
        suffix: &'static str,
    },

    /// Topic uses the `~` placeholder but no prefix is configured.
    #[error("device '{device}': topic '{topic}' needs a configured {which}")]
    MissingPrefix {
        device: String,
        topic: String,
        which: &'static str,
    },

    /// The type publishes commands but the declaration has no command topic.
    #[error("device '{device}': type '{type_name}' requires a command topic")]
    MissingCommandTopic {
        device: DeviceId,
        type_name: &'static str,
    },

    /// Catalogue self-check failure (a schema references an undeclared
    /// status or is otherwise inconsistent).
    #[error("schema '{type_name}' is inconsistent: {detail}")]
    BadSchema {
        type_name: &'static str,
        detail: String,
    },
}

/// Non-fatal failure decoding one inbound message.
///
/// The message is dropped whole; no partial update reaches the cache.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload is not parseable JSON.
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload parsed but is not a JSON object.
    #[error("expected a JSON object, got '{payload}'")]
    NotAnObject { payload: String },

    /// A declared field holds a value of the wrong JSON type.
    #[error("field '{field}' is not a {expected}")]
    FieldType {
        field: &'static str,
        expected: &'static str,
    },

    /// A token outside the declared vocabulary for the status.
    #[error("unrecognized token '{token}' for status '{status}'")]
    UnknownToken { status: &'static str, token: String },

    /// Bare scalar payload that should be numeric but is not.
    #[error("payload '{payload}' is not numeric")]
    NotNumeric { payload: String },

    /// Bare scalar payload that should be an integer but is not.
    #[error("payload '{payload}' is not an integer")]
    NotAnInteger { payload: String },

    /// A decoded value violates the status's declared kind.
    #[error("status '{status}': {source}")]
    Invalid {
        status: &'static str,
        #[source]
        source: ValueError,
    },

    /// Slot index outside the schema (indicates a routing bug).
    #[error("slot {slot} out of range for type '{type_name}'")]
    BadSlot { type_name: &'static str, slot: usize },
}

/// Non-fatal failure encoding one outbound command. Nothing is published.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Command targets an id absent from the device table.
    #[error("unknown device '{device}'")]
    UnknownDevice { device: String },

    /// Command id not declared for the device's type.
    #[error("type '{type_name}' does not accept command '{command}'")]
    UnsupportedCommand {
        type_name: &'static str,
        command: String,
    },

    /// A supplied parameter value fails its declared kind.
    #[error("command '{command}', parameter '{param}': {source}")]
    InvalidParam {
        command: &'static str,
        param: &'static str,
        #[source]
        source: ValueError,
    },

    /// A required parameter is absent and has no resolvable default.
    #[error("command '{command}' is missing required parameter '{param}'")]
    MissingParam {
        command: &'static str,
        param: &'static str,
    },

    /// The command must publish but the device has no command topic.
    #[error("device '{device}' has no command topic")]
    NoCommandTopic { device: DeviceId },
}
