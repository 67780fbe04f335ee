//! Bridge configuration types.
//!
//! The configuration file format (YAML device file or inline JSON list)
//! is owned by the hosting process; this module only defines the shapes
//! the bridge consumes: a broker settings block and an ordered list of
//! device declarations.

use serde::{Deserialize, Serialize};

/// One device declaration from the operator's device list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDeclaration {
    /// Raw device id; sanitized into a `DeviceId` at load time.
    pub id: String,
    /// Catalogue type name ("switch", "dimmer", "shellyflood", ...).
    #[serde(rename = "type")]
    pub type_name: String,
    /// One or more inbound topics, depending on the type's topic plan.
    pub status_topic: StatusTopics,
    /// Outbound command topic. Optional for types that never publish.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd_topic: Option<String>,
    /// Sensor block key for multi-sensor Tasmota payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_id: Option<String>,
    /// Friendly name; falls back to the id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl DeviceDeclaration {
    /// Display name for logs and reports.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Status topic field: a single topic for most types, an array for
/// types that listen on several (e.g. flood sensors).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusTopics {
    One(String),
    Many(Vec<String>),
}

impl StatusTopics {
    /// View the declared topics as a slice regardless of shape.
    pub fn as_slice(&self) -> &[String] {
        match self {
            StatusTopics::One(t) => std::slice::from_ref(t),
            StatusTopics::Many(ts) => ts,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

impl From<&str> for StatusTopics {
    fn from(topic: &str) -> Self {
        StatusTopics::One(topic.to_string())
    }
}

impl From<Vec<String>> for StatusTopics {
    fn from(topics: Vec<String>) -> Self {
        StatusTopics::Many(topics)
    }
}

/// Broker connection settings with the stock defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerSettings {
    #[serde(default = "default_server")]
    pub mqtt_server: String,
    #[serde(default = "default_port")]
    pub mqtt_port: u16,
    #[serde(default = "default_user")]
    pub mqtt_user: String,
    #[serde(default = "default_password")]
    pub mqtt_password: String,
    /// Replaces a leading `~` in status topics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_prefix: Option<String>,
    /// Replaces a leading `~` in command topics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd_prefix: Option<String>,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            mqtt_server: default_server(),
            mqtt_port: default_port(),
            mqtt_user: default_user(),
            mqtt_password: default_password(),
            status_prefix: None,
            cmd_prefix: None,
        }
    }
}

fn default_server() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    1884
}

fn default_user() -> String {
    "admin".to_string()
}

fn default_password() -> String {
    "admin".to_string()
}

/// Complete bridge configuration: broker settings plus the device list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub general: BrokerSettings,
    #[serde(default)]
    pub devices: Vec<DeviceDeclaration>,
}

impl BridgeConfig {
    pub fn new(general: BrokerSettings, devices: Vec<DeviceDeclaration>) -> Self {
        Self { general, devices }
    }
}
