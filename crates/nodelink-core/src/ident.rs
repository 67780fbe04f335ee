//! Device identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest identifier the controller's node addressing accepts.
pub const MAX_DEVICE_ID_LEN: usize = 14;

/// Validated device identifier: 1..=14 chars of `[a-z0-9_]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Accept an already well-formed identifier.
    pub fn parse(id: &str) -> Result<Self, InvalidDeviceId> {
        if id.is_empty() {
            return Err(InvalidDeviceId::Empty);
        }
        if id.len() > MAX_DEVICE_ID_LEN {
            return Err(InvalidDeviceId::TooLong { id: id.to_string() });
        }
        if let Some(c) = id
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_'))
        {
            return Err(InvalidDeviceId::InvalidChar {
                id: id.to_string(),
                ch: c,
            });
        }
        Ok(DeviceId(id.to_string()))
    }

    /// Normalize an arbitrary configured id into a valid identifier.
    ///
    /// Lowercases, removes underscores, maps hyphens to underscores, drops
    /// any other non-alphanumeric character and truncates to
    /// [`MAX_DEVICE_ID_LEN`]. `My_Garage-Door` becomes `mygarage_door`.
    pub fn sanitize(raw: &str) -> Result<Self, InvalidDeviceId> {
        let cleaned: String = raw
            .to_ascii_lowercase()
            .chars()
            .filter(|c| *c != '_')
            .map(|c| if c == '-' { '_' } else { c })
            .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
            .take(MAX_DEVICE_ID_LEN)
            .collect();
        if cleaned.is_empty() {
            return Err(InvalidDeviceId::Empty);
        }
        Ok(DeviceId(cleaned))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Rejected device identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidDeviceId {
    #[error("device id is empty")]
    Empty,

    #[error("device id '{id}' exceeds {MAX_DEVICE_ID_LEN} characters")]
    TooLong { id: String },

    #[error("device id '{id}' contains invalid character '{ch}'")]
    InvalidChar { id: String, ch: char },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert_eq!(DeviceId::parse("kitchen_sw1").unwrap().as_str(), "kitchen_sw1");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(DeviceId::parse(""), Err(InvalidDeviceId::Empty));
        assert!(matches!(
            DeviceId::parse("a_very_long_device_id"),
            Err(InvalidDeviceId::TooLong { .. })
        ));
        assert!(matches!(
            DeviceId::parse("Kitchen"),
            Err(InvalidDeviceId::InvalidChar { ch: 'K', .. })
        ));
        assert!(matches!(
            DeviceId::parse("sw.1"),
            Err(InvalidDeviceId::InvalidChar { ch: '.', .. })
        ));
    }

    #[test]
    fn test_sanitize_normalization() {
        assert_eq!(
            DeviceId::sanitize("My_Garage-Door").unwrap().as_str(),
            "mygarage_door"
        );
        assert_eq!(DeviceId::sanitize("SONOFF_S31").unwrap().as_str(), "sonoffs31");
        assert_eq!(
            DeviceId::sanitize("a-very-long-device-name").unwrap().as_str(),
            "a_very_long_de"
        );
    }

    #[test]
    fn test_sanitize_empty_after_cleaning() {
        assert_eq!(DeviceId::sanitize("___"), Err(InvalidDeviceId::Empty));
    }
}
