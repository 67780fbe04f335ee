//! Last-known-value cache with change detection.
//!
//! The cache holds the most recent decoded value per (device, status)
//! pair and is the bridge's only mutable state. Decode results land
//! here, the change notifier reads the previous value from the applied
//! result, and command defaults (`initFrom`) and QUERY reports are
//! answered from it.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use nodelink_core::{DeviceId, Value};

/// Result of applying one status update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Applied {
    /// Whether the stored value changed. The first write for a key
    /// always counts as a change.
    pub changed: bool,
    /// Value stored before this update, if any.
    pub previous: Option<Value>,
    /// Timestamp recorded for this update.
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    value: Value,
    updated_at: i64,
}

/// Concurrent cache of the last reported value per (device, status).
///
/// Values are compared exactly, with no rounding: the decoder
/// normalizes whole numbers to the integer variant, so equal readings
/// always land in the same variant and compare equal.
pub struct StateCache {
    entries: DashMap<(DeviceId, String), CacheEntry>,
}

impl StateCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Store a value and report whether it differs from the cached one.
    ///
    /// The entry's timestamp is refreshed even when the value is
    /// unchanged, so staleness checks see the latest report.
    pub fn apply(&self, device: &DeviceId, status: &str, value: Value) -> Applied {
        let timestamp = Utc::now().timestamp();
        let entry = CacheEntry {
            value,
            updated_at: timestamp,
        };
        match self.entries.entry((device.clone(), status.to_string())) {
            Entry::Occupied(mut occupied) => {
                let previous = occupied.get().value;
                occupied.insert(entry);
                Applied {
                    changed: previous != value,
                    previous: Some(previous),
                    timestamp,
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
                Applied {
                    changed: true,
                    previous: None,
                    timestamp,
                }
            }
        }
    }

    /// Last stored value for a status, if any.
    pub fn read(&self, device: &DeviceId, status: &str) -> Option<Value> {
        self.entries
            .get(&(device.clone(), status.to_string()))
            .map(|entry| entry.value)
    }

    /// Timestamp of the last update for a status, if any.
    pub fn updated_at(&self, device: &DeviceId, status: &str) -> Option<i64> {
        self.entries
            .get(&(device.clone(), status.to_string()))
            .map(|entry| entry.updated_at)
    }

    /// All cached values for one device, in no particular order.
    pub fn snapshot(&self, device: &DeviceId) -> Vec<(String, Value)> {
        self.entries
            .iter()
            .filter(|entry| entry.key().0 == *device)
            .map(|entry| (entry.key().1.clone(), entry.value().value))
            .collect()
    }

    /// Drop every entry whose device the predicate rejects. Used after
    /// a table reload to forget devices that disappeared.
    pub fn retain_devices<F>(&self, keep: F)
    where
        F: Fn(&DeviceId) -> bool,
    {
        self.entries.retain(|(device, _), _| keep(device));
    }

    /// Drop all entries for one device.
    pub fn clear_device(&self, device: &DeviceId) {
        self.entries.retain(|(d, _), _| d != device);
    }

    /// Number of cached (device, status) entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for StateCache {
    fn default() -> Self {
        Self::new()
    }
}
