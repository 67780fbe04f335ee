//! Device table: declarations resolved against the type catalogue.
//!
//! Built once at startup and rebuilt on DISCOVER. Every declared topic
//! is expanded per the type's topic plan and bound to exactly one
//! decode slot; any ambiguity or inconsistency is a [`LoadError`] and
//! the whole table is rejected. A table that loaded is a table whose
//! every topic routes unambiguously.

use std::collections::HashMap;

use nodelink_core::DeviceId;

use crate::config::{BrokerSettings, DeviceDeclaration};
use crate::error::LoadError;
use crate::schema::{catalogue, TopicPlan, TypeSchema};

/// One configured device bound to its schema and resolved topics.
#[derive(Debug)]
pub struct DeviceDescriptor {
    id: DeviceId,
    name: String,
    schema: &'static TypeSchema,
    status_topics: Vec<String>,
    cmd_topic: Option<String>,
    sensor_id: Option<String>,
}

impl DeviceDescriptor {
    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    /// Friendly name from the declaration, falling back to the raw id.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &'static TypeSchema {
        self.schema
    }

    /// All resolved inbound topics, in slot binding order.
    pub fn status_topics(&self) -> &[String] {
        &self.status_topics
    }

    pub fn cmd_topic(&self) -> Option<&str> {
        self.cmd_topic.as_deref()
    }

    /// Sensor block key for multi-sensor payloads.
    pub fn sensor_id(&self) -> Option<&str> {
        self.sensor_id.as_deref()
    }
}

/// The loaded device table: descriptors plus the topic route map.
#[derive(Debug)]
pub struct DeviceTable {
    devices: Vec<DeviceDescriptor>,
    index: HashMap<DeviceId, usize>,
    routes: HashMap<String, (usize, usize)>,
    controller_id: DeviceId,
}

impl DeviceTable {
    /// Resolve a device list into a routable table.
    ///
    /// Fatal on any inconsistency: unknown types, unusable or duplicate
    /// ids, topic counts that do not fit the type's plan, `~` topics
    /// without a configured prefix, and topics that collide across (or
    /// within) devices.
    pub fn build(
        settings: &BrokerSettings,
        declarations: &[DeviceDeclaration],
    ) -> Result<Self, LoadError> {
        // The catalogue is compiled in, but a broken table should fail
        // loudly here rather than misroute later.
        for schema in catalogue::ALL {
            schema.verify()?;
        }

        let controller_id =
            DeviceId::parse(catalogue::CONTROLLER_TYPE).map_err(|source| LoadError::InvalidId {
                raw: catalogue::CONTROLLER_TYPE.to_string(),
                source,
            })?;

        let mut table = Self {
            devices: Vec::with_capacity(declarations.len()),
            index: HashMap::new(),
            routes: HashMap::new(),
            controller_id,
        };

        for decl in declarations {
            table.add(settings, decl)?;
        }

        // Command topics live in their own namespace: a command topic
        // may legitimately equal a status topic (ratgdo's motion clear
        // writes to the topic the device reports on), but two devices
        // must not share one.
        let mut cmd_topics: HashMap<&str, &DeviceId> = HashMap::new();
        for device in &table.devices {
            if let Some(cmd) = device.cmd_topic() {
                if let Some(existing) = cmd_topics.get(cmd) {
                    return Err(LoadError::DuplicateCommandTopic {
                        topic: cmd.to_string(),
                        existing: (*existing).clone(),
                    });
                }
                cmd_topics.insert(cmd, &device.id);
            }
        }

        tracing::info!(
            devices = table.devices.len(),
            topics = table.routes.len(),
            "device table loaded"
        );
        Ok(table)
    }

    fn add(&mut self, settings: &BrokerSettings, decl: &DeviceDeclaration) -> Result<(), LoadError> {
        let schema = catalogue::find(&decl.type_name).ok_or_else(|| LoadError::UnknownType {
            device: decl.id.clone(),
            type_name: decl.type_name.clone(),
        })?;
        if schema.type_name == catalogue::CONTROLLER_TYPE {
            return Err(LoadError::ReservedId {
                id: decl.id.clone(),
            });
        }

        let id = DeviceId::sanitize(&decl.id).map_err(|source| LoadError::InvalidId {
            raw: decl.id.clone(),
            source,
        })?;
        if id == self.controller_id {
            return Err(LoadError::ReservedId { id: id.to_string() });
        }
        if self.index.contains_key(&id) {
            return Err(LoadError::DuplicateDevice { id });
        }

        let declared = decl.status_topic.as_slice();
        match schema.declared_topic_count() {
            Some(expected) if declared.len() != expected => {
                return Err(LoadError::TopicCount {
                    device: id,
                    type_name: schema.type_name,
                    expected: "1",
                    got: declared.len(),
                });
            }
            None if declared.is_empty() => {
                return Err(LoadError::TopicCount {
                    device: id,
                    type_name: schema.type_name,
                    expected: "at least 1",
                    got: 0,
                });
            }
            _ => {}
        }

        let bindings = expand_topics(settings, schema, &id, &decl.id, declared)?;

        let cmd_topic = match &decl.cmd_topic {
            Some(raw) => Some(substitute_prefix(
                raw,
                settings.cmd_prefix.as_deref(),
                "cmd_prefix",
                &decl.id,
            )?),
            None => None,
        };
        if schema.publishes_commands() && cmd_topic.is_none() {
            return Err(LoadError::MissingCommandTopic {
                device: id,
                type_name: schema.type_name,
            });
        }

        let device = self.devices.len();
        self.devices.push(DeviceDescriptor {
            id: id.clone(),
            name: decl.display_name().to_string(),
            schema,
            status_topics: bindings.iter().map(|(topic, _)| topic.clone()).collect(),
            cmd_topic,
            sensor_id: decl.sensor_id.clone(),
        });
        self.index.insert(id.clone(), device);

        for (topic, slot) in bindings {
            if let Some((existing, _)) = self.routes.get(&topic) {
                return Err(LoadError::DuplicateStatusTopic {
                    topic,
                    existing: self.devices[*existing].id.clone(),
                });
            }
            tracing::debug!(device = %id, topic = %topic, slot, "bound status topic");
            self.routes.insert(topic, (device, slot));
        }
        Ok(())
    }

    /// Find the device and decode slot an inbound topic belongs to.
    pub fn route(&self, topic: &str) -> Option<(&DeviceDescriptor, usize)> {
        let (device, slot) = self.routes.get(topic)?;
        Some((&self.devices[*device], *slot))
    }

    pub fn device(&self, id: &DeviceId) -> Option<&DeviceDescriptor> {
        self.index.get(id).map(|i| &self.devices[*i])
    }

    /// Devices in declaration order.
    pub fn devices(&self) -> impl Iterator<Item = &DeviceDescriptor> {
        self.devices.iter()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// The reserved id of the controller pseudo-device.
    pub fn controller_id(&self) -> &DeviceId {
        &self.controller_id
    }

    /// Every inbound topic the bridge should subscribe to.
    pub fn subscriptions(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}

/// Expand a declaration's topics into (topic, slot) bindings per the
/// type's topic plan.
fn expand_topics(
    settings: &BrokerSettings,
    schema: &'static TypeSchema,
    id: &DeviceId,
    raw_id: &str,
    declared: &[String],
) -> Result<Vec<(String, usize)>, LoadError> {
    let prefix = settings.status_prefix.as_deref();
    let mut bindings = Vec::new();

    match schema.topics {
        TopicPlan::Single => {
            let topic = substitute_prefix(&declared[0], prefix, "status_prefix", raw_id)?;
            bindings.push((topic, 0));
        }
        TopicPlan::Derived(derivations) => {
            let base = substitute_prefix(&declared[0], prefix, "status_prefix", raw_id)?;
            bindings.push((base.clone(), 0));
            for (i, derivation) in derivations.iter().enumerate() {
                let mut derived = match base.rsplit_once('/') {
                    Some((head, _)) => format!("{head}/{}", derivation.replace_tail),
                    None => derivation.replace_tail.to_string(),
                };
                if let Some((from, to)) = derivation.swap_prefix {
                    if let Some(rest) = derived.strip_prefix(from) {
                        derived = format!("{to}{rest}");
                    }
                }
                bindings.push((derived, i + 1));
            }
        }
        TopicPlan::BySuffix => {
            for raw in declared {
                let topic = substitute_prefix(raw, prefix, "status_prefix", raw_id)?;
                let tail = topic.rsplit_once('/').map_or(topic.as_str(), |(_, t)| t);
                let slot = schema
                    .slots
                    .iter()
                    .position(|s| s.suffix == Some(tail))
                    .ok_or_else(|| LoadError::UnmatchedTopic {
                        device: id.clone(),
                        topic: topic.clone(),
                    })?;
                if bindings.iter().any(|(_, bound)| *bound == slot) {
                    return Err(LoadError::DuplicateSuffix {
                        device: id.clone(),
                        suffix: schema.slots[slot].suffix.unwrap_or_default(),
                    });
                }
                bindings.push((topic, slot));
            }
        }
        TopicPlan::Fanout { infix } => {
            let base = substitute_prefix(&declared[0], prefix, "status_prefix", raw_id)?;
            for (slot, slot_schema) in schema.slots.iter().enumerate() {
                let suffix = slot_schema.suffix.unwrap_or_default();
                let topic = match infix {
                    Some(infix) => format!("{base}/{infix}/{suffix}"),
                    None => format!("{base}/{suffix}"),
                };
                bindings.push((topic, slot));
            }
        }
    }
    Ok(bindings)
}

/// Replace a leading `~` with the configured prefix. A `~` topic with
/// no prefix configured is fatal.
fn substitute_prefix(
    topic: &str,
    prefix: Option<&str>,
    which: &'static str,
    device: &str,
) -> Result<String, LoadError> {
    match topic.strip_prefix('~') {
        Some(rest) => match prefix {
            Some(p) => Ok(format!("{p}{rest}")),
            None => Err(LoadError::MissingPrefix {
                device: device.to_string(),
                topic: topic.to_string(),
                which,
            }),
        },
        None => Ok(topic.to_string()),
    }
}
