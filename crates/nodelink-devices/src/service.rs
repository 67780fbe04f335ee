//! Bridge service tying the pipeline together.
//!
//! Inbound MQTT messages run route -> decode -> cache, and every
//! accepted change leaves as exactly one [`BridgeEvent::StatusChanged`]
//! on the bus. Controller commands run the other direction through the
//! encoder and an [`MqttPublisher`]. The service also owns the
//! controller pseudo-device: lifecycle statuses, the heartbeat, and the
//! QUERY/DISCOVER commands addressed to the bridge itself.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};

use nodelink_core::{BridgeEvent, DeviceId, SharedEventBus, StatusValue, Value};

use crate::cache::{Applied, StateCache};
use crate::config::BridgeConfig;
use crate::decode::decode;
use crate::encode::encode;
use crate::error::{CommandError, LoadError};
use crate::registry::DeviceTable;
use crate::schema::{catalogue, AnnounceFire, AnnounceRule, TypeSchema};

/// Outbound MQTT seam. The broker client implements this; tests use
/// [`ChannelPublisher`].
#[async_trait]
pub trait MqttPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str);
}

/// Publisher that hands publishes to an in-process channel.
pub struct ChannelPublisher {
    tx: mpsc::UnboundedSender<(String, String)>,
}

impl ChannelPublisher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, String)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl MqttPublisher for ChannelPublisher {
    async fn publish(&self, topic: &str, payload: &str) {
        let _ = self.tx.send((topic.to_string(), payload.to_string()));
    }
}

/// Heartbeat configuration for the controller pseudo-device.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Heartbeat interval in seconds (default: 30)
    pub heartbeat_interval: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: 30,
        }
    }
}

impl HeartbeatConfig {
    pub fn new(interval_secs: u64) -> Self {
        Self {
            heartbeat_interval: interval_secs,
        }
    }

    /// Get the interval as Duration
    pub fn interval_duration(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval)
    }
}

/// The translation core behind one broker connection.
pub struct BridgeService {
    table: RwLock<DeviceTable>,
    cache: Arc<StateCache>,
    bus: SharedEventBus,
    publisher: Arc<dyn MqttPublisher>,
    /// Last loaded configuration, re-read by DISCOVER.
    config: RwLock<BridgeConfig>,
    controller_id: DeviceId,
    heartbeat_config: HeartbeatConfig,
    /// Handle of the spawned heartbeat task, aborted on stop.
    heartbeat_task: RwLock<Option<JoinHandle<()>>>,
}

// Manual impl: `publisher` is an `Arc<dyn MqttPublisher>`, which has no
// `Debug`, so the derive is unavailable.
impl std::fmt::Debug for BridgeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeService")
            .field("controller_id", &self.controller_id)
            .field("heartbeat_config", &self.heartbeat_config)
            .finish_non_exhaustive()
    }
}

impl BridgeService {
    /// Build a service from a configuration. Fails fast on any invalid
    /// declaration.
    pub fn new(
        config: BridgeConfig,
        bus: SharedEventBus,
        publisher: Arc<dyn MqttPublisher>,
    ) -> Result<Self, LoadError> {
        Self::with_heartbeat(config, bus, publisher, HeartbeatConfig::default())
    }

    /// Build a service with a custom heartbeat configuration.
    pub fn with_heartbeat(
        config: BridgeConfig,
        bus: SharedEventBus,
        publisher: Arc<dyn MqttPublisher>,
        heartbeat_config: HeartbeatConfig,
    ) -> Result<Self, LoadError> {
        let table = DeviceTable::build(&config.general, &config.devices)?;
        let controller_id = table.controller_id().clone();
        Ok(Self {
            table: RwLock::new(table),
            cache: Arc::new(StateCache::new()),
            bus,
            publisher,
            config: RwLock::new(config),
            controller_id,
            heartbeat_config,
            heartbeat_task: RwLock::new(None),
        })
    }

    /// Shared handle to the state cache.
    pub fn cache(&self) -> Arc<StateCache> {
        self.cache.clone()
    }

    /// Id of the controller pseudo-device.
    pub fn controller_id(&self) -> &DeviceId {
        &self.controller_id
    }

    /// Get current heartbeat configuration.
    pub fn heartbeat_config(&self) -> &HeartbeatConfig {
        &self.heartbeat_config
    }

    /// Status topics the broker client must subscribe to.
    pub async fn subscriptions(&self) -> Vec<String> {
        self.table
            .read()
            .await
            .subscriptions()
            .map(str::to_string)
            .collect()
    }

    pub async fn device_count(&self) -> usize {
        self.table.read().await.device_count()
    }

    /// Announce the bridge as online and start the heartbeat.
    pub async fn start(&self) {
        let count = self.device_count().await;
        self.set_controller_status("ST", Value::Int(1)).await;
        self.set_controller_status("GV0", Value::Int(count as i64))
            .await;
        self.start_heartbeat().await;
        tracing::info!(devices = count, "bridge service started");
    }

    /// Stop the heartbeat and report the bridge offline.
    pub async fn stop(&self) {
        if let Some(task) = self.heartbeat_task.write().await.take() {
            task.abort();
        }
        self.set_controller_status("ST", Value::Int(0)).await;
        tracing::info!("bridge service stopped");
    }

    /// Handle one inbound MQTT message.
    ///
    /// Unroutable topics and undecodable payloads are dropped whole;
    /// neither tears the service down.
    pub async fn handle_message(&self, topic: &str, payload: &[u8]) {
        let table = self.table.read().await;
        let Some((descriptor, slot)) = table.route(topic) else {
            tracing::debug!(topic, "message on unmapped topic dropped");
            return;
        };

        let updates = match decode(descriptor.schema(), slot, descriptor.sensor_id(), payload) {
            Ok(updates) => updates,
            Err(error) => {
                tracing::warn!(device = %descriptor.id(), topic, %error, "payload dropped");
                return;
            }
        };

        for (status, value) in updates {
            let applied = self.cache.apply(descriptor.id(), status, value);
            if applied.changed {
                let uom = descriptor
                    .schema()
                    .status(status)
                    .map(|def| def.kind.uom())
                    .unwrap_or(56);
                self.bus
                    .publish_with_source(
                        BridgeEvent::StatusChanged {
                            device_id: descriptor.id().clone(),
                            status: status.to_string(),
                            value,
                            uom,
                            timestamp: applied.timestamp,
                        },
                        "decoder",
                    )
                    .await;
            }
            if let Some(rule) = descriptor.schema().announce {
                if rule.status == status {
                    self.announce(descriptor.id(), &rule, value, &applied).await;
                }
            }
        }
    }

    /// DON/DOF announcement driven by one status update. Runs on every
    /// update of the tracked status, changed or not; the rule decides
    /// whether it fires.
    async fn announce(&self, device: &DeviceId, rule: &AnnounceRule, value: Value, applied: &Applied) {
        let fire = match rule.fire {
            AnnounceFire::EveryUpdate => true,
            AnnounceFire::OnChange => {
                let was_on = applied.previous.map(|v| rule.is_on(v)).unwrap_or(false);
                was_on != rule.is_on(value)
            }
        };
        if !fire {
            return;
        }
        self.bus
            .publish_with_source(
                BridgeEvent::CommandSent {
                    device_id: device.clone(),
                    command: rule.command_for(value).to_string(),
                    value: None,
                    timestamp: applied.timestamp,
                },
                "notifier",
            )
            .await;
    }

    /// Execute a controller command against one device (or the
    /// controller itself).
    pub async fn send_command(
        &self,
        device: &str,
        command: &str,
        params: &HashMap<String, Value>,
    ) -> Result<(), CommandError> {
        if device == self.controller_id.as_str() {
            return self.controller_command(command).await;
        }

        let id = DeviceId::parse(device).map_err(|_| CommandError::UnknownDevice {
            device: device.to_string(),
        })?;
        let table = self.table.read().await;
        let descriptor = table.device(&id).ok_or_else(|| CommandError::UnknownDevice {
            device: device.to_string(),
        })?;
        let schema = descriptor.schema();
        let outcome = encode(descriptor, command, params, &self.cache)?;
        // A slow broker publish must not hold the table against a
        // queued reload and stall inbound routing behind it.
        drop(table);

        if let Some((topic, payload)) = &outcome.publish {
            tracing::debug!(device = %id, command, topic = %topic, "publishing command");
            self.publisher.publish(topic, payload).await;
        }

        // QUERY answers from the cache immediately; any publish above
        // refreshes it through the normal inbound path.
        if command == "QUERY" {
            self.report_statuses(&id, schema).await;
        }
        if let Some(report) = outcome.report {
            self.bus
                .publish_with_source(
                    BridgeEvent::CommandSent {
                        device_id: id.clone(),
                        command: report.to_string(),
                        value: None,
                        timestamp: Utc::now().timestamp(),
                    },
                    "notifier",
                )
                .await;
        }
        Ok(())
    }

    /// Commands addressed to the bridge itself.
    async fn controller_command(&self, command: &str) -> Result<(), CommandError> {
        match command {
            "QUERY" => {
                let table = self.table.read().await;
                for descriptor in table.devices() {
                    self.report_statuses(descriptor.id(), descriptor.schema())
                        .await;
                }
                drop(table);
                self.report_statuses(&self.controller_id, &catalogue::CONTROLLER)
                    .await;
                Ok(())
            }
            "DISCOVER" => {
                let config = self.config.read().await.clone();
                if let Err(error) = self.reload(config).await {
                    tracing::error!(%error, "device table reload failed, keeping previous table");
                    self.set_controller_status("ST", Value::Int(2)).await;
                }
                Ok(())
            }
            other => Err(CommandError::UnsupportedCommand {
                type_name: catalogue::CONTROLLER_TYPE,
                command: other.to_string(),
            }),
        }
    }

    /// Swap in a new configuration. The old table stays live if the new
    /// one fails to load. Cache entries for devices that vanished are
    /// dropped so a later re-declare starts clean.
    pub async fn reload(&self, config: BridgeConfig) -> Result<(), LoadError> {
        let new_table = DeviceTable::build(&config.general, &config.devices)?;
        let count = new_table.device_count();
        *self.table.write().await = new_table;
        *self.config.write().await = config;
        {
            let table = self.table.read().await;
            self.cache
                .retain_devices(|id| id == &self.controller_id || table.device(id).is_some());
        }
        self.set_controller_status("GV0", Value::Int(count as i64))
            .await;
        tracing::info!(devices = count, "device table reloaded");
        Ok(())
    }

    /// Report every cached status of one device as a StatusReport.
    async fn report_statuses(&self, device: &DeviceId, schema: &TypeSchema) {
        let values: Vec<StatusValue> = schema
            .statuses
            .iter()
            .filter_map(|def| {
                self.cache
                    .read(device, def.id)
                    .map(|value| StatusValue::new(def.id, value, def.kind.uom()))
            })
            .collect();
        self.bus
            .publish_with_source(
                BridgeEvent::StatusReport {
                    device_id: device.clone(),
                    values,
                    timestamp: Utc::now().timestamp(),
                },
                "query",
            )
            .await;
    }

    /// Write a controller status and emit the change event if the value
    /// moved.
    async fn set_controller_status(&self, status: &'static str, value: Value) {
        let applied = self.cache.apply(&self.controller_id, status, value);
        if applied.changed {
            let uom = catalogue::CONTROLLER
                .status(status)
                .map(|def| def.kind.uom())
                .unwrap_or(56);
            self.bus
                .publish_with_source(
                    BridgeEvent::StatusChanged {
                        device_id: self.controller_id.clone(),
                        status: status.to_string(),
                        value,
                        uom,
                        timestamp: applied.timestamp,
                    },
                    "controller",
                )
                .await;
        }
    }

    /// Spawn the heartbeat task: alternating DON/DOF from the
    /// controller, first beat immediately. The stored handle is the
    /// task's only off switch, so a leftover emitter from an earlier
    /// start is aborted before the replacement takes over.
    async fn start_heartbeat(&self) {
        let bus = self.bus.clone();
        let controller_id = self.controller_id.clone();
        let heartbeat_config = self.heartbeat_config.clone();

        let task = tokio::spawn(async move {
            let mut timer = interval(heartbeat_config.interval_duration());
            let mut on = true;
            loop {
                timer.tick().await;
                let command = if on { "DON" } else { "DOF" };
                on = !on;
                bus.publish_with_source(
                    BridgeEvent::CommandSent {
                        device_id: controller_id.clone(),
                        command: command.to_string(),
                        value: None,
                        timestamp: Utc::now().timestamp(),
                    },
                    "heartbeat",
                )
                .await;
            }
        });

        if let Some(old) = self.heartbeat_task.write().await.replace(task) {
            old.abort();
        }
    }
}
