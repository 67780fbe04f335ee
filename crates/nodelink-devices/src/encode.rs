//! Outbound command encoding.
//!
//! Turns a controller command addressed at one device into the MQTT
//! publish its firmware expects, seeding absent parameters from the
//! cached state where the schema says so. Supplied values are
//! validated and rejected, never clamped.

use std::collections::HashMap;

use nodelink_core::Value;
use serde_json::{Map, Value as Json};

use crate::cache::StateCache;
use crate::error::CommandError;
use crate::registry::DeviceDescriptor;
use crate::schema::{CommandDef, CommandTarget, FieldSource, PayloadPlan};

/// What a command resolves to: at most one MQTT publish, plus an
/// optional command id to report back to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// `(topic, payload)` to publish, absent for cache-only commands.
    pub publish: Option<(String, String)>,
    /// Command announced to the controller after the publish.
    pub report: Option<&'static str>,
}

/// Encode `command_id` for one device.
pub fn encode(
    descriptor: &DeviceDescriptor,
    command_id: &str,
    supplied: &HashMap<String, Value>,
    cache: &StateCache,
) -> Result<CommandOutcome, CommandError> {
    let schema = descriptor.schema();
    let command = schema
        .command(command_id)
        .ok_or_else(|| CommandError::UnsupportedCommand {
            type_name: schema.type_name,
            command: command_id.to_string(),
        })?;

    let params = resolve_params(descriptor, command, supplied, cache)?;
    let publish = match resolve_target(descriptor, command.target)? {
        Some(topic) => Some((topic, render_payload(descriptor, command, &params, cache)?)),
        None => None,
    };

    Ok(CommandOutcome {
        publish,
        report: command.report,
    })
}

/// Resolve declared parameters: supplied values are validated against
/// the declared kind; absent ones fall back to the `init_from` status
/// cache, already validated when it was decoded.
fn resolve_params(
    descriptor: &DeviceDescriptor,
    command: &CommandDef,
    supplied: &HashMap<String, Value>,
    cache: &StateCache,
) -> Result<HashMap<&'static str, Value>, CommandError> {
    let mut params = HashMap::new();
    for param in command.params {
        if let Some(value) = supplied.get(param.id) {
            let value = param
                .kind
                .validate(*value)
                .map_err(|source| CommandError::InvalidParam {
                    command: command.id,
                    param: param.id,
                    source,
                })?;
            params.insert(param.id, value);
            continue;
        }
        if let Some(status) = param.init_from {
            if let Some(value) = cache.read(descriptor.id(), status) {
                params.insert(param.id, value);
                continue;
            }
        }
        if !param.optional {
            return Err(CommandError::MissingParam {
                command: command.id,
                param: param.id,
            });
        }
    }
    Ok(params)
}

fn resolve_target(
    descriptor: &DeviceDescriptor,
    target: CommandTarget,
) -> Result<Option<String>, CommandError> {
    let base = |descriptor: &DeviceDescriptor| {
        descriptor
            .cmd_topic()
            .map(str::to_string)
            .ok_or_else(|| CommandError::NoCommandTopic {
                device: descriptor.id().clone(),
            })
    };

    let topic = match target {
        CommandTarget::None => return Ok(None),
        CommandTarget::CommandTopic => base(descriptor)?,
        CommandTarget::ReplaceTail(tail) => match base(descriptor)?.rsplit_once('/') {
            Some((head, _)) => format!("{head}/{tail}"),
            None => tail.to_string(),
        },
        CommandTarget::Suffixed(suffix) => format!("{}/{suffix}", base(descriptor)?),
    };
    Ok(Some(topic))
}

fn render_payload(
    descriptor: &DeviceDescriptor,
    command: &CommandDef,
    params: &HashMap<&'static str, Value>,
    cache: &StateCache,
) -> Result<String, CommandError> {
    match command.payload {
        PayloadPlan::Fixed(text) => Ok(text.to_string()),
        PayloadPlan::Scalar { param, fallback } => match params.get(param) {
            Some(value) => Ok(value.to_string()),
            None => fallback
                .map(str::to_string)
                .ok_or(CommandError::MissingParam {
                    command: command.id,
                    param,
                }),
        },
        PayloadPlan::Step {
            status,
            delta,
            min,
            max,
        } => {
            let current = cache
                .read(descriptor.id(), status)
                .map(|v| v.as_f64().round() as i64)
                .unwrap_or(0);
            Ok((current + delta).clamp(min, max).to_string())
        }
        PayloadPlan::Template(fields) => {
            let mut root = Map::new();
            for spec in fields {
                let value = match spec.source {
                    FieldSource::Const(text) => Some(Json::String(text.to_string())),
                    FieldSource::Param(id) => params.get(id).map(json_value),
                };
                if let Some(value) = value {
                    insert_at(&mut root, spec.path, value);
                }
            }
            Ok(Json::Object(root).to_string())
        }
    }
}

/// Insert a value at a nested key path, creating intermediate objects.
/// Containers only come into being on the way to an actual value, so
/// unresolved fields leave no empty objects behind.
fn insert_at(node: &mut Map<String, Json>, path: &[&str], value: Json) {
    match path.split_first() {
        None => {}
        Some((key, [])) => {
            node.insert((*key).to_string(), value);
        }
        Some((key, rest)) => {
            let child = node
                .entry((*key).to_string())
                .or_insert_with(|| Json::Object(Map::new()));
            if let Json::Object(map) = child {
                insert_at(map, rest, value);
            }
        }
    }
}

fn json_value(value: &Value) -> Json {
    match value {
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::Number((*i).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(Json::Number)
            .unwrap_or(Json::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BrokerSettings, DeviceDeclaration, StatusTopics};
    use crate::registry::DeviceTable;

    fn decl(id: &str, type_name: &str, status: StatusTopics, cmd: Option<&str>) -> DeviceDeclaration {
        DeviceDeclaration {
            id: id.to_string(),
            type_name: type_name.to_string(),
            status_topic: status,
            cmd_topic: cmd.map(str::to_string),
            sensor_id: None,
            name: None,
        }
    }

    fn table() -> DeviceTable {
        DeviceTable::build(
            &BrokerSettings::default(),
            &[
                decl(
                    "lamp",
                    "dimmer",
                    "stat/lamp/STATE".into(),
                    Some("cmnd/lamp/Dimmer"),
                ),
                decl(
                    "porch",
                    "switch",
                    "stat/porch/POWER".into(),
                    Some("cmnd/porch/POWER"),
                ),
                decl("fan", "ifan", "stat/fan/RESULT".into(), Some("cmnd/fan/FanSpeed")),
                decl("den", "sensor", "sensors/den".into(), Some("sensors/den/set")),
                decl("strip", "RGBW", "rgbw/strip".into(), Some("rgbw/strip/set")),
                decl("garage", "ratgdo", "ratgdo-7c2c".into(), Some("ratgdo-7c2c")),
                decl("alarm", "flag", "flags/alarm".into(), Some("flags/alarm/cmd")),
                decl("meter", "droplet", "droplet-a4f2".into(), None),
            ],
        )
        .unwrap()
    }

    fn run(
        table: &DeviceTable,
        cache: &StateCache,
        id: &str,
        command: &str,
        supplied: &[(&str, Value)],
    ) -> Result<CommandOutcome, CommandError> {
        let device_id = nodelink_core::DeviceId::parse(id).unwrap();
        let descriptor = table.device(&device_id).unwrap();
        let supplied: HashMap<String, Value> = supplied
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        encode(descriptor, command, &supplied, cache)
    }

    fn publish(outcome: CommandOutcome) -> (String, String) {
        outcome.publish.unwrap()
    }

    fn lamp_id() -> nodelink_core::DeviceId {
        nodelink_core::DeviceId::parse("lamp").unwrap()
    }

    #[test]
    fn test_fixed_payload() {
        let table = table();
        let cache = StateCache::new();
        let (topic, payload) = publish(run(&table, &cache, "porch", "DON", &[]).unwrap());
        assert_eq!(topic, "cmnd/porch/POWER");
        assert_eq!(payload, "ON");
    }

    #[test]
    fn test_dimmer_on_restores_cached_level() {
        let table = table();
        let cache = StateCache::new();
        cache.apply(&lamp_id(), "ST", Value::Int(45));

        let (topic, payload) = publish(run(&table, &cache, "lamp", "DON", &[]).unwrap());
        assert_eq!(topic, "cmnd/lamp/Dimmer");
        assert_eq!(payload, "45");
    }

    #[test]
    fn test_dimmer_on_falls_back_to_full() {
        let table = table();
        let cache = StateCache::new();
        assert_eq!(
            publish(run(&table, &cache, "lamp", "DON", &[]).unwrap()).1,
            "100"
        );
    }

    #[test]
    fn test_dimmer_on_explicit_level() {
        let table = table();
        let cache = StateCache::new();
        // Cache must lose to an explicit value, including zero.
        cache.apply(&lamp_id(), "ST", Value::Int(45));
        assert_eq!(
            publish(run(&table, &cache, "lamp", "DON", &[("value", Value::Int(0))]).unwrap()).1,
            "0"
        );
        assert_eq!(
            publish(
                run(&table, &cache, "lamp", "DON", &[("value", Value::Float(37.5))]).unwrap()
            )
            .1,
            "37.5"
        );
    }

    #[test]
    fn test_supplied_values_rejected_not_clamped() {
        let table = table();
        let cache = StateCache::new();
        let err = run(&table, &cache, "lamp", "DON", &[("value", Value::Int(150))]).unwrap_err();
        assert!(matches!(
            err,
            CommandError::InvalidParam {
                command: "DON",
                param: "value",
                ..
            }
        ));
    }

    #[test]
    fn test_step_clamps_at_bounds() {
        let table = table();
        let cache = StateCache::new();
        cache.apply(&lamp_id(), "ST", Value::Int(95));
        assert_eq!(publish(run(&table, &cache, "lamp", "BRT", &[]).unwrap()).1, "100");

        cache.apply(&lamp_id(), "ST", Value::Int(5));
        assert_eq!(publish(run(&table, &cache, "lamp", "DIM", &[]).unwrap()).1, "0");
    }

    #[test]
    fn test_step_from_empty_cache_starts_at_zero() {
        let table = table();
        let cache = StateCache::new();
        assert_eq!(publish(run(&table, &cache, "lamp", "BRT", &[]).unwrap()).1, "10");
    }

    #[test]
    fn test_query_replaces_topic_tail() {
        let table = table();
        let cache = StateCache::new();
        let (topic, payload) = publish(run(&table, &cache, "lamp", "QUERY", &[]).unwrap());
        assert_eq!(topic, "cmnd/lamp/State");
        assert_eq!(payload, "");
    }

    #[test]
    fn test_fan_speed_default_and_explicit() {
        let table = table();
        let cache = StateCache::new();
        assert_eq!(publish(run(&table, &cache, "fan", "DON", &[]).unwrap()).1, "3");
        assert_eq!(
            publish(run(&table, &cache, "fan", "DON", &[("value", Value::Int(2))]).unwrap()).1,
            "2"
        );
        assert!(matches!(
            run(&table, &cache, "fan", "DON", &[("value", Value::Int(7))]),
            Err(CommandError::InvalidParam { .. })
        ));
    }

    #[test]
    fn test_template_keeps_only_resolved_fields() {
        let table = table();
        let cache = StateCache::new();
        let (topic, payload) = publish(run(&table, &cache, "den", "SETLED", &[]).unwrap());
        assert_eq!(topic, "sensors/den/set");
        assert_eq!(
            serde_json::from_str::<Json>(&payload).unwrap(),
            serde_json::json!({"state": "ON"})
        );
    }

    #[test]
    fn test_template_full_nesting() {
        let table = table();
        let cache = StateCache::new();
        let outcome = run(
            &table,
            &cache,
            "den",
            "SETLED",
            &[
                ("I", Value::Int(128)),
                ("R", Value::Int(255)),
                ("G", Value::Int(100)),
                ("B", Value::Int(0)),
                ("D", Value::Int(2)),
            ],
        )
        .unwrap();
        assert_eq!(
            serde_json::from_str::<Json>(&publish(outcome).1).unwrap(),
            serde_json::json!({
                "state": "ON",
                "brightness": 128,
                "color": {"r": 255, "g": 100, "b": 0},
                "transition": 2,
            })
        );
    }

    #[test]
    fn test_template_partial_color() {
        let table = table();
        let cache = StateCache::new();
        let outcome = run(
            &table,
            &cache,
            "strip",
            "SETRGBW",
            &[("STRIPR", Value::Int(255)), ("STRIPW", Value::Int(10))],
        )
        .unwrap();
        assert_eq!(
            serde_json::from_str::<Json>(&publish(outcome).1).unwrap(),
            serde_json::json!({"state": "ON", "c": {"r": 255, "w": 10}})
        );
    }

    #[test]
    fn test_suffixed_targets() {
        let table = table();
        let cache = StateCache::new();
        let (topic, payload) = publish(run(&table, &cache, "garage", "OPEN", &[]).unwrap());
        assert_eq!(topic, "ratgdo-7c2c/command/door");
        assert_eq!(payload, "open");

        // Motion clears by writing to the device's own status topic.
        let (topic, payload) = publish(run(&table, &cache, "garage", "MCLEAR", &[]).unwrap());
        assert_eq!(topic, "ratgdo-7c2c/status/motion");
        assert_eq!(payload, "Clear");
    }

    #[test]
    fn test_report_only_command() {
        let table = table();
        let cache = StateCache::new();
        let outcome = run(&table, &cache, "alarm", "RESET", &[]).unwrap();
        assert_eq!(
            outcome.publish,
            Some(("flags/alarm/cmd".to_string(), "RESET".to_string()))
        );
        assert_eq!(outcome.report, Some("DOF"));
    }

    #[test]
    fn test_cache_only_query_publishes_nothing() {
        let table = table();
        let cache = StateCache::new();
        let outcome = run(&table, &cache, "meter", "QUERY", &[]).unwrap();
        assert_eq!(outcome, CommandOutcome { publish: None, report: None });
    }

    #[test]
    fn test_unsupported_command() {
        let table = table();
        let cache = StateCache::new();
        assert!(matches!(
            run(&table, &cache, "meter", "DON", &[]),
            Err(CommandError::UnsupportedCommand {
                type_name: "droplet",
                ..
            })
        ));
    }
}
