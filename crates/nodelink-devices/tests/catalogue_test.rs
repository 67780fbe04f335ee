//! Table-driven checks across the whole type catalogue.
//!
//! Slot/topic binding and command encoding are exercised for every
//! declared type, since those are the two places a schema and its
//! runtime behavior can drift apart.

use std::collections::HashMap;

use nodelink_core::{DeviceId, Value};
use nodelink_devices::{
    catalogue, encode, BrokerSettings, CommandTarget, DeviceDeclaration, DeviceTable, StateCache,
    StatusTopics, TopicPlan, TypeSchema,
};

/// A plausible declaration for one catalogue type.
fn declaration(schema: &'static TypeSchema) -> DeviceDeclaration {
    let name = schema.type_name.to_lowercase();
    let topics: StatusTopics = match schema.topics {
        TopicPlan::Single => format!("stat/{name}/IN").as_str().into(),
        TopicPlan::Derived(_) => format!("tele/{name}/SENSOR").as_str().into(),
        TopicPlan::BySuffix => schema
            .slots
            .iter()
            .filter_map(|slot| slot.suffix.map(|s| format!("shellies/{name}/sensor/{s}")))
            .collect::<Vec<_>>()
            .into(),
        TopicPlan::Fanout { .. } => name.as_str().into(),
    };
    DeviceDeclaration {
        id: name.clone(),
        type_name: schema.type_name.to_string(),
        status_topic: topics,
        cmd_topic: schema
            .publishes_commands()
            .then(|| format!("cmnd/{name}/CMD")),
        sensor_id: Some("SENSOR1".to_string()),
        name: None,
    }
}

fn expected_bindings(schema: &TypeSchema) -> usize {
    match schema.topics {
        TopicPlan::Single => 1,
        TopicPlan::Derived(derivations) => 1 + derivations.len(),
        TopicPlan::BySuffix | TopicPlan::Fanout { .. } => schema.slots.len(),
    }
}

fn routable() -> impl Iterator<Item = &'static TypeSchema> {
    catalogue::ALL
        .iter()
        .copied()
        .filter(|s| s.type_name != catalogue::CONTROLLER_TYPE)
}

#[test]
fn test_every_type_binds_all_slots() {
    for schema in routable() {
        let table = DeviceTable::build(&BrokerSettings::default(), &[declaration(schema)])
            .unwrap_or_else(|e| panic!("'{}' failed to load: {e}", schema.type_name));

        let topics: Vec<&str> = table.subscriptions().collect();
        assert_eq!(
            topics.len(),
            expected_bindings(schema),
            "binding count for '{}'",
            schema.type_name
        );

        let mut slots: Vec<usize> = topics
            .iter()
            .map(|topic| {
                let (device, slot) = table
                    .route(topic)
                    .unwrap_or_else(|| panic!("'{}' topic {topic} unroutable", schema.type_name));
                assert_eq!(device.schema().type_name, schema.type_name);
                slot
            })
            .collect();
        slots.sort_unstable();
        slots.dedup();
        assert_eq!(
            slots.len(),
            expected_bindings(schema),
            "each binding of '{}' must land on its own slot",
            schema.type_name
        );
        assert!(slots.iter().all(|s| *s < schema.slots.len()));
    }
}

#[test]
fn test_every_command_encodes_with_no_arguments() {
    // Required-parameter commands would make this fail, which is the
    // point: the catalogue only declares optional parameters with
    // fallbacks, so a bare command from the controller always works.
    for schema in routable() {
        let table =
            DeviceTable::build(&BrokerSettings::default(), &[declaration(schema)]).unwrap();
        let id = DeviceId::parse(&schema.type_name.to_lowercase()).unwrap();
        let descriptor = table.device(&id).unwrap();
        let cache = StateCache::new();

        for command in schema.commands {
            let outcome = encode(descriptor, command.id, &HashMap::new(), &cache)
                .unwrap_or_else(|e| {
                    panic!("'{}' command {} failed: {e}", schema.type_name, command.id)
                });
            match command.target {
                CommandTarget::None => assert!(outcome.publish.is_none()),
                _ => assert!(
                    outcome.publish.is_some(),
                    "'{}' command {} produced no publish",
                    schema.type_name,
                    command.id
                ),
            }
        }
    }
}

#[test]
fn test_cache_seeded_defaults_reach_the_payload() {
    for schema in routable() {
        let table =
            DeviceTable::build(&BrokerSettings::default(), &[declaration(schema)]).unwrap();
        let id = DeviceId::parse(&schema.type_name.to_lowercase()).unwrap();
        let descriptor = table.device(&id).unwrap();

        for command in schema.commands {
            for param in command.params {
                let Some(status) = param.init_from else {
                    continue;
                };
                let cache = StateCache::new();
                cache.apply(&id, status, Value::Int(45));

                let outcome = encode(descriptor, command.id, &HashMap::new(), &cache).unwrap();
                let (_, payload) = outcome.publish.unwrap();
                assert!(
                    payload.contains("45"),
                    "'{}' command {} ignored the cached {status}",
                    schema.type_name,
                    command.id
                );
            }
        }
    }
}

#[test]
fn test_unknown_type_rejected() {
    let bad = DeviceDeclaration {
        id: "mystery".to_string(),
        type_name: "thermostat".to_string(),
        status_topic: "stat/mystery/IN".into(),
        cmd_topic: None,
        sensor_id: None,
        name: None,
    };
    assert!(DeviceTable::build(&BrokerSettings::default(), &[bad]).is_err());
}
