//! Bridge Translation Demo
//!
//! Walks the full pipeline without a broker:
//! 1. Load a device table from declarations
//! 2. Feed canned inbound MQTT messages through the decoder
//! 3. Watch change events and announcements on the event bus
//! 4. Send controller commands and watch the outbound publishes

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use nodelink_core::{BridgeEvent, EventBus, Value};
use nodelink_devices::{
    BridgeConfig, BridgeService, BrokerSettings, ChannelPublisher, DeviceDeclaration,
    HeartbeatConfig,
};

fn device(id: &str, type_name: &str, status: &str, cmd: Option<&str>) -> DeviceDeclaration {
    DeviceDeclaration {
        id: id.to_string(),
        type_name: type_name.to_string(),
        status_topic: status.into(),
        cmd_topic: cmd.map(str::to_string),
        sensor_id: None,
        name: Some(format!("Demo {id}")),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("nodelink_devices=debug")
        .with_target(false)
        .compact()
        .init();

    println!("=== NodeLink Bridge Demo ===\n");

    let mut attic = device(
        "attic_th",
        "TempHumid",
        "tele/attic/SENSOR",
        Some("cmnd/attic/Sensor"),
    );
    attic.sensor_id = Some("AM2301".to_string());

    let config = BridgeConfig::new(
        BrokerSettings::default(),
        vec![
            device(
                "porch",
                "switch",
                "stat/porch/POWER",
                Some("cmnd/porch/POWER"),
            ),
            device(
                "lamp",
                "dimmer",
                "stat/lamp/STATE",
                Some("cmnd/lamp/Dimmer"),
            ),
            device("garage", "ratgdo", "ratgdo-7c2c", Some("ratgdo-7c2c")),
            attic,
        ],
    );

    let bus = Arc::new(EventBus::new());
    let mut events = bus.subscribe();
    let (publisher, mut published) = ChannelPublisher::new();
    let service = BridgeService::with_heartbeat(
        config,
        bus,
        Arc::new(publisher),
        HeartbeatConfig::new(300),
    )?;

    // Print everything the bridge tells the controller.
    tokio::spawn(async move {
        while let Some((event, meta)) = events.recv().await {
            match event {
                BridgeEvent::StatusChanged {
                    device_id,
                    status,
                    value,
                    uom,
                    ..
                } => println!("  [{}] {device_id} {status} = {value} (uom {uom})", meta.source),
                BridgeEvent::CommandSent {
                    device_id, command, ..
                } => println!("  [{}] {device_id} announces {command}", meta.source),
                BridgeEvent::StatusReport {
                    device_id, values, ..
                } => println!("  [{}] {device_id} reports {} statuses", meta.source, values.len()),
            }
        }
    });
    // And everything it tells the devices.
    tokio::spawn(async move {
        while let Some((topic, payload)) = published.recv().await {
            println!("  [mqtt out] {topic} <- {payload:?}");
        }
    });

    println!("--- Startup ---");
    println!("subscriptions: {:?}\n", service.subscriptions().await);
    service.start().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    println!("\n--- Inbound status traffic ---");
    for (topic, payload) in [
        ("stat/porch/POWER", r#"ON"#),
        ("stat/lamp/RESULT", r#"{"POWER":"ON","Dimmer":45}"#),
        ("ratgdo-7c2c/status/door", "opening"),
        ("ratgdo-7c2c/status/door", "open"),
        (
            "tele/attic/SENSOR",
            r#"{"AM2301":{"Temperature":71.6,"Humidity":40.0,"DewPoint":45.1}}"#,
        ),
        // A second copy changes nothing and stays silent.
        ("stat/porch/POWER", "ON"),
        // Garbage is dropped without touching the cache.
        ("ratgdo-7c2c/status/door", "ajar"),
    ] {
        service.handle_message(topic, payload.as_bytes()).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    println!("\n--- Controller commands ---");
    // DON with no argument restores the cached level (45).
    service.send_command("lamp", "DON", &HashMap::new()).await?;
    // Explicit value wins over the cache.
    let mut params = HashMap::new();
    params.insert("value".to_string(), Value::Int(70));
    service.send_command("lamp", "DON", &params).await?;
    service.send_command("garage", "CLOSE", &HashMap::new()).await?;
    service.send_command("attic_th", "QUERY", &HashMap::new()).await?;
    service
        .send_command("controller", "QUERY", &HashMap::new())
        .await?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    println!("\n--- Shutdown ---");
    service.stop().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    Ok(())
}
