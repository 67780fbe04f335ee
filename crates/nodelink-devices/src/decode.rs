//! Inbound payload decoding.
//!
//! Pure translation: a schema slot plus raw payload bytes in, typed
//! `(status, value)` updates out. The decoder never reads the cache
//! and never partially applies a message; any failure drops the whole
//! message and nothing reaches the caller.

use nodelink_core::Value;
use serde_json::Value as Json;

use crate::error::DecodeError;
use crate::schema::{Coerce, Envelope, FieldRule, JsonRule, SlotDecode, TypeSchema};

/// Decode one inbound payload against a schema slot.
///
/// `sensor_id` is the declaration's sensor block key, consulted by
/// sensor and analog envelopes. Updates come back in rule order with at
/// most one entry per status; when several rules hit the same status
/// the last one wins.
pub fn decode(
    schema: &TypeSchema,
    slot: usize,
    sensor_id: Option<&str>,
    payload: &[u8],
) -> Result<Vec<(&'static str, Value)>, DecodeError> {
    let slot_schema = schema.slots.get(slot).ok_or(DecodeError::BadSlot {
        type_name: schema.type_name,
        slot,
    })?;

    let mut updates: Vec<(&'static str, Value)> = Vec::new();
    match &slot_schema.decode {
        SlotDecode::Scalar(rule) => {
            let text = String::from_utf8_lossy(payload);
            let decoded = coerce_text(rule.status, text.as_ref(), rule.coerce)?;
            if let Some(presence) = slot_schema.presence {
                push_update(&mut updates, presence, Value::Int(1));
            }
            if let Some(value) = decoded {
                push_update(&mut updates, rule.status, value);
            }
        }
        SlotDecode::Json(rule) => {
            decode_json(rule, slot_schema.presence, sensor_id, payload, &mut updates)?;
        }
    }

    // Decoded values must satisfy the declared status kinds; a reading
    // outside its range means the device and the schema disagree.
    for entry in &mut updates {
        let status = entry.0;
        if let Some(def) = schema.status(status) {
            entry.1 = def
                .kind
                .validate(entry.1)
                .map_err(|source| DecodeError::Invalid { status, source })?;
        }
    }

    Ok(updates)
}

fn decode_json(
    rule: &JsonRule,
    presence: Option<&'static str>,
    sensor_id: Option<&str>,
    payload: &[u8],
    updates: &mut Vec<(&'static str, Value)>,
) -> Result<(), DecodeError> {
    let parsed: Json = serde_json::from_slice(payload)?;
    if !parsed.is_object() {
        return Err(DecodeError::NotAnObject {
            payload: String::from_utf8_lossy(payload).into_owned(),
        });
    }

    // Tasmota wraps Status 10 responses; telemetry arrives bare.
    let mut root = &parsed;
    if rule.unwrap_status_sns {
        if let Some(inner) = root.get("StatusSNS") {
            if !inner.is_object() {
                return Err(DecodeError::FieldType {
                    field: "StatusSNS",
                    expected: "object",
                });
            }
            root = inner;
        }
    }

    let target: Option<&Json> = match rule.envelope {
        Envelope::Root => Some(root),
        Envelope::Sensor { fallbacks } => match sensor_id {
            Some(key) => root.get(key),
            None => fallbacks.iter().find_map(|key| root.get(*key)),
        },
        Envelope::Fixed { key } => root.get(key),
        Envelope::Analog => resolve_analog(root, sensor_id),
    };

    match target {
        Some(body) => {
            if let Some(p) = presence {
                push_update(updates, p, Value::Int(1));
            }
            extract_fields(rule.fields, body, updates)?;
        }
        None => {
            // Declared block missing: the device is not reporting.
            if let Some(p) = presence {
                push_update(updates, p, Value::Int(0));
            }
        }
    }
    Ok(())
}

fn resolve_analog<'a>(root: &'a Json, sensor_id: Option<&str>) -> Option<&'a Json> {
    let analog = root.get("ANALOG")?.as_object()?;
    match sensor_id {
        Some(key) => analog.get(key),
        None => analog.values().next(),
    }
}

fn extract_fields(
    fields: &[FieldRule],
    body: &Json,
    updates: &mut Vec<(&'static str, Value)>,
) -> Result<(), DecodeError> {
    for field in fields {
        let Some(raw) = walk(body, field.path) else {
            continue;
        };
        if let Some(value) = coerce_json(field, raw)? {
            push_update(updates, field.status, value);
        }
    }
    Ok(())
}

/// Follow a key path into a JSON value; an empty path is the value
/// itself.
fn walk<'a>(mut node: &'a Json, path: &[&str]) -> Option<&'a Json> {
    for key in path {
        node = node.as_object()?.get(*key)?;
    }
    Some(node)
}

fn coerce_json(field: &FieldRule, raw: &Json) -> Result<Option<Value>, DecodeError> {
    let name = field.path.last().copied().unwrap_or(field.status);
    match field.coerce {
        Coerce::Number { scale, round } => {
            let number = match raw {
                Json::Number(n) => n.as_f64().ok_or(DecodeError::FieldType {
                    field: name,
                    expected: "number",
                })?,
                Json::String(s) => s.trim().parse().map_err(|_| DecodeError::FieldType {
                    field: name,
                    expected: "number",
                })?,
                _ => {
                    return Err(DecodeError::FieldType {
                        field: name,
                        expected: "number",
                    })
                }
            };
            Ok(Some(finish_number(number, scale, round)))
        }
        Coerce::Integer => {
            let int = match raw {
                Json::Number(n) => n.as_i64().ok_or(DecodeError::FieldType {
                    field: name,
                    expected: "integer",
                })?,
                Json::String(s) => s.trim().parse().map_err(|_| DecodeError::FieldType {
                    field: name,
                    expected: "integer",
                })?,
                _ => {
                    return Err(DecodeError::FieldType {
                        field: name,
                        expected: "integer",
                    })
                }
            };
            Ok(Some(Value::Int(int)))
        }
        // Word and token coercions read a JSON string.
        _ => {
            let text = raw.as_str().ok_or(DecodeError::FieldType {
                field: name,
                expected: "string",
            })?;
            coerce_text(field.status, text, field.coerce)
        }
    }
}

/// Coerce raw text into a value. `Ok(None)` means the input was
/// recognized but carries no update (Tasmota `POWER ON` without a
/// level).
fn coerce_text(
    status: &'static str,
    raw: &str,
    coerce: Coerce,
) -> Result<Option<Value>, DecodeError> {
    match coerce {
        Coerce::Number { scale, round } => {
            let parsed: f64 = raw.trim().parse().map_err(|_| DecodeError::NotNumeric {
                payload: raw.to_string(),
            })?;
            Ok(Some(finish_number(parsed, scale, round)))
        }
        Coerce::Integer => {
            let parsed: i64 = raw.trim().parse().map_err(|_| DecodeError::NotAnInteger {
                payload: raw.to_string(),
            })?;
            Ok(Some(Value::Int(parsed)))
        }
        Coerce::OnOff => {
            let word = raw.trim();
            if word.eq_ignore_ascii_case("ON") {
                Ok(Some(Value::Int(100)))
            } else if word.eq_ignore_ascii_case("OFF") {
                Ok(Some(Value::Int(0)))
            } else {
                Err(DecodeError::UnknownToken {
                    status,
                    token: word.to_string(),
                })
            }
        }
        Coerce::WordFlag {
            word,
            on_value,
            fold,
        } => {
            let hit = if fold {
                raw.trim().eq_ignore_ascii_case(word)
            } else {
                raw == word
            };
            Ok(Some(Value::Int(if hit { on_value } else { 0 })))
        }
        Coerce::FalsyWord { word } => Ok(Some(Value::Int(i64::from(raw != word)))),
        Coerce::Token(table) => table
            .ordinal(raw)
            .map(|ordinal| Some(Value::Int(ordinal)))
            .ok_or_else(|| DecodeError::UnknownToken {
                status,
                token: raw.to_string(),
            }),
        Coerce::OffToZero => match raw {
            "OFF" => Ok(Some(Value::Int(0))),
            "ON" => Ok(None),
            other => Err(DecodeError::UnknownToken {
                status,
                token: other.to_string(),
            }),
        },
    }
}

/// Largest magnitude at which every whole f64 is still an exact
/// integer (2^53). Past it the cast would pick a neighbour or
/// saturate, so such readings stay floats.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

/// Scale and round, then normalize whole results to the integer
/// variant so equal readings always compare equal in the cache.
fn finish_number(raw: f64, scale: Option<f64>, round: Option<u32>) -> Value {
    let mut value = raw;
    if let Some(scale) = scale {
        value *= scale;
    }
    if let Some(digits) = round {
        let factor = 10f64.powi(digits as i32);
        value = (value * factor).round() / factor;
    }
    if value.fract() == 0.0 && value.abs() <= MAX_EXACT_INT {
        Value::Int(value as i64)
    } else {
        Value::Float(value)
    }
}

/// Record an update, replacing any earlier value for the same status
/// while keeping its position.
fn push_update(updates: &mut Vec<(&'static str, Value)>, status: &'static str, value: Value) {
    if let Some(existing) = updates.iter_mut().find(|(s, _)| *s == status) {
        existing.1 = value;
    } else {
        updates.push((status, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::catalogue;

    fn ok(
        schema: &TypeSchema,
        slot: usize,
        sensor_id: Option<&str>,
        payload: &str,
    ) -> Vec<(&'static str, Value)> {
        decode(schema, slot, sensor_id, payload.as_bytes()).unwrap()
    }

    #[test]
    fn test_switch_on_off() {
        assert_eq!(
            ok(&catalogue::SWITCH, 0, None, "ON"),
            vec![("ST", Value::Int(100))]
        );
        assert_eq!(
            ok(&catalogue::SWITCH, 0, None, "off"),
            vec![("ST", Value::Int(0))]
        );
        assert!(matches!(
            decode(&catalogue::SWITCH, 0, None, b"TOGGLE"),
            Err(DecodeError::UnknownToken { .. })
        ));
    }

    #[test]
    fn test_dimmer_level() {
        assert_eq!(
            ok(&catalogue::DIMMER, 0, None, r#"{"POWER":"ON","Dimmer":45}"#),
            vec![("ST", Value::Int(45))]
        );
        assert_eq!(
            ok(&catalogue::DIMMER, 1, None, r#"{"Dimmer":70}"#),
            vec![("ST", Value::Int(70))]
        );
    }

    #[test]
    fn test_dimmer_power_off_overrides_level() {
        assert_eq!(
            ok(&catalogue::DIMMER, 0, None, r#"{"POWER":"OFF","Dimmer":45}"#),
            vec![("ST", Value::Int(0))]
        );
    }

    #[test]
    fn test_dimmer_bare_power_on_carries_no_level() {
        assert_eq!(ok(&catalogue::DIMMER, 0, None, r#"{"POWER":"ON"}"#), vec![]);
    }

    #[test]
    fn test_dimmer_out_of_range_level_rejected() {
        assert!(matches!(
            decode(&catalogue::DIMMER, 0, None, br#"{"Dimmer":150}"#),
            Err(DecodeError::Invalid { status: "ST", .. })
        ));
    }

    #[test]
    fn test_fan_speed_ordinal() {
        assert_eq!(
            ok(&catalogue::FAN, 0, None, r#"{"FanSpeed":2}"#),
            vec![("ST", Value::Int(2))]
        );
        // Ordinal outside the speed table.
        assert!(matches!(
            decode(&catalogue::FAN, 0, None, br#"{"FanSpeed":7}"#),
            Err(DecodeError::Invalid { .. })
        ));
    }

    #[test]
    fn test_multi_sensor_payload() {
        let updates = ok(
            &catalogue::SENSOR,
            0,
            None,
            r#"{"motion":"motion","temperature":71.6,"humidity":40,"ldr":512,
               "state":"ON","brightness":128,"color":{"r":255,"g":100,"b":0}}"#,
        );
        assert!(updates.contains(&("ST", Value::Int(1))));
        assert!(updates.contains(&("CLITEMP", Value::Float(71.6))));
        assert!(updates.contains(&("CLIHUM", Value::Int(40))));
        assert!(updates.contains(&("LUMIN", Value::Int(512))));
        assert!(updates.contains(&("GV0", Value::Int(100))));
        assert!(updates.contains(&("GV1", Value::Int(128))));
        assert!(updates.contains(&("GV2", Value::Int(255))));
        assert!(updates.contains(&("GV4", Value::Int(0))));
    }

    #[test]
    fn test_motion_standby_is_off() {
        assert_eq!(
            ok(&catalogue::SENSOR, 0, None, r#"{"motion":"standby"}"#),
            vec![("ST", Value::Int(0))]
        );
    }

    #[test]
    fn test_flag_tokens() {
        assert_eq!(
            ok(&catalogue::FLAG, 0, None, "NOK"),
            vec![("ST", Value::Int(1))]
        );
        assert_eq!(
            ok(&catalogue::FLAG, 0, None, "---"),
            vec![("ST", Value::Int(12))]
        );
        assert!(matches!(
            decode(&catalogue::FLAG, 0, None, b"MAYBE"),
            Err(DecodeError::UnknownToken { .. })
        ));
    }

    #[test]
    fn test_temp_humid_telemetry() {
        let updates = ok(
            &catalogue::TEMP_HUMID,
            0,
            Some("AM2301"),
            r#"{"Time":"2024-01-01T00:00:00",
               "AM2301":{"Temperature":71.6,"Humidity":40.0,"DewPoint":45.1}}"#,
        );
        assert_eq!(updates[0], ("ST", Value::Int(1)));
        assert!(updates.contains(&("CLITEMP", Value::Float(71.6))));
        assert!(updates.contains(&("CLIHUM", Value::Int(40))));
        assert!(updates.contains(&("DEWPT", Value::Float(45.1))));
    }

    #[test]
    fn test_temp_humid_missing_block_reports_absent() {
        assert_eq!(
            ok(&catalogue::TEMP_HUMID, 0, Some("AM2301"), r#"{"Time":"x"}"#),
            vec![("ST", Value::Int(0))]
        );
    }

    #[test]
    fn test_status_sns_wrapper_unwrapped() {
        let updates = ok(
            &catalogue::TEMP_HUMID,
            1,
            Some("AM2301"),
            r#"{"StatusSNS":{"AM2301":{"Temperature":70.0}}}"#,
        );
        assert_eq!(updates[0], ("ST", Value::Int(1)));
        assert!(updates.contains(&("CLITEMP", Value::Int(70))));
    }

    #[test]
    fn test_temp_fallback_hardware_key() {
        let updates = ok(
            &catalogue::TEMP,
            0,
            None,
            r#"{"DS18B20":{"Temperature":68.5}}"#,
        );
        assert_eq!(
            updates,
            vec![("ST", Value::Int(1)), ("CLITEMP", Value::Float(68.5))]
        );
    }

    #[test]
    fn test_pressure_converted_to_inches() {
        let updates = ok(
            &catalogue::TEMP_HUMID_PRESS,
            0,
            Some("BME280"),
            r#"{"BME280":{"Temperature":71.6,"Humidity":40,"DewPoint":45.1,"Pressure":1013.25}}"#,
        );
        assert!(updates.contains(&("BARPRES", Value::Float(29.92))));
    }

    #[test]
    fn test_distance_block() {
        assert_eq!(
            ok(&catalogue::DISTANCE, 0, None, r#"{"SR04":{"Distance":123.4}}"#),
            vec![("ST", Value::Int(1)), ("DISTANC", Value::Float(123.4))]
        );
        assert_eq!(
            ok(&catalogue::DISTANCE, 0, None, r#"{"Time":"x"}"#),
            vec![("ST", Value::Int(0))]
        );
    }

    #[test]
    fn test_flood_slots() {
        assert_eq!(
            ok(&catalogue::SHELLY_FLOOD, 0, None, "21.5"),
            vec![("ST", Value::Int(1)), ("CLITEMP", Value::Float(21.5))]
        );
        assert_eq!(
            ok(&catalogue::SHELLY_FLOOD, 1, None, "true"),
            vec![("ST", Value::Int(1)), ("GV0", Value::Int(1))]
        );
        assert_eq!(
            ok(&catalogue::SHELLY_FLOOD, 1, None, "false"),
            vec![("ST", Value::Int(1)), ("GV0", Value::Int(0))]
        );
        assert_eq!(
            ok(&catalogue::SHELLY_FLOOD, 2, None, "87"),
            vec![("ST", Value::Int(1)), ("BATLVL", Value::Int(87))]
        );
    }

    #[test]
    fn test_flood_garbage_reading_rejected_whole() {
        // A bad reading must not sneak the presence flag through.
        assert!(matches!(
            decode(&catalogue::SHELLY_FLOOD, 0, None, b"soggy"),
            Err(DecodeError::NotNumeric { .. })
        ));
        assert!(matches!(
            decode(&catalogue::SHELLY_FLOOD, 2, None, b"150"),
            Err(DecodeError::Invalid { status: "BATLVL", .. })
        ));
    }

    #[test]
    fn test_huge_whole_reading_stays_float() {
        // 1e300 has no fractional part but is far outside i64, so it
        // must keep its magnitude instead of saturating to i64::MAX.
        assert_eq!(
            ok(&catalogue::SHELLY_FLOOD, 0, None, "1e300"),
            vec![("ST", Value::Int(1)), ("CLITEMP", Value::Float(1e300))]
        );
        assert_eq!(
            ok(&catalogue::SHELLY_FLOOD, 0, None, "-1e300"),
            vec![("ST", Value::Int(1)), ("CLITEMP", Value::Float(-1e300))]
        );
        // Whole readings inside the exact range still normalize.
        assert_eq!(
            ok(&catalogue::SHELLY_FLOOD, 0, None, "21.0"),
            vec![("ST", Value::Int(1)), ("CLITEMP", Value::Int(21))]
        );
    }

    #[test]
    fn test_analog_by_sensor_id_or_first_entry() {
        assert_eq!(
            ok(
                &catalogue::ANALOG,
                0,
                Some("A1"),
                r#"{"ANALOG":{"A0":1,"A1":300}}"#
            ),
            vec![("ST", Value::Int(1)), ("GPV", Value::Int(300))]
        );
        assert_eq!(
            ok(&catalogue::ANALOG, 0, None, r#"{"ANALOG":{"A0":512}}"#),
            vec![("ST", Value::Int(1)), ("GPV", Value::Int(512))]
        );
        assert_eq!(
            ok(&catalogue::ANALOG, 0, Some("A1"), r#"{"ANALOG":{"A0":1}}"#),
            vec![("ST", Value::Int(0))]
        );
        // Status 10 responses arrive wrapped.
        assert_eq!(
            ok(
                &catalogue::ANALOG,
                1,
                None,
                r#"{"StatusSNS":{"ANALOG":{"A0":42}}}"#
            ),
            vec![("ST", Value::Int(1)), ("GPV", Value::Int(42))]
        );
    }

    #[test]
    fn test_s31_energy_block() {
        let updates = ok(
            &catalogue::S31,
            0,
            None,
            r#"{"ENERGY":{"Current":0.42,"Power":95,"Voltage":121,"Factor":0.92,"Total":12.5}}"#,
        );
        assert!(updates.contains(&("ST", Value::Int(1))));
        assert!(updates.contains(&("CC", Value::Float(0.42))));
        assert!(updates.contains(&("CPW", Value::Int(95))));
        assert!(updates.contains(&("CV", Value::Int(121))));
        assert!(updates.contains(&("PF", Value::Float(0.92))));
        assert!(updates.contains(&("TPW", Value::Float(12.5))));
    }

    #[test]
    fn test_raw_integer() {
        assert_eq!(
            ok(&catalogue::RAW, 0, None, "42"),
            vec![("ST", Value::Int(1)), ("GV1", Value::Int(42))]
        );
        assert!(matches!(
            decode(&catalogue::RAW, 0, None, b"4.2"),
            Err(DecodeError::NotAnInteger { .. })
        ));
    }

    #[test]
    fn test_rgbw_state() {
        let updates = ok(
            &catalogue::RGBW,
            0,
            None,
            r#"{"state":"ON","br":128,"c":{"r":255,"g":0,"b":64,"w":10},"pgm":1}"#,
        );
        assert!(updates.contains(&("GV0", Value::Int(100))));
        assert!(updates.contains(&("GV1", Value::Int(128))));
        assert!(updates.contains(&("GV2", Value::Int(255))));
        assert!(updates.contains(&("GV5", Value::Int(10))));
        assert!(updates.contains(&("GV6", Value::Int(1))));
    }

    #[test]
    fn test_door_state_tokens() {
        assert_eq!(
            ok(&catalogue::RATGDO, 2, None, "opening"),
            vec![("GV1", Value::Int(2))]
        );
        assert!(matches!(
            decode(&catalogue::RATGDO, 2, None, b"ajar"),
            Err(DecodeError::UnknownToken { .. })
        ));
    }

    #[test]
    fn test_ratgdo_word_flags_are_exact() {
        assert_eq!(
            ok(&catalogue::RATGDO, 0, None, "online"),
            vec![("ST", Value::Int(1))]
        );
        // Exact match: case differences read as the off word.
        assert_eq!(
            ok(&catalogue::RATGDO, 0, None, "Online"),
            vec![("ST", Value::Int(0))]
        );
    }

    #[test]
    fn test_droplet_state_and_health() {
        let updates = ok(
            &catalogue::DROPLET,
            0,
            None,
            r#"{"server":"Connected","signal":"Strong Signal","volume":1500,"flow":0.5}"#,
        );
        assert_eq!(
            updates,
            vec![
                ("ST", Value::Int(0)),
                ("GV0", Value::Int(3)),
                ("WVOL", Value::Float(1.5)),
                ("WATERF", Value::Int(30)),
            ]
        );

        assert_eq!(
            ok(&catalogue::DROPLET, 1, None, "online"),
            vec![("GV1", Value::Int(1))]
        );
        assert_eq!(
            ok(&catalogue::DROPLET, 1, None, "offline"),
            vec![("GV1", Value::Int(0))]
        );
    }

    #[test]
    fn test_malformed_payloads() {
        assert!(matches!(
            decode(&catalogue::DIMMER, 0, None, b"{not json"),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            decode(&catalogue::DIMMER, 0, None, b"[1,2,3]"),
            Err(DecodeError::NotAnObject { .. })
        ));
        assert!(matches!(
            decode(&catalogue::DIMMER, 9, None, b"{}"),
            Err(DecodeError::BadSlot { slot: 9, .. })
        ));
    }

    #[test]
    fn test_field_of_wrong_type() {
        assert!(matches!(
            decode(&catalogue::DIMMER, 0, None, br#"{"Dimmer":"bright"}"#),
            Err(DecodeError::FieldType {
                field: "Dimmer",
                expected: "number",
            })
        ));
    }
}
