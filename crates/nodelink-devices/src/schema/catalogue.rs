//! The compiled-in type catalogue.
//!
//! One [`TypeSchema`] per supported device type, keyed by the type
//! string used in device declarations. The tables encode everything the
//! bridge knows about a type: topic layout, payload decoding, status
//! declarations, accepted commands, and announce behavior.
//!
//! Status ids and command ids follow the controller's fixed node
//! vocabulary (ST, GV0.., CLITEMP, DON, DOF, QUERY, ...), so the values
//! here line up with the editor (UOM) codes the controller renders.

use nodelink_core::{EnumTable, Unit, ValueKind};

use super::{
    AnnounceFire, AnnounceRule, Coerce, CommandDef, CommandTarget, DonWhen, Envelope, FieldRule,
    FieldSource, FieldSpec, JsonRule, ParamDef, PayloadPlan, ScalarRule, SlotDecode, SlotSchema,
    StatusDef, TopicDerivation, TopicPlan, TypeSchema,
};

/// Type string reserved for the controller pseudo-device.
pub const CONTROLLER_TYPE: &str = "controller";

// ---------------------------------------------------------------------------
// Enum vocabularies

/// Flag device states, reported as bare tokens.
pub static FLAG_STATES: EnumTable = EnumTable {
    name: "flag",
    entries: &[
        ("OK", 0),
        ("NOK", 1),
        ("LO", 2),
        ("HI", 3),
        ("ERR", 4),
        ("IN", 5),
        ("OUT", 6),
        ("UP", 7),
        ("DOWN", 8),
        ("TRIGGER", 9),
        ("ON", 10),
        ("OFF", 11),
        ("---", 12),
    ],
};

/// iFan speed ordinals (the wire carries the ordinal itself).
pub static FAN_SPEEDS: EnumTable = EnumTable {
    name: "fan_speed",
    entries: &[("off", 0), ("low", 1), ("medium", 2), ("high", 3)],
};

/// Garage door states as published by ratgdo firmware.
pub static DOOR_STATES: EnumTable = EnumTable {
    name: "door",
    entries: &[
        ("closed", 0),
        ("open", 1),
        ("opening", 2),
        ("stopped", 3),
        ("closing", 4),
    ],
};

/// Droplet cloud connection states.
pub static SERVER_STATES: EnumTable = EnumTable {
    name: "server",
    entries: &[("Connected", 0), ("Connecting", 1), ("Disconnected", 2)],
};

/// Droplet sensor signal quality.
pub static SIGNAL_STATES: EnumTable = EnumTable {
    name: "signal",
    entries: &[
        ("Initializing", 0),
        ("No Signal", 1),
        ("Weak Signal", 2),
        ("Strong Signal", 3),
    ],
};

/// Controller link states.
pub static LINK_STATES: EnumTable = EnumTable {
    name: "link",
    entries: &[("offline", 0), ("online", 1), ("error", 2)],
};

// ---------------------------------------------------------------------------
// Catalogue shorthands

const fn num(unit: Unit) -> ValueKind {
    ValueKind::Numeric {
        unit,
        min: None,
        max: None,
    }
}

const fn num_range(unit: Unit, min: f64, max: f64) -> ValueKind {
    ValueKind::Numeric {
        unit,
        min: Some(min),
        max: Some(max),
    }
}

/// 0-255 channel level (editor 100).
const LEVEL255: ValueKind = num_range(Unit::Level, 0.0, 255.0);

/// Plain numeric field, unscaled.
const NUM: Coerce = Coerce::Number {
    scale: None,
    round: None,
};

const fn field(path: &'static [&'static str], status: &'static str, coerce: Coerce) -> FieldRule {
    FieldRule {
        path,
        status,
        coerce,
    }
}

const fn scalar_slot(status: &'static str, coerce: Coerce) -> SlotSchema {
    SlotSchema {
        suffix: None,
        presence: None,
        decode: SlotDecode::Scalar(ScalarRule { status, coerce }),
    }
}

const QUERY_PUBLISH: CommandDef = CommandDef {
    id: "QUERY",
    params: &[],
    target: CommandTarget::CommandTopic,
    payload: PayloadPlan::Fixed(""),
    report: None,
};

/// Tasmota sensor types answer `Status 10` on the `stat/` side.
const QUERY_STATUS10: CommandDef = CommandDef {
    id: "QUERY",
    params: &[],
    target: CommandTarget::ReplaceTail("Status"),
    payload: PayloadPlan::Fixed("10"),
    report: None,
};

/// Types that cannot be queried answer from the cache alone.
const QUERY_REPORT_ONLY: CommandDef = CommandDef {
    id: "QUERY",
    params: &[],
    target: CommandTarget::None,
    payload: PayloadPlan::Fixed(""),
    report: None,
};

/// Tasmota query responses arrive on `stat/.../STATUS10` while
/// telemetry arrives on `tele/.../SENSOR`.
const STATUS10: &[TopicDerivation] = &[TopicDerivation {
    replace_tail: "STATUS10",
    swap_prefix: Some(("tele/", "stat/")),
}];

const ANNOUNCE_ON_CHANGE: AnnounceRule = AnnounceRule {
    status: "ST",
    don_when: DonWhen::NonZero,
    fire: AnnounceFire::OnChange,
};

// ---------------------------------------------------------------------------
// Schemas

/// Single-relay switch (Sonoff basic and friends). Bare ON/OFF payload.
pub static SWITCH: TypeSchema = TypeSchema {
    type_name: "switch",
    topics: TopicPlan::Single,
    slots: &[scalar_slot("ST", Coerce::OnOff)],
    statuses: &[StatusDef {
        id: "ST",
        kind: ValueKind::OnOff,
    }],
    sent_commands: &["DON", "DOF"],
    commands: &[
        CommandDef {
            id: "DON",
            params: &[],
            target: CommandTarget::CommandTopic,
            payload: PayloadPlan::Fixed("ON"),
            report: None,
        },
        CommandDef {
            id: "DOF",
            params: &[],
            target: CommandTarget::CommandTopic,
            payload: PayloadPlan::Fixed("OFF"),
            report: None,
        },
        QUERY_PUBLISH,
    ],
    announce: Some(ANNOUNCE_ON_CHANGE),
};

/// Single-channel dimmer. JSON state on the declared topic plus the
/// Tasmota `RESULT` companion for command echoes.
pub static DIMMER: TypeSchema = TypeSchema {
    type_name: "dimmer",
    topics: TopicPlan::Derived(&[TopicDerivation {
        replace_tail: "RESULT",
        swap_prefix: None,
    }]),
    slots: &[DIMMER_SLOT, DIMMER_SLOT],
    statuses: &[StatusDef {
        id: "ST",
        kind: ValueKind::Percent,
    }],
    sent_commands: &["DON", "DOF"],
    commands: &[
        CommandDef {
            id: "DON",
            params: &[ParamDef {
                id: "value",
                kind: ValueKind::Percent,
                optional: true,
                init_from: Some("ST"),
            }],
            target: CommandTarget::CommandTopic,
            payload: PayloadPlan::Scalar {
                param: "value",
                fallback: Some("100"),
            },
            report: None,
        },
        CommandDef {
            id: "DOF",
            params: &[],
            target: CommandTarget::CommandTopic,
            payload: PayloadPlan::Fixed("0"),
            report: None,
        },
        CommandDef {
            id: "BRT",
            params: &[],
            target: CommandTarget::CommandTopic,
            payload: PayloadPlan::Step {
                status: "ST",
                delta: 10,
                min: 0,
                max: 100,
            },
            report: None,
        },
        CommandDef {
            id: "DIM",
            params: &[],
            target: CommandTarget::CommandTopic,
            payload: PayloadPlan::Step {
                status: "ST",
                delta: -10,
                min: 0,
                max: 100,
            },
            report: None,
        },
        CommandDef {
            id: "QUERY",
            params: &[],
            target: CommandTarget::ReplaceTail("State"),
            payload: PayloadPlan::Fixed(""),
            report: None,
        },
    ],
    announce: Some(ANNOUNCE_ON_CHANGE),
};

/// `Dimmer` carries the level; `POWER` is listed last so an OFF in the
/// same payload overrides it with zero.
const DIMMER_SLOT: SlotSchema = SlotSchema {
    suffix: None,
    presence: None,
    decode: SlotDecode::Json(JsonRule {
        unwrap_status_sns: false,
        envelope: Envelope::Root,
        fields: &[
            field(&["Dimmer"], "ST", NUM),
            field(&["POWER"], "ST", Coerce::OffToZero),
        ],
    }),
};

/// Sonoff iFan. Speed index 0-3 in a JSON envelope.
pub static FAN: TypeSchema = TypeSchema {
    type_name: "ifan",
    topics: TopicPlan::Single,
    slots: &[SlotSchema {
        suffix: None,
        presence: None,
        decode: SlotDecode::Json(JsonRule {
            unwrap_status_sns: false,
            envelope: Envelope::Root,
            fields: &[field(&["FanSpeed"], "ST", NUM)],
        }),
    }],
    statuses: &[StatusDef {
        id: "ST",
        kind: ValueKind::Enum(&FAN_SPEEDS),
    }],
    sent_commands: &["DON", "DOF"],
    commands: &[
        CommandDef {
            id: "DON",
            params: &[ParamDef {
                id: "value",
                kind: ValueKind::Enum(&FAN_SPEEDS),
                optional: true,
                init_from: None,
            }],
            target: CommandTarget::CommandTopic,
            payload: PayloadPlan::Scalar {
                param: "value",
                fallback: Some("3"),
            },
            report: None,
        },
        CommandDef {
            id: "DOF",
            params: &[],
            target: CommandTarget::CommandTopic,
            payload: PayloadPlan::Fixed("0"),
            report: None,
        },
        CommandDef {
            id: "FDUP",
            params: &[],
            target: CommandTarget::CommandTopic,
            payload: PayloadPlan::Fixed("+"),
            report: None,
        },
        CommandDef {
            id: "FDDOWN",
            params: &[],
            target: CommandTarget::CommandTopic,
            payload: PayloadPlan::Fixed("-"),
            report: None,
        },
        QUERY_PUBLISH,
    ],
    announce: Some(ANNOUNCE_ON_CHANGE),
};

/// Multi-sensor (motion, environment, controllable LED) in one JSON
/// payload at the object root.
pub static SENSOR: TypeSchema = TypeSchema {
    type_name: "sensor",
    topics: TopicPlan::Single,
    slots: &[SlotSchema {
        suffix: None,
        presence: None,
        decode: SlotDecode::Json(JsonRule {
            unwrap_status_sns: false,
            envelope: Envelope::Root,
            fields: &[
                field(&["motion"], "ST", Coerce::FalsyWord { word: "standby" }),
                field(&["temperature"], "CLITEMP", NUM),
                field(&["heatIndex"], "GPV", NUM),
                field(&["humidity"], "CLIHUM", NUM),
                field(&["ldr"], "LUMIN", NUM),
                field(
                    &["state"],
                    "GV0",
                    Coerce::WordFlag {
                        word: "ON",
                        on_value: 100,
                        fold: false,
                    },
                ),
                field(&["brightness"], "GV1", NUM),
                field(&["color", "r"], "GV2", NUM),
                field(&["color", "g"], "GV3", NUM),
                field(&["color", "b"], "GV4", NUM),
            ],
        }),
    }],
    statuses: &[
        StatusDef {
            id: "ST",
            kind: ValueKind::Bool,
        },
        StatusDef {
            id: "CLITEMP",
            kind: num(Unit::Fahrenheit),
        },
        StatusDef {
            id: "GPV",
            kind: num(Unit::Fahrenheit),
        },
        StatusDef {
            id: "CLIHUM",
            kind: num(Unit::HumidityPercent),
        },
        StatusDef {
            id: "LUMIN",
            kind: num(Unit::Lux),
        },
        StatusDef {
            id: "GV0",
            kind: ValueKind::OnOff,
        },
        StatusDef {
            id: "GV1",
            kind: LEVEL255,
        },
        StatusDef {
            id: "GV2",
            kind: LEVEL255,
        },
        StatusDef {
            id: "GV3",
            kind: LEVEL255,
        },
        StatusDef {
            id: "GV4",
            kind: LEVEL255,
        },
    ],
    sent_commands: &["DON", "DOF"],
    commands: &[
        CommandDef {
            id: "DON",
            params: &[],
            target: CommandTarget::CommandTopic,
            payload: PayloadPlan::Fixed(r#"{"state":"ON"}"#),
            report: None,
        },
        CommandDef {
            id: "DOF",
            params: &[],
            target: CommandTarget::CommandTopic,
            payload: PayloadPlan::Fixed(r#"{"state":"OFF"}"#),
            report: None,
        },
        CommandDef {
            id: "SETLED",
            params: &[
                ParamDef {
                    id: "I",
                    kind: LEVEL255,
                    optional: true,
                    init_from: None,
                },
                ParamDef {
                    id: "R",
                    kind: LEVEL255,
                    optional: true,
                    init_from: None,
                },
                ParamDef {
                    id: "G",
                    kind: LEVEL255,
                    optional: true,
                    init_from: None,
                },
                ParamDef {
                    id: "B",
                    kind: LEVEL255,
                    optional: true,
                    init_from: None,
                },
                ParamDef {
                    id: "D",
                    kind: num(Unit::Seconds),
                    optional: true,
                    init_from: None,
                },
                ParamDef {
                    id: "F",
                    kind: num(Unit::Seconds),
                    optional: true,
                    init_from: None,
                },
            ],
            target: CommandTarget::CommandTopic,
            payload: PayloadPlan::Template(&[
                FieldSpec {
                    path: &["state"],
                    source: FieldSource::Const("ON"),
                },
                FieldSpec {
                    path: &["brightness"],
                    source: FieldSource::Param("I"),
                },
                FieldSpec {
                    path: &["color", "r"],
                    source: FieldSource::Param("R"),
                },
                FieldSpec {
                    path: &["color", "g"],
                    source: FieldSource::Param("G"),
                },
                FieldSpec {
                    path: &["color", "b"],
                    source: FieldSource::Param("B"),
                },
                FieldSpec {
                    path: &["transition"],
                    source: FieldSource::Param("D"),
                },
                FieldSpec {
                    path: &["flash"],
                    source: FieldSource::Param("F"),
                },
            ]),
            report: None,
        },
        QUERY_REPORT_ONLY,
    ],
    announce: Some(ANNOUNCE_ON_CHANGE),
};

/// Free-form condition flag. Announces DON on every update so scenes
/// can react to repeated reports of the same state.
pub static FLAG: TypeSchema = TypeSchema {
    type_name: "flag",
    topics: TopicPlan::Single,
    slots: &[scalar_slot("ST", Coerce::Token(&FLAG_STATES))],
    statuses: &[StatusDef {
        id: "ST",
        kind: ValueKind::Enum(&FLAG_STATES),
    }],
    sent_commands: &["DON", "DOF"],
    commands: &[
        CommandDef {
            id: "RESET",
            params: &[],
            target: CommandTarget::CommandTopic,
            payload: PayloadPlan::Fixed("RESET"),
            report: Some("DOF"),
        },
        QUERY_PUBLISH,
    ],
    announce: Some(AnnounceRule {
        status: "ST",
        don_when: DonWhen::Always,
        fire: AnnounceFire::EveryUpdate,
    }),
};

const TEMP_HUMID_SLOT: SlotSchema = SlotSchema {
    suffix: None,
    presence: Some("ST"),
    decode: SlotDecode::Json(JsonRule {
        unwrap_status_sns: true,
        envelope: Envelope::Sensor { fallbacks: &[] },
        fields: &[
            field(&["Temperature"], "CLITEMP", NUM),
            field(&["Humidity"], "CLIHUM", NUM),
            field(&["DewPoint"], "DEWPT", NUM),
        ],
    }),
};

/// DHT-family temperature/humidity sensor (AM2301 etc.) behind Tasmota.
pub static TEMP_HUMID: TypeSchema = TypeSchema {
    type_name: "TempHumid",
    topics: TopicPlan::Derived(STATUS10),
    slots: &[TEMP_HUMID_SLOT, TEMP_HUMID_SLOT],
    statuses: &[
        StatusDef {
            id: "ST",
            kind: ValueKind::Bool,
        },
        StatusDef {
            id: "CLITEMP",
            kind: num(Unit::Fahrenheit),
        },
        StatusDef {
            id: "CLIHUM",
            kind: num(Unit::HumidityPercent),
        },
        StatusDef {
            id: "DEWPT",
            kind: num(Unit::Fahrenheit),
        },
    ],
    sent_commands: &[],
    commands: &[QUERY_STATUS10],
    announce: None,
};

const TEMP_SLOT: SlotSchema = SlotSchema {
    suffix: None,
    presence: Some("ST"),
    decode: SlotDecode::Json(JsonRule {
        unwrap_status_sns: true,
        envelope: Envelope::Sensor {
            fallbacks: &["DS18B20"],
        },
        fields: &[field(&["Temperature"], "CLITEMP", NUM)],
    }),
};

/// DS18B20 temperature-only sensor behind Tasmota.
pub static TEMP: TypeSchema = TypeSchema {
    type_name: "Temp",
    topics: TopicPlan::Derived(STATUS10),
    slots: &[TEMP_SLOT, TEMP_SLOT],
    statuses: &[
        StatusDef {
            id: "ST",
            kind: ValueKind::Bool,
        },
        StatusDef {
            id: "CLITEMP",
            kind: num(Unit::Fahrenheit),
        },
    ],
    sent_commands: &[],
    commands: &[QUERY_STATUS10],
    announce: None,
};

/// Pressure arrives in hPa; the controller's editor wants inHg.
const HPA_TO_INHG: f64 = 0.029_529_987_51;

const TEMP_HUMID_PRESS_SLOT: SlotSchema = SlotSchema {
    suffix: None,
    presence: Some("ST"),
    decode: SlotDecode::Json(JsonRule {
        unwrap_status_sns: true,
        envelope: Envelope::Sensor { fallbacks: &[] },
        fields: &[
            field(&["Temperature"], "CLITEMP", NUM),
            field(&["Humidity"], "CLIHUM", NUM),
            field(&["DewPoint"], "DEWPT", NUM),
            field(
                &["Pressure"],
                "BARPRES",
                Coerce::Number {
                    scale: Some(HPA_TO_INHG),
                    round: Some(2),
                },
            ),
        ],
    }),
};

/// BME280 temperature/humidity/pressure sensor behind Tasmota.
pub static TEMP_HUMID_PRESS: TypeSchema = TypeSchema {
    type_name: "TempHumidPress",
    topics: TopicPlan::Derived(STATUS10),
    slots: &[TEMP_HUMID_PRESS_SLOT, TEMP_HUMID_PRESS_SLOT],
    statuses: &[
        StatusDef {
            id: "ST",
            kind: ValueKind::Bool,
        },
        StatusDef {
            id: "CLITEMP",
            kind: num(Unit::Fahrenheit),
        },
        StatusDef {
            id: "CLIHUM",
            kind: num(Unit::HumidityPercent),
        },
        StatusDef {
            id: "DEWPT",
            kind: num(Unit::Fahrenheit),
        },
        StatusDef {
            id: "BARPRES",
            kind: num(Unit::InchesMercury),
        },
    ],
    sent_commands: &[],
    commands: &[QUERY_STATUS10],
    announce: None,
};

/// HC-SR04 ultrasonic distance sensor. Centimeters under an `SR04` key.
pub static DISTANCE: TypeSchema = TypeSchema {
    type_name: "distance",
    topics: TopicPlan::Single,
    slots: &[SlotSchema {
        suffix: None,
        presence: Some("ST"),
        decode: SlotDecode::Json(JsonRule {
            unwrap_status_sns: false,
            envelope: Envelope::Fixed { key: "SR04" },
            fields: &[field(&["Distance"], "DISTANC", NUM)],
        }),
    }],
    statuses: &[
        StatusDef {
            id: "ST",
            kind: ValueKind::Bool,
        },
        StatusDef {
            id: "DISTANC",
            kind: num(Unit::Centimeter),
        },
    ],
    sent_commands: &[],
    commands: &[QUERY_REPORT_ONLY],
    announce: None,
};

/// Shelly flood sensor: one bare-scalar topic per reading, routed by
/// the trailing segment. Any recognized message also marks the device
/// alive via ST.
pub static SHELLY_FLOOD: TypeSchema = TypeSchema {
    type_name: "shellyflood",
    topics: TopicPlan::BySuffix,
    slots: &[
        SlotSchema {
            suffix: Some("temperature"),
            presence: Some("ST"),
            decode: SlotDecode::Scalar(ScalarRule {
                status: "CLITEMP",
                coerce: NUM,
            }),
        },
        SlotSchema {
            suffix: Some("flood"),
            presence: Some("ST"),
            decode: SlotDecode::Scalar(ScalarRule {
                status: "GV0",
                coerce: Coerce::WordFlag {
                    word: "true",
                    on_value: 1,
                    fold: true,
                },
            }),
        },
        SlotSchema {
            suffix: Some("battery"),
            presence: Some("ST"),
            decode: SlotDecode::Scalar(ScalarRule {
                status: "BATLVL",
                coerce: NUM,
            }),
        },
        SlotSchema {
            suffix: Some("error"),
            presence: Some("ST"),
            decode: SlotDecode::Scalar(ScalarRule {
                status: "GPV",
                coerce: NUM,
            }),
        },
    ],
    statuses: &[
        StatusDef {
            id: "ST",
            kind: ValueKind::Bool,
        },
        StatusDef {
            id: "CLITEMP",
            kind: num(Unit::Fahrenheit),
        },
        StatusDef {
            id: "GV0",
            kind: ValueKind::Bool,
        },
        StatusDef {
            id: "BATLVL",
            kind: ValueKind::Percent,
        },
        StatusDef {
            id: "GPV",
            kind: num(Unit::Raw),
        },
    ],
    sent_commands: &[],
    commands: &[QUERY_REPORT_ONLY],
    announce: None,
};

const ANALOG_SLOT: SlotSchema = SlotSchema {
    suffix: None,
    presence: Some("ST"),
    decode: SlotDecode::Json(JsonRule {
        unwrap_status_sns: true,
        envelope: Envelope::Analog,
        fields: &[field(&[], "GPV", NUM)],
    }),
};

/// ADC input behind Tasmota's `ANALOG` block.
pub static ANALOG: TypeSchema = TypeSchema {
    type_name: "analog",
    topics: TopicPlan::Derived(STATUS10),
    slots: &[ANALOG_SLOT, ANALOG_SLOT],
    statuses: &[
        StatusDef {
            id: "ST",
            kind: ValueKind::Bool,
        },
        StatusDef {
            id: "GPV",
            kind: num(Unit::Raw),
        },
    ],
    sent_commands: &[],
    commands: &[QUERY_STATUS10],
    announce: None,
};

/// Sonoff S31 power telemetry (pair with a `switch` for control).
pub static S31: TypeSchema = TypeSchema {
    type_name: "s31",
    topics: TopicPlan::Single,
    slots: &[SlotSchema {
        suffix: None,
        presence: Some("ST"),
        decode: SlotDecode::Json(JsonRule {
            unwrap_status_sns: false,
            envelope: Envelope::Fixed { key: "ENERGY" },
            fields: &[
                field(&["Current"], "CC", NUM),
                field(&["Power"], "CPW", NUM),
                field(&["Voltage"], "CV", NUM),
                field(&["Factor"], "PF", NUM),
                field(&["Total"], "TPW", NUM),
            ],
        }),
    }],
    statuses: &[
        StatusDef {
            id: "ST",
            kind: ValueKind::Bool,
        },
        StatusDef {
            id: "CC",
            kind: num(Unit::Ampere),
        },
        StatusDef {
            id: "CPW",
            kind: num(Unit::Watt),
        },
        StatusDef {
            id: "CV",
            kind: num(Unit::Volt),
        },
        StatusDef {
            id: "PF",
            kind: num(Unit::PowerFactor),
        },
        StatusDef {
            id: "TPW",
            kind: num(Unit::KilowattHour),
        },
    ],
    sent_commands: &[],
    commands: &[QUERY_REPORT_ONLY],
    announce: None,
};

/// Bare integer payload, no structure at all.
pub static RAW: TypeSchema = TypeSchema {
    type_name: "raw",
    topics: TopicPlan::Single,
    slots: &[SlotSchema {
        suffix: None,
        presence: Some("ST"),
        decode: SlotDecode::Scalar(ScalarRule {
            status: "GV1",
            coerce: Coerce::Integer,
        }),
    }],
    statuses: &[
        StatusDef {
            id: "ST",
            kind: ValueKind::Bool,
        },
        StatusDef {
            id: "GV1",
            kind: num(Unit::Raw),
        },
    ],
    sent_commands: &[],
    commands: &[QUERY_REPORT_ONLY],
    announce: None,
};

/// RGBW strip controller. Announces on every state-bearing message.
pub static RGBW: TypeSchema = TypeSchema {
    type_name: "RGBW",
    topics: TopicPlan::Single,
    slots: &[SlotSchema {
        suffix: None,
        presence: None,
        decode: SlotDecode::Json(JsonRule {
            unwrap_status_sns: false,
            envelope: Envelope::Root,
            fields: &[
                field(
                    &["state"],
                    "GV0",
                    Coerce::WordFlag {
                        word: "ON",
                        on_value: 100,
                        fold: false,
                    },
                ),
                field(&["br"], "GV1", NUM),
                field(&["c", "r"], "GV2", NUM),
                field(&["c", "g"], "GV3", NUM),
                field(&["c", "b"], "GV4", NUM),
                field(&["c", "w"], "GV5", NUM),
                field(&["pgm"], "GV6", NUM),
            ],
        }),
    }],
    statuses: &[
        StatusDef {
            id: "GV0",
            kind: ValueKind::OnOff,
        },
        StatusDef {
            id: "GV1",
            kind: LEVEL255,
        },
        StatusDef {
            id: "GV2",
            kind: LEVEL255,
        },
        StatusDef {
            id: "GV3",
            kind: LEVEL255,
        },
        StatusDef {
            id: "GV4",
            kind: LEVEL255,
        },
        StatusDef {
            id: "GV5",
            kind: LEVEL255,
        },
        StatusDef {
            id: "GV6",
            kind: LEVEL255,
        },
    ],
    sent_commands: &["DON", "DOF"],
    commands: &[
        CommandDef {
            id: "DON",
            params: &[],
            target: CommandTarget::CommandTopic,
            payload: PayloadPlan::Fixed(r#"{"state":"ON"}"#),
            report: None,
        },
        CommandDef {
            id: "DOF",
            params: &[],
            target: CommandTarget::CommandTopic,
            payload: PayloadPlan::Fixed(r#"{"state":"OFF"}"#),
            report: None,
        },
        CommandDef {
            id: "SETRGBW",
            params: &[
                ParamDef {
                    id: "STRIPI",
                    kind: LEVEL255,
                    optional: true,
                    init_from: None,
                },
                ParamDef {
                    id: "STRIPR",
                    kind: LEVEL255,
                    optional: true,
                    init_from: None,
                },
                ParamDef {
                    id: "STRIPG",
                    kind: LEVEL255,
                    optional: true,
                    init_from: None,
                },
                ParamDef {
                    id: "STRIPB",
                    kind: LEVEL255,
                    optional: true,
                    init_from: None,
                },
                ParamDef {
                    id: "STRIPW",
                    kind: LEVEL255,
                    optional: true,
                    init_from: None,
                },
                ParamDef {
                    id: "STRIPP",
                    kind: LEVEL255,
                    optional: true,
                    init_from: None,
                },
            ],
            target: CommandTarget::CommandTopic,
            payload: PayloadPlan::Template(&[
                FieldSpec {
                    path: &["state"],
                    source: FieldSource::Const("ON"),
                },
                FieldSpec {
                    path: &["br"],
                    source: FieldSource::Param("STRIPI"),
                },
                FieldSpec {
                    path: &["c", "r"],
                    source: FieldSource::Param("STRIPR"),
                },
                FieldSpec {
                    path: &["c", "g"],
                    source: FieldSource::Param("STRIPG"),
                },
                FieldSpec {
                    path: &["c", "b"],
                    source: FieldSource::Param("STRIPB"),
                },
                FieldSpec {
                    path: &["c", "w"],
                    source: FieldSource::Param("STRIPW"),
                },
                FieldSpec {
                    path: &["pgm"],
                    source: FieldSource::Param("STRIPP"),
                },
            ]),
            report: None,
        },
        QUERY_REPORT_ONLY,
    ],
    announce: Some(AnnounceRule {
        status: "GV0",
        don_when: DonWhen::NonZero,
        fire: AnnounceFire::EveryUpdate,
    }),
};

/// ratgdo garage controller. One bare-scalar topic per aspect under
/// `<base>/status/`, commands under `<base>/command/`.
pub static RATGDO: TypeSchema = TypeSchema {
    type_name: "ratgdo",
    topics: TopicPlan::Fanout {
        infix: Some("status"),
    },
    slots: &[
        SlotSchema {
            suffix: Some("availability"),
            presence: None,
            decode: SlotDecode::Scalar(ScalarRule {
                status: "ST",
                coerce: Coerce::WordFlag {
                    word: "online",
                    on_value: 1,
                    fold: false,
                },
            }),
        },
        SlotSchema {
            suffix: Some("light"),
            presence: None,
            decode: SlotDecode::Scalar(ScalarRule {
                status: "GV0",
                coerce: Coerce::WordFlag {
                    word: "on",
                    on_value: 1,
                    fold: false,
                },
            }),
        },
        SlotSchema {
            suffix: Some("door"),
            presence: None,
            decode: SlotDecode::Scalar(ScalarRule {
                status: "GV1",
                coerce: Coerce::Token(&DOOR_STATES),
            }),
        },
        SlotSchema {
            suffix: Some("motion"),
            presence: None,
            decode: SlotDecode::Scalar(ScalarRule {
                status: "GV2",
                coerce: Coerce::WordFlag {
                    word: "detected",
                    on_value: 1,
                    fold: false,
                },
            }),
        },
        SlotSchema {
            suffix: Some("lock"),
            presence: None,
            decode: SlotDecode::Scalar(ScalarRule {
                status: "GV3",
                coerce: Coerce::WordFlag {
                    word: "locked",
                    on_value: 1,
                    fold: false,
                },
            }),
        },
        SlotSchema {
            suffix: Some("obstruction"),
            presence: None,
            decode: SlotDecode::Scalar(ScalarRule {
                status: "GV4",
                coerce: Coerce::WordFlag {
                    word: "obstructed",
                    on_value: 1,
                    fold: false,
                },
            }),
        },
    ],
    statuses: &[
        StatusDef {
            id: "ST",
            kind: ValueKind::Bool,
        },
        StatusDef {
            id: "GV0",
            kind: ValueKind::Bool,
        },
        StatusDef {
            id: "GV1",
            kind: ValueKind::Enum(&DOOR_STATES),
        },
        StatusDef {
            id: "GV2",
            kind: ValueKind::Bool,
        },
        StatusDef {
            id: "GV3",
            kind: ValueKind::Bool,
        },
        StatusDef {
            id: "GV4",
            kind: ValueKind::Bool,
        },
    ],
    sent_commands: &[],
    commands: &[
        CommandDef {
            id: "DON",
            params: &[],
            target: CommandTarget::Suffixed("command/light"),
            payload: PayloadPlan::Fixed("on"),
            report: None,
        },
        CommandDef {
            id: "DOF",
            params: &[],
            target: CommandTarget::Suffixed("command/light"),
            payload: PayloadPlan::Fixed("off"),
            report: None,
        },
        CommandDef {
            id: "OPEN",
            params: &[],
            target: CommandTarget::Suffixed("command/door"),
            payload: PayloadPlan::Fixed("open"),
            report: None,
        },
        CommandDef {
            id: "CLOSE",
            params: &[],
            target: CommandTarget::Suffixed("command/door"),
            payload: PayloadPlan::Fixed("close"),
            report: None,
        },
        CommandDef {
            id: "STOP",
            params: &[],
            target: CommandTarget::Suffixed("command/door"),
            payload: PayloadPlan::Fixed("stop"),
            report: None,
        },
        CommandDef {
            id: "LOCK",
            params: &[],
            target: CommandTarget::Suffixed("command/lock"),
            payload: PayloadPlan::Fixed("lock"),
            report: None,
        },
        CommandDef {
            id: "UNLOCK",
            params: &[],
            target: CommandTarget::Suffixed("command/lock"),
            payload: PayloadPlan::Fixed("unlock"),
            report: None,
        },
        // Clears motion by writing to the status topic the device itself
        // publishes on; the echo comes back through the normal pipeline.
        CommandDef {
            id: "MCLEAR",
            params: &[],
            target: CommandTarget::Suffixed("status/motion"),
            payload: PayloadPlan::Fixed("Clear"),
            report: None,
        },
        QUERY_REPORT_ONLY,
    ],
    announce: None,
};

/// Droplet flow sensor. Publishes `<base>/state` (JSON) and
/// `<base>/health` (LWT text); accepts nothing.
pub static DROPLET: TypeSchema = TypeSchema {
    type_name: "droplet",
    topics: TopicPlan::Fanout { infix: None },
    slots: &[
        SlotSchema {
            suffix: Some("state"),
            presence: None,
            decode: SlotDecode::Json(JsonRule {
                unwrap_status_sns: false,
                envelope: Envelope::Root,
                fields: &[
                    field(&["server"], "ST", Coerce::Token(&SERVER_STATES)),
                    field(&["signal"], "GV0", Coerce::Token(&SIGNAL_STATES)),
                    // Volume arrives in mL, flow in L/min; the editors
                    // want L and L/h.
                    field(
                        &["volume"],
                        "WVOL",
                        Coerce::Number {
                            scale: Some(0.001),
                            round: None,
                        },
                    ),
                    field(
                        &["flow"],
                        "WATERF",
                        Coerce::Number {
                            scale: Some(60.0),
                            round: None,
                        },
                    ),
                ],
            }),
        },
        SlotSchema {
            suffix: Some("health"),
            presence: None,
            decode: SlotDecode::Scalar(ScalarRule {
                status: "GV1",
                coerce: Coerce::WordFlag {
                    word: "online",
                    on_value: 1,
                    fold: true,
                },
            }),
        },
    ],
    statuses: &[
        StatusDef {
            id: "ST",
            kind: ValueKind::Enum(&SERVER_STATES),
        },
        StatusDef {
            id: "GV0",
            kind: ValueKind::Enum(&SIGNAL_STATES),
        },
        StatusDef {
            id: "GV1",
            kind: ValueKind::Bool,
        },
        StatusDef {
            id: "WVOL",
            kind: num(Unit::Liter),
        },
        StatusDef {
            id: "WATERF",
            kind: num(Unit::LitersPerHour),
        },
    ],
    sent_commands: &["DON", "DOF"],
    commands: &[QUERY_REPORT_ONLY],
    // Server index 0 means connected, so zero announces DON.
    announce: Some(AnnounceRule {
        status: "ST",
        don_when: DonWhen::Zero,
        fire: AnnounceFire::EveryUpdate,
    }),
};

/// The controller pseudo-device. Not routable; owned by the service,
/// which answers QUERY and DISCOVER itself and drives the heartbeat.
pub static CONTROLLER: TypeSchema = TypeSchema {
    type_name: CONTROLLER_TYPE,
    topics: TopicPlan::Single,
    slots: &[],
    statuses: &[
        StatusDef {
            id: "ST",
            kind: ValueKind::Enum(&LINK_STATES),
        },
        StatusDef {
            id: "GV0",
            kind: num(Unit::Count),
        },
    ],
    sent_commands: &["DON", "DOF"],
    commands: &[
        QUERY_REPORT_ONLY,
        CommandDef {
            id: "DISCOVER",
            params: &[],
            target: CommandTarget::None,
            payload: PayloadPlan::Fixed(""),
            report: None,
        },
    ],
    announce: None,
};

/// Every schema in the catalogue, controller included.
pub static ALL: &[&TypeSchema] = &[
    &CONTROLLER,
    &SWITCH,
    &DIMMER,
    &FAN,
    &SENSOR,
    &FLAG,
    &TEMP_HUMID,
    &TEMP,
    &TEMP_HUMID_PRESS,
    &DISTANCE,
    &SHELLY_FLOOD,
    &ANALOG,
    &S31,
    &RAW,
    &RGBW,
    &RATGDO,
    &DROPLET,
];

/// Look up a schema by its configuration type string.
pub fn find(type_name: &str) -> Option<&'static TypeSchema> {
    ALL.iter().find(|s| s.type_name == type_name).copied()
}
