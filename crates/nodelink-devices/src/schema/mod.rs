//! Static schema machinery for the supported device types.
//!
//! Every device type the bridge understands is described by a
//! [`TypeSchema`]: how its topics map to decode slots, how each slot's
//! payload becomes typed status updates, which commands it accepts and
//! how those render into (topic, payload) pairs. The tables themselves
//! live in [`catalogue`]; this module defines the vocabulary they are
//! written in plus the consistency checks run over them at load time.

pub mod catalogue;

use nodelink_core::{EnumTable, Value, ValueKind};

use crate::error::LoadError;

/// How a type's declared status topics map to decode slots.
#[derive(Debug, Clone, Copy)]
pub enum TopicPlan {
    /// One declared topic, decoded by slot 0.
    Single,
    /// One declared topic (slot 0) plus derived companion topics, one
    /// per derivation, bound to slots 1..
    Derived(&'static [TopicDerivation]),
    /// Several declared topics, each matched to a slot by its trailing
    /// path segment.
    BySuffix,
    /// One declared base topic expanded to `base[/infix]/suffix` per
    /// slot.
    Fanout { infix: Option<&'static str> },
}

/// A companion topic derived from the declared status topic.
#[derive(Debug, Clone, Copy)]
pub struct TopicDerivation {
    /// Replacement for the topic's last path segment.
    pub replace_tail: &'static str,
    /// Prefix rewrite applied after the tail swap (Tasmota query
    /// responses arrive on `stat/` while telemetry arrives on `tele/`).
    pub swap_prefix: Option<(&'static str, &'static str)>,
}

/// One decode slot: which payload shape arrives there and how to read it.
#[derive(Debug)]
pub struct SlotSchema {
    /// Trailing topic segment, required by `BySuffix` and `Fanout` plans.
    pub suffix: Option<&'static str>,
    /// Status forced to 1 whenever this slot decodes a recognizable
    /// message (device-is-alive marker).
    pub presence: Option<&'static str>,
    /// Payload decode rule.
    pub decode: SlotDecode,
}

/// Payload shape of a slot.
#[derive(Debug)]
pub enum SlotDecode {
    /// Bare scalar payload coerced into a single status.
    Scalar(ScalarRule),
    /// JSON object payload with per-field extraction rules.
    Json(JsonRule),
}

/// Coercion of a bare payload into one status value.
#[derive(Debug, Clone, Copy)]
pub struct ScalarRule {
    pub status: &'static str,
    pub coerce: Coerce,
}

/// Extraction rules for a JSON object payload.
#[derive(Debug)]
pub struct JsonRule {
    /// Strip a Tasmota `StatusSNS` wrapper before extraction.
    pub unwrap_status_sns: bool,
    /// Container the declared fields are nested in.
    pub envelope: Envelope,
    /// Field rules, applied in order; later rules win on the same status.
    pub fields: &'static [FieldRule],
}

/// Container resolution inside a JSON payload.
#[derive(Debug, Clone, Copy)]
pub enum Envelope {
    /// Fields live at the object root.
    Root,
    /// Fields live under the configured sensor id key, falling back to
    /// the listed hardware keys when no sensor id is configured.
    Sensor { fallbacks: &'static [&'static str] },
    /// Fields live under a fixed key.
    Fixed { key: &'static str },
    /// Tasmota `ANALOG` block: a single reading keyed by sensor id, or
    /// the first entry when no sensor id is configured.
    Analog,
}

/// One JSON field to extract.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    /// Key path inside the envelope; empty means the envelope value
    /// itself (used by the `Analog` envelope).
    pub path: &'static [&'static str],
    /// Target status id.
    pub status: &'static str,
    /// Raw-to-value coercion.
    pub coerce: Coerce,
}

/// Raw payload fragment to typed value coercion.
///
/// Word coercions are total (anything that is not the word maps to the
/// off value) because the firmwares they front send free-form text;
/// token coercions reject unknown input instead, since an unexpected
/// enum token means the schema and the device disagree.
#[derive(Debug, Clone, Copy)]
pub enum Coerce {
    /// Numeric field, optionally scaled then rounded to `round` decimals.
    Number { scale: Option<f64>, round: Option<u32> },
    /// Integer taken as-is; anything else is an error.
    Integer,
    /// Case-insensitive ON/OFF mapped to 100/0; anything else is an
    /// error.
    OnOff,
    /// The word maps to `on_value`, anything else to 0. `fold` compares
    /// trimmed and case-insensitively.
    WordFlag {
        word: &'static str,
        on_value: i64,
        fold: bool,
    },
    /// The word maps to 0, anything else to 1.
    FalsyWord { word: &'static str },
    /// Token looked up in an enum table; unknown tokens are an error.
    Token(&'static EnumTable),
    /// Tasmota `POWER`: "OFF" maps to 0, "ON" carries no level and is
    /// skipped, anything else is an error.
    OffToZero,
}

/// A status declared by a type, with its value kind.
#[derive(Debug, Clone, Copy)]
pub struct StatusDef {
    pub id: &'static str,
    pub kind: ValueKind,
}

/// Controller-facing DON/DOF announcement tied to one status.
#[derive(Debug, Clone, Copy)]
pub struct AnnounceRule {
    /// Status whose updates drive the announcement.
    pub status: &'static str,
    /// Which values count as "on".
    pub don_when: DonWhen,
    /// Fire on every update, or only when the on/off class flips.
    pub fire: AnnounceFire,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DonWhen {
    /// Nonzero values are on.
    NonZero,
    /// Zero is on (flow sensors index "connected" as 0).
    Zero,
    /// Every value is on.
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnounceFire {
    /// Announce only when the on/off class changes. A device that has
    /// never reported counts as off.
    OnChange,
    /// Announce on every update of the tracked status.
    EveryUpdate,
}

impl AnnounceRule {
    /// Whether a value falls in the "on" class.
    pub fn is_on(&self, value: Value) -> bool {
        match self.don_when {
            DonWhen::NonZero => value.as_bool(),
            DonWhen::Zero => !value.as_bool(),
            DonWhen::Always => true,
        }
    }

    /// The command announced for a value.
    pub fn command_for(&self, value: Value) -> &'static str {
        if self.is_on(value) { "DON" } else { "DOF" }
    }
}

/// One outbound command accepted by a device type.
#[derive(Debug)]
pub struct CommandDef {
    pub id: &'static str,
    pub params: &'static [ParamDef],
    /// Where the encoded payload publishes.
    pub target: CommandTarget,
    /// How the payload is built.
    pub payload: PayloadPlan,
    /// Command announced back to the controller after the publish.
    pub report: Option<&'static str>,
}

/// Publish target of a command, relative to the device's command topic.
#[derive(Debug, Clone, Copy)]
pub enum CommandTarget {
    /// The command topic itself.
    CommandTopic,
    /// Command topic with its last path segment replaced.
    ReplaceTail(&'static str),
    /// Command topic with a segment path appended.
    Suffixed(&'static str),
    /// No publish; the command is answered from the cache alone.
    None,
}

/// Payload construction rule.
#[derive(Debug)]
pub enum PayloadPlan {
    /// Fixed string payload.
    Fixed(&'static str),
    /// One parameter rendered as the bare payload, with a literal
    /// fallback when neither a supplied value nor an `init_from` status
    /// resolves.
    Scalar {
        param: &'static str,
        fallback: Option<&'static str>,
    },
    /// Cached status stepped by `delta`, clamped, rendered bare.
    Step {
        status: &'static str,
        delta: i64,
        min: i64,
        max: i64,
    },
    /// JSON object built from constant and parameter fields. Unresolved
    /// optional parameters are omitted and empty nested objects pruned.
    Template(&'static [FieldSpec]),
}

/// One field of a template payload.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub path: &'static [&'static str],
    pub source: FieldSource,
}

#[derive(Debug, Clone, Copy)]
pub enum FieldSource {
    /// Literal string value.
    Const(&'static str),
    /// Supplied (or default-resolved) parameter.
    Param(&'static str),
}

/// Declared command parameter.
#[derive(Debug, Clone, Copy)]
pub struct ParamDef {
    pub id: &'static str,
    pub kind: ValueKind,
    pub optional: bool,
    /// Status whose cached value seeds the parameter when not supplied.
    pub init_from: Option<&'static str>,
}

/// Complete compiled-in schema for one device type.
#[derive(Debug)]
pub struct TypeSchema {
    /// Configuration type string ("switch", "TempHumid", ...).
    pub type_name: &'static str,
    pub topics: TopicPlan,
    pub slots: &'static [SlotSchema],
    pub statuses: &'static [StatusDef],
    /// Commands the type sends to the controller unprompted.
    pub sent_commands: &'static [&'static str],
    /// Commands accepted from the controller.
    pub commands: &'static [CommandDef],
    pub announce: Option<AnnounceRule>,
}

impl TypeSchema {
    /// Look up a declared status.
    pub fn status(&self, id: &str) -> Option<&StatusDef> {
        self.statuses.iter().find(|s| s.id == id)
    }

    /// Look up an accepted command.
    pub fn command(&self, id: &str) -> Option<&CommandDef> {
        self.commands.iter().find(|c| c.id == id)
    }

    /// Whether any accepted command publishes to a topic.
    pub fn publishes_commands(&self) -> bool {
        self.commands
            .iter()
            .any(|c| !matches!(c.target, CommandTarget::None))
    }

    /// Declared topic count for plans with a fixed count, or `None`
    /// for `BySuffix` (which takes one or more).
    pub fn declared_topic_count(&self) -> Option<usize> {
        match self.topics {
            TopicPlan::Single | TopicPlan::Fanout { .. } => Some(1),
            TopicPlan::Derived(_) => Some(1),
            TopicPlan::BySuffix => None,
        }
    }

    /// Check internal consistency: every status referenced by a slot,
    /// command, or announce rule must be declared.
    ///
    /// Runs once per type at table build; a failure here is a bug in
    /// the catalogue, not in user configuration.
    pub fn verify(&self) -> Result<(), LoadError> {
        let check = |id: &'static str, what: &str| -> Result<(), LoadError> {
            if self.status(id).is_none() {
                return Err(self.bad(format!("{what} references undeclared status '{id}'")));
            }
            Ok(())
        };

        // The controller pseudo-type is service-owned and never routed,
        // so it alone may declare no slots.
        let suffixed = matches!(self.topics, TopicPlan::BySuffix | TopicPlan::Fanout { .. });
        if self.slots.is_empty() && self.type_name != catalogue::CONTROLLER_TYPE {
            return Err(self.bad("no decode slots".to_string()));
        }
        if let TopicPlan::Derived(derivations) = self.topics {
            if self.slots.len() != derivations.len() + 1 {
                return Err(self.bad(format!(
                    "{} derivations but {} slots",
                    derivations.len(),
                    self.slots.len()
                )));
            }
        }
        if matches!(self.topics, TopicPlan::Single) && self.slots.len() > 1 {
            return Err(self.bad("single-topic plan with more than one slot".to_string()));
        }

        for slot in self.slots {
            if suffixed && slot.suffix.is_none() {
                return Err(self.bad("suffix-routed slot without a suffix".to_string()));
            }
            if let Some(presence) = slot.presence {
                check(presence, "slot presence")?;
            }
            match &slot.decode {
                SlotDecode::Scalar(rule) => check(rule.status, "scalar slot")?,
                SlotDecode::Json(rule) => {
                    for field in rule.fields {
                        check(field.status, "field rule")?;
                    }
                }
            }
        }

        for command in self.commands {
            for param in command.params {
                if let Some(status) = param.init_from {
                    check(status, "parameter init_from")?;
                }
            }
            match &command.payload {
                PayloadPlan::Step { status, .. } => check(*status, "step payload")?,
                PayloadPlan::Scalar { param, .. } => {
                    if !command.params.iter().any(|p| p.id == *param) {
                        return Err(self.bad(format!(
                            "scalar payload references undeclared parameter '{param}'"
                        )));
                    }
                }
                PayloadPlan::Template(fields) => {
                    for field in fields.iter() {
                        if let FieldSource::Param(param) = field.source {
                            if !command.params.iter().any(|p| p.id == param) {
                                return Err(self.bad(format!(
                                    "template references undeclared parameter '{param}'"
                                )));
                            }
                        }
                    }
                }
                PayloadPlan::Fixed(_) => {}
            }
            if let Some(report) = command.report {
                if !self.sent_commands.contains(&report) {
                    return Err(self.bad(format!(
                        "command '{}' reports '{report}' which is not a sent command",
                        command.id
                    )));
                }
            }
        }

        if let Some(rule) = &self.announce {
            check(rule.status, "announce rule")?;
            if !self.sent_commands.contains(&"DON") || !self.sent_commands.contains(&"DOF") {
                return Err(self.bad("announce rule without DON/DOF in sent commands".to_string()));
            }
        }

        Ok(())
    }

    fn bad(&self, detail: String) -> LoadError {
        LoadError::BadSchema {
            type_name: self.type_name,
            detail,
        }
    }
}
