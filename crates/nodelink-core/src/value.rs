//! Typed values shared between the decode and command paths.
//!
//! Every status a device reports and every parameter a command accepts is
//! declared with a [`ValueKind`]; the runtime representation is the small
//! [`Value`] enum. Kinds carry enough information to validate supplied
//! command parameters and to tell the controller which editor (UOM code)
//! to render a value with.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A decoded or supplied scalar value.
///
/// Equality is value-based with no implicit rounding; the decoder always
/// produces the same variant for a given status, so cached comparisons
/// never cross variants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
}

impl Value {
    /// Interpret the value as a boolean (nonzero numbers are true).
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
        }
    }

    /// Interpret the value as an integer, if it is one (or a whole float).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Float(_) => None,
        }
    }

    /// Interpret the value as a float.
    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
        }
    }

    /// True for numeric variants.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Physical or logical unit of a numeric status, mapped to the
/// controller's editor (UOM) codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Ampere,
    Fahrenheit,
    HumidityPercent,
    InchesMercury,
    KilowattHour,
    Liter,
    LitersPerHour,
    Lux,
    Centimeter,
    Count,
    Level,
    PowerFactor,
    Raw,
    Seconds,
    Volt,
    Watt,
}

impl Unit {
    /// Controller editor code for this unit.
    pub fn uom(&self) -> u8 {
        match self {
            Unit::Ampere => 1,
            Unit::Centimeter => 5,
            Unit::Fahrenheit => 17,
            Unit::HumidityPercent => 22,
            Unit::InchesMercury => 23,
            Unit::KilowattHour => 33,
            Unit::Liter => 35,
            Unit::Lux => 36,
            Unit::PowerFactor => 53,
            Unit::Raw => 56,
            Unit::Seconds => 58,
            Unit::Volt => 72,
            Unit::Watt => 73,
            Unit::Level => 100,
            Unit::Count => 107,
            Unit::LitersPerHour => 130,
        }
    }
}

/// Token-to-ordinal table backing an enumerated status.
#[derive(Debug)]
pub struct EnumTable {
    /// Table name, used in error reports.
    pub name: &'static str,
    /// Token/ordinal pairs in declaration order.
    pub entries: &'static [(&'static str, i64)],
}

impl EnumTable {
    /// Ordinal for a raw token, if declared.
    pub fn ordinal(&self, token: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|(t, _)| *t == token)
            .map(|(_, v)| *v)
    }

    /// Token for an ordinal, if declared.
    pub fn token(&self, ordinal: i64) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(_, v)| *v == ordinal)
            .map(|(t, _)| *t)
    }

    /// Whether an ordinal is part of the table.
    pub fn contains_ordinal(&self, ordinal: i64) -> bool {
        self.entries.iter().any(|(_, v)| *v == ordinal)
    }
}

/// Declared kind of a status or command parameter.
///
/// The kind drives payload coercion on the decode path, validation of
/// supplied values on the command path, and the editor code reported to
/// the controller.
#[derive(Debug, Clone, Copy)]
pub enum ValueKind {
    /// Plain boolean (editor 2).
    Bool,
    /// On/off state surfaced to the controller as 0/100 (editor 78).
    OnOff,
    /// Enumerated token with a fixed ordinal table (editor 25).
    Enum(&'static EnumTable),
    /// Number with a unit and an optional inclusive range.
    Numeric {
        unit: Unit,
        min: Option<f64>,
        max: Option<f64>,
    },
    /// Percentage, 0..=100 (editor 51).
    Percent,
}

impl ValueKind {
    /// Controller editor code for this kind.
    pub fn uom(&self) -> u8 {
        match self {
            ValueKind::Bool => 2,
            ValueKind::OnOff => 78,
            ValueKind::Enum(_) => 25,
            ValueKind::Numeric { unit, .. } => unit.uom(),
            ValueKind::Percent => 51,
        }
    }

    /// Validate a supplied value against this kind.
    ///
    /// Used for command parameters: values are checked, never clamped.
    pub fn validate(&self, value: Value) -> Result<Value, ValueError> {
        match self {
            ValueKind::Bool => match value {
                Value::Bool(b) => Ok(Value::Int(i64::from(b))),
                Value::Int(0) | Value::Int(1) => Ok(value),
                _ => Err(ValueError::WrongType { expected: "boolean" }),
            },
            ValueKind::OnOff => match value {
                Value::Bool(b) => Ok(Value::Int(if b { 100 } else { 0 })),
                Value::Int(0) | Value::Int(100) => Ok(value),
                _ => Err(ValueError::WrongType { expected: "on/off" }),
            },
            ValueKind::Enum(table) => {
                let ordinal = value
                    .as_i64()
                    .ok_or(ValueError::WrongType { expected: "ordinal" })?;
                if table.contains_ordinal(ordinal) {
                    Ok(Value::Int(ordinal))
                } else {
                    Err(ValueError::UnknownOrdinal {
                        table: table.name,
                        ordinal,
                    })
                }
            }
            ValueKind::Numeric { min, max, .. } => {
                if !value.is_numeric() {
                    return Err(ValueError::WrongType { expected: "number" });
                }
                let v = value.as_f64();
                if min.map_or(false, |m| v < m) || max.map_or(false, |m| v > m) {
                    return Err(ValueError::OutOfRange {
                        value: v,
                        min: *min,
                        max: *max,
                    });
                }
                Ok(value)
            }
            ValueKind::Percent => {
                if !value.is_numeric() {
                    return Err(ValueError::WrongType { expected: "percentage" });
                }
                let v = value.as_f64();
                if !(0.0..=100.0).contains(&v) {
                    return Err(ValueError::OutOfRange {
                        value: v,
                        min: Some(0.0),
                        max: Some(100.0),
                    });
                }
                Ok(value)
            }
        }
    }
}

/// Validation failure for a supplied value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValueError {
    /// The value's type does not fit the declared kind.
    #[error("expected a {expected} value")]
    WrongType { expected: &'static str },

    /// A numeric value lies outside the declared range.
    #[error("value {value} outside range {min:?}..={max:?}")]
    OutOfRange {
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
    },

    /// An ordinal not present in the enum table.
    #[error("ordinal {ordinal} not in table '{table}'")]
    UnknownOrdinal { table: &'static str, ordinal: i64 },
}
