//! Setting values carried by layers
//!
//! Raw declaration values (JSON-like trees) are classified once, when a
//! layer is built, into the shapes the fold understands: a bare severity, a
//! rule entry (severity followed by option values), an option object, a
//! plain list, or an opaque scalar.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Rule severity levels
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Disable the rule
    Off,
    /// Warning (doesn't fail the run)
    Warn,
    /// Error (fails the run)
    Error,
}

impl Severity {
    /// Parse a severity name (`off`, `warn`, `error`)
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "off" => Some(Severity::Off),
            "warn" => Some(Severity::Warn),
            "error" => Some(Severity::Error),
            _ => None,
        }
    }

    /// Parse a numeric severity alias (`0`, `1`, `2`)
    pub fn from_number(level: f64) -> Option<Self> {
        if level.fract() != 0.0 {
            return None;
        }
        match level as i64 {
            0 => Some(Severity::Off),
            1 => Some(Severity::Warn),
            2 => Some(Severity::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Off => "off",
            Severity::Warn => "warn",
            Severity::Error => "error",
        }
    }

    /// Whether the severity turns the rule on
    pub fn is_enabled(&self) -> bool {
        *self != Severity::Off
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::from_name(s).ok_or_else(|| format!("unknown severity '{s}'"))
    }
}

/// A single setting value after classification
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    /// `"off"`, `"warn"` or `"error"`
    Severity(Severity),
    /// `[severity, option, ...]`
    Rule {
        severity: Severity,
        options: Vec<Value>,
    },
    /// Structured option object
    Options(Map<String, Value>),
    /// Ordered list that is not a rule entry
    List(Vec<Value>),
    /// Any other string, number, boolean or null
    Scalar(Value),
}

impl SettingValue {
    /// Classify a raw declaration value
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(s) => match Severity::from_name(&s) {
                Some(severity) => SettingValue::Severity(severity),
                None => SettingValue::Scalar(Value::String(s)),
            },
            Value::Array(items) => match items.first().and_then(severity_of_entry) {
                Some(severity) => SettingValue::Rule {
                    severity,
                    options: items.into_iter().skip(1).collect(),
                },
                None => SettingValue::List(items),
            },
            Value::Object(map) => SettingValue::Options(map),
            other => SettingValue::Scalar(other),
        }
    }

    /// Convert back into the declaration shape
    pub fn to_json(&self) -> Value {
        match self {
            SettingValue::Severity(severity) => Value::String(severity.as_str().to_string()),
            SettingValue::Rule { severity, options } => {
                let mut items = Vec::with_capacity(options.len() + 1);
                items.push(Value::String(severity.as_str().to_string()));
                items.extend(options.iter().cloned());
                Value::Array(items)
            }
            SettingValue::Options(map) => Value::Object(map.clone()),
            SettingValue::List(items) => Value::Array(items.clone()),
            SettingValue::Scalar(value) => value.clone(),
        }
    }

    /// Severity carried by a bare severity or a rule entry
    pub fn severity(&self) -> Option<Severity> {
        match self {
            SettingValue::Severity(severity) | SettingValue::Rule { severity, .. } => {
                Some(*severity)
            }
            _ => None,
        }
    }

    /// Short shape name used in validation messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            SettingValue::Severity(_) => "severity",
            SettingValue::Rule { .. } => "rule entry",
            SettingValue::Options(_) => "option object",
            SettingValue::List(_) => "list",
            SettingValue::Scalar(_) => "scalar",
        }
    }

    /// Split into the (severity, items) pair used for concatenation.
    /// Returns `None` for shapes that cannot be appended.
    pub(crate) fn into_sequence(self) -> Option<(Option<Severity>, Vec<Value>)> {
        match self {
            SettingValue::Severity(severity) => Some((Some(severity), Vec::new())),
            SettingValue::Rule { severity, options } => Some((Some(severity), options)),
            SettingValue::List(items) => Some((None, items)),
            SettingValue::Options(_) | SettingValue::Scalar(_) => None,
        }
    }

    pub(crate) fn from_sequence(severity: Option<Severity>, items: Vec<Value>) -> Self {
        match severity {
            None => SettingValue::List(items),
            Some(severity) if items.is_empty() => SettingValue::Severity(severity),
            Some(severity) => SettingValue::Rule {
                severity,
                options: items,
            },
        }
    }
}

/// First element of an array counts as a severity when it is a severity
/// name or one of the numeric aliases.
fn severity_of_entry(value: &Value) -> Option<Severity> {
    match value {
        Value::String(s) => Severity::from_name(s),
        Value::Number(n) => n.as_f64().and_then(Severity::from_number),
        _ => None,
    }
}

impl From<Severity> for SettingValue {
    fn from(severity: Severity) -> Self {
        SettingValue::Severity(severity)
    }
}

impl From<Value> for SettingValue {
    fn from(value: Value) -> Self {
        SettingValue::from_json(value)
    }
}

impl Serialize for SettingValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Severity(severity) => write!(f, "{severity}"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}
