use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::fmt;

/// A numeric measurement that may be missing.
///
/// Every telemetry and weather field goes through this type so that "no data"
/// is always an explicit `null` on the wire and never a coerced zero. Only
/// finite values are ever stored.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Reading(Option<f64>);

impl Reading {
    pub const NO_DATA: Reading = Reading(None);

    pub fn new(value: f64) -> Self {
        if value.is_finite() {
            Self(Some(value))
        } else {
            Self(None)
        }
    }

    /// Lenient conversion used for device pushes and provider payloads.
    /// Numbers and numeric strings are accepted; everything else is no data.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Number(number) => number.as_f64().map(Self::new).unwrap_or_default(),
            JsonValue::String(raw) => raw
                .trim()
                .parse::<f64>()
                .map(Self::new)
                .unwrap_or_default(),
            _ => Self::NO_DATA,
        }
    }

    /// Looks `key` up in an optional JSON object; absent keys are no data.
    pub fn field(object: Option<&serde_json::Map<String, JsonValue>>, key: &str) -> Self {
        object
            .and_then(|map| map.get(key))
            .map(Self::from_json)
            .unwrap_or_default()
    }

    pub fn value(&self) -> Option<f64> {
        self.0
    }

    pub fn is_no_data(&self) -> bool {
        self.0.is_none()
    }
}

impl From<Option<f64>> for Reading {
    fn from(value: Option<f64>) -> Self {
        value.map(Self::new).unwrap_or_default()
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{value}"),
            None => f.write_str("N/A"),
        }
    }
}

impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Some(value) => serializer.serialize_f64(value),
            None => serializer.serialize_none(),
        }
    }
}
