use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::sync::{PoisonError, RwLock};

use crate::reading::Reading;

/// One device push. Keys the firmware does not send are no data.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetrySample {
    pub box_temperature: Reading,
    pub frequency: Reading,
    pub power_factor: Reading,
    pub voltage: Reading,
    pub current: Reading,
    pub power: Reading,
    pub energy: Reading,
    pub solar_voltage: Reading,
    pub solar_current: Reading,
    pub solar_power: Reading,
    pub battery_percentage: Reading,
    pub battery_voltage: Reading,
    pub light_intensity: Reading,
}

impl TelemetrySample {
    /// Maps the firmware's key names onto the sample. Unknown keys are ignored.
    pub fn from_device_payload(payload: &Map<String, JsonValue>) -> Self {
        let get = |key: &str| Reading::field(Some(payload), key);
        Self {
            box_temperature: get("BoxTemperature"),
            frequency: get("Frequency"),
            power_factor: get("PowerFactor"),
            voltage: get("Voltage"),
            current: get("Current"),
            power: get("Power"),
            energy: get("Energy"),
            solar_voltage: get("SolarVoltage"),
            solar_current: get("solarCurrent"),
            solar_power: get("solarPower"),
            battery_percentage: get("batteryPercentage"),
            battery_voltage: get("batteryVoltage"),
            light_intensity: get("lightIntensity"),
        }
    }

    pub fn readings(&self) -> [(&'static str, Reading); 13] {
        [
            ("box_temperature", self.box_temperature),
            ("frequency", self.frequency),
            ("power_factor", self.power_factor),
            ("voltage", self.voltage),
            ("current", self.current),
            ("power", self.power),
            ("energy", self.energy),
            ("solar_voltage", self.solar_voltage),
            ("solar_current", self.solar_current),
            ("solar_power", self.solar_power),
            ("battery_percentage", self.battery_percentage),
            ("battery_voltage", self.battery_voltage),
            ("light_intensity", self.light_intensity),
        ]
    }

    pub fn populated_count(&self) -> usize {
        self.readings()
            .iter()
            .filter(|(_, reading)| !reading.is_no_data())
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRecord {
    pub received_at: DateTime<Utc>,
    pub readings: TelemetrySample,
}

/// Result of reading the store. `NoData` is a valid state, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TelemetryState {
    NoData,
    Ok(TelemetryRecord),
}

impl TelemetryState {
    pub fn record(&self) -> Option<&TelemetryRecord> {
        match self {
            Self::NoData => None,
            Self::Ok(record) => Some(record),
        }
    }
}

/// Single-slot holder for the latest device sample.
#[derive(Debug, Default)]
pub struct TelemetryStore {
    latest: RwLock<Option<TelemetryRecord>>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the stored sample. The whole record is swapped under the
    /// write lock so readers never see a partial update.
    pub fn write(&self, sample: TelemetrySample, now: DateTime<Utc>) {
        let record = TelemetryRecord {
            received_at: now,
            readings: sample,
        };
        let mut guard = self.latest.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(record);
    }

    pub fn read(&self) -> TelemetryState {
        let guard = self.latest.read().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(record) => TelemetryState::Ok(record.clone()),
            None => TelemetryState::NoData,
        }
    }
}
