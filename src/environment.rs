//! Seam to the environment controller that drives lights, sprayer and heater.
//!
//! The actuation logic lives elsewhere. The engine only asks for per-type
//! sensor averages and the current actuator states.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;

use crate::devices::{Sensor, SensorReading};

/// Mean of all sensors of one type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentAverage {
    pub sensor_type: String,
    pub current: f64,
    pub alarm_min: f64,
    pub alarm_max: f64,
    pub limit_min: f64,
    pub limit_max: f64,
    pub alarm: bool,
    pub amount: usize,
    pub timestamp_millis: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActuatorState {
    pub enabled: bool,
    pub on: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentState {
    pub light: ActuatorState,
    pub sprayer: ActuatorState,
    pub heater: ActuatorState,
}

/// Per-actuator configuration blobs; a missing part is left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprayer: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heater: Option<Value>,
}

impl EnvironmentSettings {
    /// Overlay the parts present in `update`.
    pub fn merge(&mut self, update: &EnvironmentSettings) {
        if update.light.is_some() {
            self.light = update.light.clone();
        }
        if update.sprayer.is_some() {
            self.sprayer = update.sprayer.clone();
        }
        if update.heater.is_some() {
            self.heater = update.heater.clone();
        }
    }
}

pub trait EnvironmentController: Send + Sync {
    fn average(&self) -> BTreeMap<String, EnvironmentAverage>;
    fn state(&self) -> EnvironmentState;
    fn settings(&self) -> EnvironmentSettings;
    fn apply_settings(&self, settings: &EnvironmentSettings);
}

/// Group the readings by sensor type and average each group.
pub fn average_by_type<'a>(
    readings: impl IntoIterator<Item = &'a SensorReading>,
) -> BTreeMap<String, EnvironmentAverage> {
    let mut groups: BTreeMap<String, Vec<&SensorReading>> = BTreeMap::new();
    for reading in readings {
        groups.entry(reading.sensor_type.clone()).or_default().push(reading);
    }

    groups
        .into_iter()
        .map(|(sensor_type, group)| {
            let amount = group.len();
            let mean = |field: fn(&SensorReading) -> f64| {
                group.iter().map(|r| field(r)).sum::<f64>() / amount as f64
            };
            let average = EnvironmentAverage {
                sensor_type: sensor_type.clone(),
                current: mean(|r| r.value),
                alarm_min: mean(|r| r.alarm_min),
                alarm_max: mean(|r| r.alarm_max),
                limit_min: mean(|r| r.limit_min),
                limit_max: mean(|r| r.limit_max),
                alarm: false,
                amount,
                timestamp_millis: group.iter().map(|r| r.timestamp_millis).max().unwrap_or_default(),
            };
            let alarm = average.current < average.alarm_min || average.current > average.alarm_max;
            (sensor_type, EnvironmentAverage { alarm, ..average })
        })
        .collect()
}

/// Averages the latest sensor readings and never actuates anything.
///
/// Stands in when no real controller is wired up.
pub struct PassiveEnvironment {
    sensors: Vec<Arc<dyn Sensor>>,
    settings: RwLock<EnvironmentSettings>,
}

impl PassiveEnvironment {
    pub fn new(sensors: impl IntoIterator<Item = Arc<dyn Sensor>>) -> Self {
        Self {
            sensors: sensors.into_iter().collect(),
            settings: RwLock::new(EnvironmentSettings::default()),
        }
    }
}

impl EnvironmentController for PassiveEnvironment {
    fn average(&self) -> BTreeMap<String, EnvironmentAverage> {
        let latest: Vec<SensorReading> = self.sensors.iter().filter_map(|s| s.latest()).collect();
        average_by_type(&latest)
    }

    fn state(&self) -> EnvironmentState {
        EnvironmentState::default()
    }

    fn settings(&self) -> EnvironmentSettings {
        self.settings.read().clone()
    }

    fn apply_settings(&self, settings: &EnvironmentSettings) {
        self.settings.write().merge(settings);
    }
}
