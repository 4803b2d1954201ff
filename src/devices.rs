//! Contracts for the hardware drivers the engine drives.
//!
//! Drivers live outside this crate. They are shared as `Arc<dyn Trait>` and use
//! interior mutability for their own state, so the registry itself never
//! changes after the engine is built.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_derive::{Deserialize, Serialize};

use crate::error::DeviceError;

/// A single sensor sample as written to history and pushed to dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub sensor_id: String,
    pub sensor_type: String,
    pub name: String,
    pub value: f64,
    pub alarm_min: f64,
    pub alarm_max: f64,
    pub limit_min: f64,
    pub limit_max: f64,
    pub timestamp_millis: i64,
}

impl SensorReading {
    pub fn is_alarm(&self) -> bool {
        self.value < self.alarm_min || self.value > self.alarm_max
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSettings {
    pub id: String,
    pub name: String,
    pub alarm_min: f64,
    pub alarm_max: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchSettings {
    pub id: String,
    pub name: String,
    pub power_wattage: f64,
    pub water_flow: f64,
}

/// Current state of a switch as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchStatus {
    pub id: String,
    pub name: String,
    pub is_on: bool,
    pub power_wattage: f64,
    pub water_flow: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoorState {
    Open,
    Closed,
}

/// One hourly forecast entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSample {
    pub timestamp_millis: i64,
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    #[serde(default)]
    pub rain: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherData {
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub sunrise_millis: Option<i64>,
    #[serde(default)]
    pub sunset_millis: Option<i64>,
    #[serde(default)]
    pub hour_forecast: Vec<ForecastSample>,
}

impl WeatherData {
    /// The forecast entry closest to `now_millis`.
    pub fn nearest_hour(&self, now_millis: i64) -> Option<&ForecastSample> {
        self.hour_forecast
            .iter()
            .min_by_key(|sample| (sample.timestamp_millis - now_millis).abs())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSettings {
    pub location: String,
    pub windspeed: String,
    pub temperature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebcamSettings {
    pub id: String,
    pub name: String,
    pub location: String,
    pub rotation: String,
}

#[async_trait]
pub trait Sensor: Send + Sync {
    fn id(&self) -> &str;
    fn sensor_type(&self) -> &str;
    fn is_type(&self, sensor_type: &str) -> bool {
        self.sensor_type() == sensor_type
    }
    /// Trigger a hardware read and return the fresh sample.
    async fn update(&self) -> Result<SensorReading, DeviceError>;
    /// Last sample taken, if any.
    fn latest(&self) -> Option<SensorReading>;
    fn settings(&self) -> SensorSettings;
    fn apply_settings(&self, settings: &SensorSettings) -> Result<(), DeviceError>;
}

pub trait PowerSwitch: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> String;
    fn is_on(&self) -> bool;
    fn power_wattage(&self) -> f64;
    fn water_flow_per_minute(&self) -> f64;
    fn apply_settings(&self, settings: &SwitchSettings) -> Result<(), DeviceError>;

    fn status(&self) -> SwitchStatus {
        SwitchStatus {
            id: self.id().to_string(),
            name: self.name(),
            is_on: self.is_on(),
            power_wattage: self.power_wattage(),
            water_flow: self.water_flow_per_minute(),
        }
    }
}

pub trait DoorSensor: Send + Sync {
    fn status(&self) -> DoorState;
}

#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn update(&self) -> Result<(), DeviceError>;
    fn data(&self) -> WeatherData;
    fn settings(&self) -> WeatherSettings;
    fn apply_settings(&self, settings: &WeatherSettings) -> Result<(), DeviceError>;
}

#[async_trait]
pub trait Webcam: Send + Sync {
    fn id(&self) -> &str;
    async fn update(&self) -> Result<(), DeviceError>;
    fn info(&self) -> WebcamSettings;
    fn apply_settings(&self, settings: &WebcamSettings) -> Result<(), DeviceError>;
}

/// All devices owned by the engine, keyed by id.
///
/// `BTreeMap` keeps the sampling order stable between cycles.
#[derive(Default, Clone)]
pub struct DeviceRegistry {
    pub sensors: BTreeMap<String, Arc<dyn Sensor>>,
    pub switches: BTreeMap<String, Arc<dyn PowerSwitch>>,
    pub webcams: BTreeMap<String, Arc<dyn Webcam>>,
    pub door: Option<Arc<dyn DoorSensor>>,
    pub weather: Option<Arc<dyn WeatherSource>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sensor(mut self, sensor: Arc<dyn Sensor>) -> Self {
        self.sensors.insert(sensor.id().to_string(), sensor);
        self
    }

    pub fn with_switch(mut self, switch: Arc<dyn PowerSwitch>) -> Self {
        self.switches.insert(switch.id().to_string(), switch);
        self
    }

    pub fn with_webcam(mut self, webcam: Arc<dyn Webcam>) -> Self {
        self.webcams.insert(webcam.id().to_string(), webcam);
        self
    }

    pub fn with_door(mut self, door: Arc<dyn DoorSensor>) -> Self {
        self.door = Some(door);
        self
    }

    pub fn with_weather(mut self, weather: Arc<dyn WeatherSource>) -> Self {
        self.weather = Some(weather);
        self
    }

    pub fn sensor_count(&self, sensor_type: Option<&str>) -> usize {
        match sensor_type {
            None => self.sensors.len(),
            Some(kind) => self.sensors.values().filter(|s| s.is_type(kind)).count(),
        }
    }
}
