//! Per-section runtime configuration.
//!
//! Sections are a closed set, so lookups are an exhaustive `match` rather than
//! string dispatch. Storage itself sits behind [`ConfigStore`].

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;

use crate::devices::{SensorSettings, SwitchSettings, WeatherSettings, WebcamSettings};
use crate::environment::EnvironmentSettings;
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSection {
    System,
    Weather,
    Sensors,
    Switches,
    Webcams,
    Environment,
}

impl ConfigSection {
    pub const ALL: [ConfigSection; 6] = [
        ConfigSection::System,
        ConfigSection::Weather,
        ConfigSection::Sensors,
        ConfigSection::Switches,
        ConfigSection::Webcams,
        ConfigSection::Environment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigSection::System => "system",
            ConfigSection::Weather => "weather",
            ConfigSection::Sensors => "sensors",
            ConfigSection::Switches => "switches",
            ConfigSection::Webcams => "webcams",
            ConfigSection::Environment => "environment",
        }
    }
}

impl fmt::Display for ConfigSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings of the controller itself that can change at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSettings {
    /// Draw of the controller and always-on peripherals, in watts.
    pub baseline_wattage: f64,
    pub max_switches: usize,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            baseline_wattage: 5.0,
            max_switches: 8,
        }
    }
}

impl SystemSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.baseline_wattage.is_finite() || self.baseline_wattage < 0.0 {
            return Err(invalid(
                ConfigSection::System,
                format!("baseline wattage {} must be a non-negative number", self.baseline_wattage),
            ));
        }
        Ok(())
    }
}

/// A typed update for exactly one section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "section", content = "data", rename_all = "lowercase")]
pub enum ConfigUpdate {
    System(SystemSettings),
    Weather(WeatherSettings),
    Sensors(Vec<SensorSettings>),
    Switches(Vec<SwitchSettings>),
    Webcams(Vec<WebcamSettings>),
    Environment(EnvironmentSettings),
}

impl ConfigUpdate {
    pub fn section(&self) -> ConfigSection {
        match self {
            ConfigUpdate::System(_) => ConfigSection::System,
            ConfigUpdate::Weather(_) => ConfigSection::Weather,
            ConfigUpdate::Sensors(_) => ConfigSection::Sensors,
            ConfigUpdate::Switches(_) => ConfigSection::Switches,
            ConfigUpdate::Webcams(_) => ConfigSection::Webcams,
            ConfigUpdate::Environment(_) => ConfigSection::Environment,
        }
    }
}

pub fn validate_sensor(settings: &SensorSettings) -> Result<(), ConfigError> {
    if settings.alarm_min > settings.alarm_max {
        return Err(invalid(
            ConfigSection::Sensors,
            format!("sensor {} alarm_min is above alarm_max", settings.id),
        ));
    }
    if settings.min > settings.max {
        return Err(invalid(
            ConfigSection::Sensors,
            format!("sensor {} min is above max", settings.id),
        ));
    }
    Ok(())
}

pub fn validate_switch(settings: &SwitchSettings) -> Result<(), ConfigError> {
    let rates = [settings.power_wattage, settings.water_flow];
    if rates.iter().any(|rate| !rate.is_finite() || *rate < 0.0) {
        return Err(invalid(
            ConfigSection::Switches,
            format!("switch {} rates must be non-negative numbers", settings.id),
        ));
    }
    Ok(())
}

pub fn validate_weather(settings: &WeatherSettings) -> Result<(), ConfigError> {
    if settings.location.trim().is_empty() {
        return Err(invalid(ConfigSection::Weather, "location is empty".to_string()));
    }
    Ok(())
}

pub fn validate_webcam(settings: &WebcamSettings) -> Result<(), ConfigError> {
    if settings.location.trim().is_empty() {
        return Err(invalid(
            ConfigSection::Webcams,
            format!("webcam {} has no location", settings.id),
        ));
    }
    Ok(())
}

fn invalid(section: ConfigSection, reason: String) -> ConfigError {
    ConfigError::Invalid { section, reason }
}

/// Persisted settings storage. Items are keyed by id inside list sections.
pub trait ConfigStore: Send + Sync {
    fn load(&self, section: ConfigSection) -> Result<Option<Value>, ConfigError>;
    fn save(&self, section: ConfigSection, value: Value) -> Result<(), ConfigError>;
    fn save_item(&self, section: ConfigSection, id: &str, value: Value) -> Result<(), ConfigError>;
}

#[derive(Default)]
pub struct MemoryConfigStore {
    sections: RwLock<HashMap<ConfigSection, Value>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self, section: ConfigSection) -> Result<Option<Value>, ConfigError> {
        Ok(self.sections.read().get(&section).cloned())
    }

    fn save(&self, section: ConfigSection, value: Value) -> Result<(), ConfigError> {
        self.sections.write().insert(section, value);
        Ok(())
    }

    fn save_item(&self, section: ConfigSection, id: &str, value: Value) -> Result<(), ConfigError> {
        let mut sections = self.sections.write();
        let entry = sections
            .entry(section)
            .or_insert_with(|| Value::Object(Default::default()));
        match entry {
            Value::Object(items) => {
                items.insert(id.to_string(), value);
                Ok(())
            }
            _ => Err(ConfigError::Store(format!("{section} section is not keyed by id"))),
        }
    }
}
