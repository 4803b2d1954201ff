//! The engine service object: devices, history, hub and config in one place.
//!
//! Everything is injected at construction and shared as `Arc<TerrariumEngine>`
//! between the engine loop and whatever serves dashboards.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc::Sender;
use tracing::{error, info, warn};

use crate::broadcast::{BroadcastHub, Message, MessageType};
use crate::config::{
    validate_sensor, validate_switch, validate_weather, validate_webcam, ConfigSection,
    ConfigStore, ConfigUpdate, SystemSettings,
};
use crate::devices::{
    DeviceRegistry, DoorState, SensorReading, SensorSettings, SwitchSettings, SwitchStatus,
    WeatherData, WeatherSettings, WebcamSettings,
};
use crate::environment::{EnvironmentAverage, EnvironmentController, EnvironmentSettings};
use crate::error::{ConfigError, EngineError, HistoryError, Result};
use crate::history::{
    DailyUsageTotal, HistoryCategory, HistoryRecord, HistorySeries, HistoryStore, UsageEvent,
};
use crate::host::{HostProbe, Uptime};
use crate::settings::EngineSettings;
use crate::usage::{Clock, DailyTotals, LiveUsage, SystemClock, UsageAggregator, UsageGauge, UsageMode};

pub struct TerrariumEngine {
    settings: EngineSettings,
    system: RwLock<SystemSettings>,
    devices: DeviceRegistry,
    history: Arc<dyn HistoryStore>,
    hub: Arc<BroadcastHub>,
    environment: Arc<dyn EnvironmentController>,
    config: Arc<dyn ConfigStore>,
    aggregator: UsageAggregator,
    clock: Arc<dyn Clock>,
    host: HostProbe,
    started_at: DateTime<Local>,
}

impl TerrariumEngine {
    /// Builds an engine on the system clock, reading host stats from `/proc`.
    pub fn new(
        settings: EngineSettings,
        devices: DeviceRegistry,
        history: Arc<dyn HistoryStore>,
        hub: Arc<BroadcastHub>,
        environment: Arc<dyn EnvironmentController>,
        config: Arc<dyn ConfigStore>,
    ) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let host = HostProbe::new("/proc", settings.thermal_zone.clone());
        info!(
            sensors = devices.sensors.len(),
            switches = devices.switches.len(),
            webcams = devices.webcams.len(),
            door = devices.door.is_some(),
            weather = devices.weather.is_some(),
            "Terrarium engine created"
        );
        Self {
            system: RwLock::new(settings.system.clone()),
            settings,
            devices,
            aggregator: UsageAggregator::new(history.clone()),
            history,
            hub,
            environment,
            config,
            started_at: clock.now(),
            clock,
            host,
        }
    }

    /// Replaces the clock; uptime restarts from the new clock's "now".
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.started_at = clock.now();
        self.clock = clock;
        self
    }

    /// Replaces where host load, memory and temperature are read from.
    pub fn with_host_probe(mut self, host: HostProbe) -> Self {
        self.host = host;
        self
    }

    pub(crate) fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub(crate) fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    pub(crate) fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    pub(crate) fn host(&self) -> &HostProbe {
        &self.host
    }

    /// The hub every `push_*` method publishes on.
    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// Current time according to the engine's clock.
    pub fn now(&self) -> DateTime<Local> {
        self.clock.now()
    }

    /// Always-on draw in watts, as currently configured.
    pub fn baseline_wattage(&self) -> f64 {
        self.system.read().baseline_wattage
    }

    /// How long this engine has been running.
    pub fn uptime(&self) -> Duration {
        (self.clock.now() - self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Registers a dashboard channel; it receives the online notice first.
    pub fn subscribe(&self, channel: Sender<Message>) {
        self.hub.subscribe(channel);
    }

    // Uptime

    /// Engine uptime with the host load averages. Missing load reads as zero.
    pub async fn get_uptime(&self) -> Uptime {
        let load = self.host.load_average().await.unwrap_or_else(|e| {
            warn!("Load average unavailable: {e}");
            Default::default()
        });
        Uptime {
            uptime_seconds: self.uptime().as_secs_f64(),
            load1: load.load1,
            load5: load.load5,
            load15: load.load15,
        }
    }

    /// Publishes [`Self::get_uptime`] as `dashboard_uptime`.
    pub async fn push_uptime(&self) {
        let uptime = self.get_uptime().await;
        self.hub.send(MessageType::DashboardUptime, uptime);
    }

    // Power and water

    /// Today's usage rebuilt from history in the given mode.
    pub async fn daily_usage(&self, mode: UsageMode) -> Result<DailyUsageTotal> {
        let total = self
            .aggregator
            .compute_daily_usage(self.clock.now(), self.uptime(), self.baseline_wattage(), mode)
            .await?;
        Ok(total)
    }

    /// Instantaneous draw of everything switched on, plus the running totals.
    pub async fn get_live_power_water_usage(&self) -> Result<LiveUsage> {
        let baseline = self.baseline_wattage();
        let mut power = UsageGauge {
            current: baseline,
            max: baseline,
            total: 0.0,
        };
        let mut water = UsageGauge::default();

        for switch in self.devices.switches.values() {
            let (wattage, flow) = (switch.power_wattage(), switch.water_flow_per_minute());
            power.max += wattage;
            water.max += flow;
            if switch.is_on() {
                power.current += wattage;
                water.current += flow;
            }
        }

        let total = self.daily_usage(UsageMode::Live).await?;
        power.total = total.cumulative_total_power;
        water.total = total.cumulative_total_water;
        Ok(LiveUsage { power, water })
    }

    /// Publishes the live gauges as `dashboard_power_usage` and `dashboard_water_flow`.
    pub async fn push_power_usage_water_flow(&self) -> Result<()> {
        let usage = self.get_live_power_water_usage().await?;
        self.hub.send(MessageType::DashboardPowerUsage, usage.power);
        self.hub.send(MessageType::DashboardWaterFlow, usage.water);
        Ok(())
    }

    /// Today's power in kWh and water in liters, open runs included.
    pub async fn get_daily_totals(&self) -> Result<DailyTotals> {
        let total = self.daily_usage(UsageMode::Live).await?;
        Ok(DailyTotals::from(&total))
    }

    /// Publishes [`Self::get_daily_totals`] as `power_usage_water_flow`.
    pub async fn push_daily_totals(&self) -> Result<()> {
        let totals = self.get_daily_totals().await?;
        self.hub.send(MessageType::PowerUsageWaterFlow, totals);
        Ok(())
    }

    // Sensors

    /// Latest readings, filtered by sensor id or, failing that, by sensor type.
    pub fn get_sensors(&self, filter: Option<&str>) -> Vec<SensorReading> {
        if let Some(sensor) = filter.and_then(|id| self.devices.sensors.get(id)) {
            return sensor.latest().into_iter().collect();
        }
        self.devices
            .sensors
            .values()
            .filter(|sensor| filter.map_or(true, |kind| sensor.is_type(kind)))
            .filter_map(|sensor| sensor.latest())
            .collect()
    }

    /// Publishes the filtered readings as one `sensor_gauge` batch.
    pub fn push_sensors(&self, filter: Option<&str>) {
        self.hub.send(MessageType::SensorGauge, self.get_sensors(filter));
    }

    /// One average per sensor type.
    pub fn get_average_sensors(&self) -> Vec<EnvironmentAverage> {
        self.environment.average().into_values().collect()
    }

    /// Publishes the averages as `dashboard_sensors`.
    pub fn push_average_sensors(&self) {
        self.hub.send(MessageType::DashboardSensors, self.get_average_sensors());
    }

    /// Number of sensors, optionally only those of one type.
    pub fn sensor_count(&self, sensor_type: Option<&str>) -> usize {
        self.devices.sensor_count(sensor_type)
    }

    // Switches

    /// Status of one switch by id, or of all switches when the id is unknown or absent.
    pub fn get_switches(&self, filter: Option<&str>) -> Vec<SwitchStatus> {
        if let Some(switch) = filter.and_then(|id| self.devices.switches.get(id)) {
            return vec![switch.status()];
        }
        self.devices.switches.values().map(|s| s.status()).collect()
    }

    /// Publishes all switch states as `power_switches`.
    pub fn push_switches(&self) {
        self.hub.send(MessageType::PowerSwitches, self.get_switches(None));
    }

    pub fn switch_count(&self) -> usize {
        self.devices.switches.len()
    }

    /// Configured upper bound on the number of switches.
    pub fn max_switches(&self) -> usize {
        self.system.read().max_switches
    }

    /// Records a transition reported by a switch driver, with its current rates.
    pub async fn toggle_switch(&self, switch_id: &str, is_on: bool) -> Result<()> {
        let switch = self
            .devices
            .switches
            .get(switch_id)
            .ok_or_else(|| EngineError::UnknownSwitch(switch_id.to_string()))?;

        let event = UsageEvent {
            timestamp_millis: self.clock.now().timestamp_millis(),
            switch_id: switch_id.to_string(),
            is_on,
            power_wattage: switch.power_wattage(),
            water_flow_per_minute: switch.water_flow_per_minute(),
        };
        info!(switch = switch_id, is_on, "Switch toggled");
        self.history.append(HistoryRecord::Switches(event)).await?;
        self.push_switches();
        Ok(())
    }

    // Webcams

    /// Settings of one webcam by id, or of all of them.
    pub fn get_webcams(&self, filter: Option<&str>) -> Vec<WebcamSettings> {
        if let Some(webcam) = filter.and_then(|id| self.devices.webcams.get(id)) {
            return vec![webcam.info()];
        }
        self.devices.webcams.values().map(|w| w.info()).collect()
    }

    /// Publishes all webcams as `webcam_data`.
    pub fn push_webcams(&self) {
        self.hub.send(MessageType::WebcamData, self.get_webcams(None));
    }

    pub fn webcam_count(&self) -> usize {
        self.devices.webcams.len()
    }

    // Weather

    /// Last fetched forecast, `None` without a weather source.
    pub fn get_weather(&self) -> Option<WeatherData> {
        self.devices.weather.as_ref().map(|weather| weather.data())
    }

    /// Publishes the forecast as `update_weather`.
    pub fn push_weather(&self) {
        self.hub.send(MessageType::UpdateWeather, self.get_weather());
    }

    // Door

    /// Door state, `None` when no door sensor is fitted.
    pub fn door_status(&self) -> Option<DoorState> {
        self.devices.door.as_ref().map(|door| door.status())
    }

    /// Publishes the door state as `door_indicator`.
    pub fn push_door_status(&self) {
        self.hub.send(MessageType::DoorIndicator, self.door_status());
    }

    /// False when there is no door sensor.
    pub fn is_door_open(&self) -> bool {
        self.door_status() == Some(DoorState::Open)
    }

    pub fn is_door_closed(&self) -> bool {
        self.door_status() == Some(DoorState::Closed)
    }

    // Environment

    /// Per-type averages next to the light, sprayer and heater states.
    pub fn get_environment(&self, filter: Option<&str>) -> Map<String, Value> {
        let mut view: Map<String, Value> = self
            .environment
            .average()
            .into_iter()
            .map(|(kind, average)| (kind, to_json(&average)))
            .collect();

        let state = self.environment.state();
        view.insert("light".to_string(), to_json(&state.light));
        view.insert("sprayer".to_string(), to_json(&state.sprayer));
        view.insert("heater".to_string(), to_json(&state.heater));

        if let Some(key) = filter {
            view.retain(|name, _| name == key);
        }
        view
    }

    /// Publishes the unfiltered environment view as `environment`.
    pub fn push_environment(&self) {
        self.hub.send(MessageType::Environment, self.get_environment(None));
    }

    // History

    /// Records of the requested categories. An empty list is an error.
    pub async fn get_history(&self, categories: &[HistoryCategory]) -> Result<HistorySeries> {
        if categories.is_empty() {
            return Err(HistoryError::NoCategory.into());
        }
        Ok(self.history.query(categories).await?)
    }

    /// Publishes the requested history as `history_graph`.
    pub async fn push_history(&self, categories: &[HistoryCategory]) -> Result<()> {
        let series = self.get_history(categories).await?;
        self.hub.send(MessageType::HistoryGraph, series);
        Ok(())
    }

    // Config

    /// Current settings of one section, or of all of them.
    pub fn get_config(&self, section: Option<ConfigSection>) -> Map<String, Value> {
        let sections = match section {
            Some(section) => vec![section],
            None => ConfigSection::ALL.to_vec(),
        };
        sections
            .into_iter()
            .map(|section| (section.to_string(), self.section_config(section)))
            .collect()
    }

    fn section_config(&self, section: ConfigSection) -> Value {
        match section {
            ConfigSection::System => to_json(&*self.system.read()),
            ConfigSection::Weather => to_json(
                &self.devices.weather.as_ref().map(|weather| weather.settings()),
            ),
            ConfigSection::Sensors => {
                let settings: Vec<SensorSettings> =
                    self.devices.sensors.values().map(|s| s.settings()).collect();
                to_json(&settings)
            }
            ConfigSection::Switches => to_json(&self.get_switches(None)),
            ConfigSection::Webcams => to_json(&self.get_webcams(None)),
            ConfigSection::Environment => to_json(&self.environment.settings()),
        }
    }

    /// Applies one section update.
    ///
    /// Single-valued sections are all-or-nothing. List sections apply every
    /// item on its own and report the AND of the item results, so a bad item
    /// does not undo the good ones before it.
    pub fn set_config(&self, update: ConfigUpdate) -> bool {
        let section = update.section();
        let ok = match update {
            ConfigUpdate::System(settings) => report(section, self.set_system_config(settings)),
            ConfigUpdate::Weather(settings) => report(section, self.set_weather_config(&settings)),
            ConfigUpdate::Sensors(items) => items.iter().fold(true, |ok, item| {
                report(section, self.set_sensor_config(item)) && ok
            }),
            ConfigUpdate::Switches(items) => items.iter().fold(true, |ok, item| {
                report(section, self.set_switch_config(item)) && ok
            }),
            ConfigUpdate::Webcams(items) => items.iter().fold(true, |ok, item| {
                report(section, self.set_webcam_config(item)) && ok
            }),
            ConfigUpdate::Environment(settings) => {
                report(section, self.set_environment_config(&settings))
            }
        };
        info!(%section, ok, "Config update applied");
        ok
    }

    fn set_system_config(&self, settings: SystemSettings) -> std::result::Result<(), ConfigError> {
        settings.validate()?;
        self.config
            .save(ConfigSection::System, serde_json::to_value(&settings)?)?;
        *self.system.write() = settings;
        Ok(())
    }

    fn set_weather_config(&self, settings: &WeatherSettings) -> std::result::Result<(), ConfigError> {
        validate_weather(settings)?;
        let weather = self.devices.weather.as_ref().ok_or_else(|| ConfigError::Invalid {
            section: ConfigSection::Weather,
            reason: "no weather source configured".to_string(),
        })?;
        commit(
            ConfigSection::Weather,
            &weather.settings(),
            settings,
            |s| weather.apply_settings(s),
            |value| self.config.save(ConfigSection::Weather, value),
        )
    }

    fn set_sensor_config(&self, settings: &SensorSettings) -> std::result::Result<(), ConfigError> {
        let sensor = self
            .devices
            .sensors
            .get(&settings.id)
            .ok_or_else(|| unknown_item(ConfigSection::Sensors, &settings.id))?;
        validate_sensor(settings)?;
        commit(
            ConfigSection::Sensors,
            &sensor.settings(),
            settings,
            |s| sensor.apply_settings(s),
            |value| self.config.save_item(ConfigSection::Sensors, &settings.id, value),
        )
    }

    fn set_switch_config(&self, settings: &SwitchSettings) -> std::result::Result<(), ConfigError> {
        let switch = self
            .devices
            .switches
            .get(&settings.id)
            .ok_or_else(|| unknown_item(ConfigSection::Switches, &settings.id))?;
        validate_switch(settings)?;
        let status = switch.status();
        let previous = SwitchSettings {
            id: status.id,
            name: status.name,
            power_wattage: status.power_wattage,
            water_flow: status.water_flow,
        };
        commit(
            ConfigSection::Switches,
            &previous,
            settings,
            |s| switch.apply_settings(s),
            |value| self.config.save_item(ConfigSection::Switches, &settings.id, value),
        )
    }

    fn set_webcam_config(&self, settings: &WebcamSettings) -> std::result::Result<(), ConfigError> {
        let webcam = self
            .devices
            .webcams
            .get(&settings.id)
            .ok_or_else(|| unknown_item(ConfigSection::Webcams, &settings.id))?;
        validate_webcam(settings)?;
        commit(
            ConfigSection::Webcams,
            &webcam.info(),
            settings,
            |s| webcam.apply_settings(s),
            |value| self.config.save_item(ConfigSection::Webcams, &settings.id, value),
        )
    }

    /// Persists the merged settings first; the controller only sees them once stored.
    fn set_environment_config(
        &self,
        settings: &EnvironmentSettings,
    ) -> std::result::Result<(), ConfigError> {
        let mut merged = self.environment.settings();
        merged.merge(settings);
        self.config
            .save(ConfigSection::Environment, serde_json::to_value(&merged)?)?;
        self.environment.apply_settings(settings);
        Ok(())
    }
}

/// Applies `next` to a live device, then stores it.
///
/// When the store refuses the write the device is put back on `previous`, so a
/// rejected item leaves no trace.
fn commit<S: Serialize>(
    section: ConfigSection,
    previous: &S,
    next: &S,
    apply: impl Fn(&S) -> std::result::Result<(), crate::error::DeviceError>,
    save: impl FnOnce(Value) -> std::result::Result<(), ConfigError>,
) -> std::result::Result<(), ConfigError> {
    let value = serde_json::to_value(next)?;
    apply(next).map_err(|e| device_rejected(section, e))?;
    if let Err(e) = save(value) {
        if let Err(rollback) = apply(previous) {
            error!(%section, "Rollback after a failed save also failed: {rollback}");
        }
        return Err(e);
    }
    Ok(())
}

fn report(section: ConfigSection, result: std::result::Result<(), ConfigError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(%section, "Config update rejected: {e}");
            false
        }
    }
}

fn unknown_item(section: ConfigSection, id: &str) -> ConfigError {
    ConfigError::UnknownItem {
        section,
        id: id.to_string(),
    }
}

fn device_rejected(section: ConfigSection, e: crate::error::DeviceError) -> ConfigError {
    ConfigError::Invalid {
        section,
        reason: e.to_string(),
    }
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        warn!("Failed to serialize value: {e}");
        Value::Null
    })
}
