use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use serde_json::json;
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::sync::mpsc::Receiver;
use tokio::time::sleep;
use tokio_test::{assert_err, assert_ok};

use terrarium_engine::{
    devices::{
        DeviceRegistry, DoorSensor, DoorState, ForecastSample, PowerSwitch, Sensor, SensorReading,
        SensorSettings, SwitchSettings, WeatherData, WeatherSettings, WeatherSource, Webcam,
        WebcamSettings,
    },
    environment::{EnvironmentSettings, PassiveEnvironment},
    error::{ConfigError, DeviceError, EngineError, HistoryError},
    history::{HistoryCategory, HistoryRecord, HistorySeries, HistoryStore, UsageEvent},
    host::{HostProbe, LoadAverage, MemoryUsage, SystemStats},
    usage::{Clock, UsageMode},
    BroadcastHub, ConfigSection, ConfigStore, ConfigUpdate, EngineLoop, EngineSettings,
    MemoryConfigStore, MemoryHistoryStore, Message, MessageType, SystemSettings, TerrariumEngine,
};

/// Clock that only moves when told to
struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    fn at(hour: u32, minute: u32) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(local(hour, minute)),
        })
    }

    fn set(&self, hour: u32, minute: u32) {
        *self.now.lock().unwrap() = local(hour, minute);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap()
    }
}

fn local(hour: u32, minute: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2024, 6, 10, hour, minute, 0)
        .single()
        .unwrap()
}

/// Mock sensor with switchable failure modes
struct MockSensor {
    id: String,
    sensor_type: String,
    value: f64,
    latest: Mutex<Option<SensorReading>>,
    update_count: AtomicU32,
    should_fail: AtomicBool,
    hang: AtomicBool,
    panic_once: AtomicBool,
}

impl MockSensor {
    fn new(id: &str, sensor_type: &str, value: f64) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            sensor_type: sensor_type.to_string(),
            value,
            latest: Mutex::new(None),
            update_count: AtomicU32::new(0),
            should_fail: AtomicBool::new(false),
            hang: AtomicBool::new(false),
            panic_once: AtomicBool::new(false),
        })
    }

    fn get_update_count(&self) -> u32 {
        self.update_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Sensor for MockSensor {
    fn id(&self) -> &str {
        &self.id
    }

    fn sensor_type(&self) -> &str {
        &self.sensor_type
    }

    async fn update(&self) -> Result<SensorReading, DeviceError> {
        self.update_count.fetch_add(1, Ordering::Relaxed);
        if self.panic_once.swap(false, Ordering::Relaxed) {
            panic!("sensor bus exploded");
        }
        if self.hang.load(Ordering::Relaxed) {
            sleep(Duration::from_secs(3600)).await;
        }
        if self.should_fail.load(Ordering::Relaxed) {
            return Err(DeviceError::Read {
                device: self.id.clone(),
                reason: "no 1-wire response".to_string(),
            });
        }
        let reading = SensorReading {
            sensor_id: self.id.clone(),
            sensor_type: self.sensor_type.clone(),
            name: self.id.clone(),
            value: self.value,
            alarm_min: 20.0,
            alarm_max: 30.0,
            limit_min: 0.0,
            limit_max: 50.0,
            timestamp_millis: 0,
        };
        *self.latest.lock().unwrap() = Some(reading.clone());
        Ok(reading)
    }

    fn latest(&self) -> Option<SensorReading> {
        self.latest.lock().unwrap().clone()
    }

    fn settings(&self) -> SensorSettings {
        SensorSettings {
            id: self.id.clone(),
            name: self.id.clone(),
            alarm_min: 20.0,
            alarm_max: 30.0,
            min: 0.0,
            max: 50.0,
        }
    }

    fn apply_settings(&self, _settings: &SensorSettings) -> Result<(), DeviceError> {
        Ok(())
    }
}

struct MockSwitch {
    id: String,
    on: AtomicBool,
    rates: Mutex<(f64, f64)>,
}

impl MockSwitch {
    fn new(id: &str, power_wattage: f64, water_flow: f64) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            on: AtomicBool::new(false),
            rates: Mutex::new((power_wattage, water_flow)),
        })
    }

    fn set_on(&self, on: bool) {
        self.on.store(on, Ordering::Relaxed);
    }
}

impl PowerSwitch for MockSwitch {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> String {
        self.id.clone()
    }

    fn is_on(&self) -> bool {
        self.on.load(Ordering::Relaxed)
    }

    fn power_wattage(&self) -> f64 {
        self.rates.lock().unwrap().0
    }

    fn water_flow_per_minute(&self) -> f64 {
        self.rates.lock().unwrap().1
    }

    fn apply_settings(&self, settings: &SwitchSettings) -> Result<(), DeviceError> {
        *self.rates.lock().unwrap() = (settings.power_wattage, settings.water_flow);
        Ok(())
    }
}

struct MockWeather {
    settings: Mutex<WeatherSettings>,
}

#[async_trait]
impl WeatherSource for MockWeather {
    async fn update(&self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn data(&self) -> WeatherData {
        WeatherData {
            location: "Lab".to_string(),
            hour_forecast: vec![ForecastSample {
                timestamp_millis: local(9, 0).timestamp_millis(),
                temperature: 18.0,
                humidity: 70.0,
                wind_speed: 2.0,
                rain: 0.0,
            }],
            ..Default::default()
        }
    }

    fn settings(&self) -> WeatherSettings {
        self.settings.lock().unwrap().clone()
    }

    fn apply_settings(&self, settings: &WeatherSettings) -> Result<(), DeviceError> {
        *self.settings.lock().unwrap() = settings.clone();
        Ok(())
    }
}

struct MockWebcam {
    id: String,
    update_count: AtomicU32,
}

#[async_trait]
impl Webcam for MockWebcam {
    fn id(&self) -> &str {
        &self.id
    }

    async fn update(&self) -> Result<(), DeviceError> {
        self.update_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn info(&self) -> WebcamSettings {
        WebcamSettings {
            id: self.id.clone(),
            name: "Front".to_string(),
            location: "/dev/video0".to_string(),
            rotation: "0".to_string(),
        }
    }

    fn apply_settings(&self, _settings: &WebcamSettings) -> Result<(), DeviceError> {
        Ok(())
    }
}

struct ClosedDoor;

impl DoorSensor for ClosedDoor {
    fn status(&self) -> DoorState {
        DoorState::Closed
    }
}

/// History store whose queries can be made to fail
#[derive(Default)]
struct FlakyHistory {
    inner: MemoryHistoryStore,
    query_fails: AtomicBool,
}

#[async_trait]
impl HistoryStore for FlakyHistory {
    async fn append(&self, record: HistoryRecord) -> Result<(), HistoryError> {
        self.inner.append(record).await
    }

    async fn query(&self, categories: &[HistoryCategory]) -> Result<HistorySeries, HistoryError> {
        if self.query_fails.load(Ordering::Relaxed) {
            return Err(HistoryError::Unavailable("database is locked".to_string()));
        }
        self.inner.query(categories).await
    }
}

/// Config store with a full disk
struct FullDiskConfigStore;

impl ConfigStore for FullDiskConfigStore {
    fn load(&self, _section: ConfigSection) -> Result<Option<serde_json::Value>, ConfigError> {
        Ok(None)
    }

    fn save(&self, _section: ConfigSection, _value: serde_json::Value) -> Result<(), ConfigError> {
        Err(ConfigError::Store("disk full".to_string()))
    }

    fn save_item(
        &self,
        _section: ConfigSection,
        _id: &str,
        _value: serde_json::Value,
    ) -> Result<(), ConfigError> {
        Err(ConfigError::Store("disk full".to_string()))
    }
}

struct Rig {
    engine: Arc<TerrariumEngine>,
    history: Arc<FlakyHistory>,
    clock: Arc<ManualClock>,
    temperature: Arc<MockSensor>,
    humidity: Arc<MockSensor>,
    pump: Arc<MockSwitch>,
    lamp: Arc<MockSwitch>,
    webcam: Arc<MockWebcam>,
    weather: Arc<MockWeather>,
}

fn test_settings() -> EngineSettings {
    EngineSettings {
        cycle_delay: Duration::from_secs(30),
        device_pause: Duration::from_millis(10),
        device_timeout: Duration::from_secs(1),
        ..Default::default()
    }
}

fn build_rig(clock: Arc<ManualClock>) -> Rig {
    build_rig_with(
        clock,
        Arc::new(MemoryConfigStore::new()),
        HostProbe::new("/nonexistent/proc", "/nonexistent/temp"),
    )
}

fn build_rig_with(clock: Arc<ManualClock>, config: Arc<dyn ConfigStore>, host: HostProbe) -> Rig {
    let temperature = MockSensor::new("t1", "temperature", 25.0);
    let humidity = MockSensor::new("h1", "humidity", 80.0);
    let pump = MockSwitch::new("pump", 10.0, 2.0);
    let lamp = MockSwitch::new("lamp", 40.0, 0.0);
    let webcam = Arc::new(MockWebcam {
        id: "cam1".to_string(),
        update_count: AtomicU32::new(0),
    });
    let weather = Arc::new(MockWeather {
        settings: Mutex::new(WeatherSettings {
            location: "Lab".to_string(),
            windspeed: "ms".to_string(),
            temperature: "C".to_string(),
        }),
    });

    let devices = DeviceRegistry::new()
        .with_sensor(temperature.clone())
        .with_sensor(humidity.clone())
        .with_switch(pump.clone())
        .with_switch(lamp.clone())
        .with_webcam(webcam.clone())
        .with_door(Arc::new(ClosedDoor))
        .with_weather(weather.clone());

    let environment = Arc::new(PassiveEnvironment::new(devices.sensors.values().cloned()));
    let history = Arc::new(FlakyHistory::default());
    let engine = TerrariumEngine::new(
        test_settings(),
        devices,
        history.clone(),
        Arc::new(BroadcastHub::new()),
        environment,
        config,
    )
    .with_clock(clock.clone())
    .with_host_probe(host);

    Rig {
        engine: Arc::new(engine),
        history,
        clock,
        temperature,
        humidity,
        pump,
        lamp,
        webcam,
        weather,
    }
}

fn drain(rx: &mut Receiver<Message>) -> Vec<Message> {
    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    messages
}

async fn records(rig: &Rig, category: HistoryCategory) -> Vec<HistoryRecord> {
    rig.history
        .inner
        .query(&[category])
        .await
        .unwrap()
        .records(category)
        .to_vec()
}

#[tokio::test(start_paused = true)]
async fn test_cycle_persists_and_broadcasts_in_order() {
    let rig = build_rig(ManualClock::at(9, 0));
    let mut rx = rig.engine.hub().subscribe_channel(64);

    assert_ok!(EngineLoop::new(rig.engine.clone()).run_cycle().await);

    let kinds: Vec<MessageType> = drain(&mut rx).into_iter().map(|m| m.kind).collect();
    assert_eq!(
        kinds,
        vec![
            MessageType::DashboardOnline,
            MessageType::SensorGauge,
            MessageType::SensorGauge,
            MessageType::SensorGauge,
            MessageType::DashboardUptime,
            MessageType::DashboardPowerUsage,
            MessageType::DashboardWaterFlow,
            MessageType::Environment,
            MessageType::UpdateWeather,
        ]
    );

    assert_eq!(records(&rig, HistoryCategory::Sensors).await.len(), 2);
    assert_eq!(records(&rig, HistoryCategory::Environment).await.len(), 2);
    assert_eq!(records(&rig, HistoryCategory::Summary).await.len(), 1);
    assert_eq!(records(&rig, HistoryCategory::Weather).await.len(), 1);
    assert_eq!(rig.webcam.update_count.load(Ordering::Relaxed), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failing_sensor_does_not_abort_cycle() {
    let rig = build_rig(ManualClock::at(9, 0));
    rig.temperature.should_fail.store(true, Ordering::Relaxed);

    EngineLoop::new(rig.engine.clone()).run_cycle().await.unwrap();

    let sensors = records(&rig, HistoryCategory::Sensors).await;
    assert_eq!(sensors.len(), 1);
    assert!(matches!(&sensors[0], HistoryRecord::Sensors(r) if r.sensor_id == "h1"));
    assert_eq!(records(&rig, HistoryCategory::Summary).await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_sensor_is_bounded() {
    let rig = build_rig(ManualClock::at(9, 0));
    rig.humidity.hang.store(true, Ordering::Relaxed);

    let started = tokio::time::Instant::now();
    EngineLoop::new(rig.engine.clone()).run_cycle().await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(records(&rig, HistoryCategory::Sensors).await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_history_failure_aborts_only_aggregation() {
    let rig = build_rig(ManualClock::at(9, 0));
    rig.history.query_fails.store(true, Ordering::Relaxed);

    let error = assert_err!(EngineLoop::new(rig.engine.clone()).run_cycle().await);

    assert!(matches!(error, EngineError::History(_)));
    assert_eq!(records(&rig, HistoryCategory::Sensors).await.len(), 2);
    assert!(records(&rig, HistoryCategory::Summary).await.is_empty());

    // Store back: the next cycle completes
    rig.history.query_fails.store(false, Ordering::Relaxed);
    EngineLoop::new(rig.engine.clone()).run_cycle().await.unwrap();
    assert_eq!(records(&rig, HistoryCategory::Summary).await.len(), 1);
}

#[tokio::test]
async fn test_pump_scenario_through_engine() {
    let clock = ManualClock::at(8, 30);
    let rig = build_rig(clock.clone());

    for (hour, minute, is_on) in [(8, 0, true), (8, 30, false)] {
        rig.history
            .append(HistoryRecord::Switches(UsageEvent {
                timestamp_millis: local(hour, minute).timestamp_millis(),
                switch_id: "pump".to_string(),
                is_on,
                power_wattage: 10.0,
                water_flow_per_minute: 0.0,
            }))
            .await
            .unwrap();
    }
    clock.set(9, 0);

    let total = rig.engine.daily_usage(UsageMode::Settled).await.unwrap();
    assert!((total.power_watt_hours - 7.5).abs() < 1e-9);

    let totals = rig.engine.get_daily_totals().await.unwrap();
    assert!((totals.total_power_kwh - 0.0075).abs() < 1e-12);
}

#[tokio::test]
async fn test_toggle_records_rate_at_transition() {
    let clock = ManualClock::at(8, 0);
    let rig = build_rig(clock.clone());
    let mut rx = rig.engine.hub().subscribe_channel(16);

    rig.pump.set_on(true);
    rig.engine.toggle_switch("pump", true).await.unwrap();

    // Rate changes while running; the run keeps its recorded rate
    assert!(rig.engine.set_config(ConfigUpdate::Switches(vec![SwitchSettings {
        id: "pump".to_string(),
        name: "pump".to_string(),
        power_wattage: 100.0,
        water_flow: 2.0,
    }])));

    clock.set(9, 0);
    rig.pump.set_on(false);
    rig.engine.toggle_switch("pump", false).await.unwrap();

    let total = rig.engine.daily_usage(UsageMode::Settled).await.unwrap();
    // 1h of 5W baseline + 1h of the pump at 10W
    assert!((total.power_watt_hours - 15.0).abs() < 1e-9);
    assert!((total.water_liters - 120.0).abs() < 1e-9);

    let kinds: Vec<MessageType> = drain(&mut rx).into_iter().map(|m| m.kind).collect();
    assert_eq!(
        kinds,
        vec![
            MessageType::DashboardOnline,
            MessageType::PowerSwitches,
            MessageType::PowerSwitches,
        ]
    );

    assert!(matches!(
        rig.engine.toggle_switch("sprinkler", true).await,
        Err(EngineError::UnknownSwitch(_))
    ));
}

#[tokio::test]
async fn test_open_run_live_but_not_settled() {
    let clock = ManualClock::at(8, 0);
    let rig = build_rig(clock.clone());

    rig.lamp.set_on(true);
    rig.engine.toggle_switch("lamp", true).await.unwrap();
    clock.set(8, 30);

    let settled = rig.engine.daily_usage(UsageMode::Settled).await.unwrap();
    let live = rig.engine.daily_usage(UsageMode::Live).await.unwrap();

    // Baseline alone is 2.5Wh; the lamp adds 20Wh only in the live view
    assert!((settled.power_watt_hours - 2.5).abs() < 1e-9);
    assert!((live.power_watt_hours - 22.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_live_power_water_usage() {
    let rig = build_rig(ManualClock::at(9, 0));
    rig.pump.set_on(true);

    let usage = rig.engine.get_live_power_water_usage().await.unwrap();

    assert_eq!(usage.power.current, 15.0);
    assert_eq!(usage.power.max, 55.0);
    assert_eq!(usage.water.current, 2.0);
    assert_eq!(usage.water.max, 2.0);
    // No history and zero uptime yet
    assert_eq!(usage.power.total, 0.0);
}

#[tokio::test]
async fn test_switch_batch_is_not_atomic() {
    let rig = build_rig(ManualClock::at(9, 0));

    let ok = rig.engine.set_config(ConfigUpdate::Switches(vec![
        SwitchSettings {
            id: "lamp".to_string(),
            name: "Basking lamp".to_string(),
            power_wattage: 60.0,
            water_flow: 0.0,
        },
        SwitchSettings {
            id: "ghost".to_string(),
            name: "Missing".to_string(),
            power_wattage: 1.0,
            water_flow: 0.0,
        },
    ]));

    assert!(!ok);
    assert_eq!(rig.lamp.power_wattage(), 60.0);
}

#[tokio::test]
async fn test_system_config_changes_baseline() {
    let rig = build_rig(ManualClock::at(9, 0));

    assert!(!rig.engine.set_config(ConfigUpdate::System(SystemSettings {
        baseline_wattage: -3.0,
        max_switches: 8,
    })));
    assert_eq!(rig.engine.baseline_wattage(), 5.0);

    assert!(rig.engine.set_config(ConfigUpdate::System(SystemSettings {
        baseline_wattage: 7.0,
        max_switches: 4,
    })));
    assert_eq!(rig.engine.baseline_wattage(), 7.0);
    assert_eq!(rig.engine.max_switches(), 4);

    let config = rig.engine.get_config(Some(ConfigSection::System));
    assert_eq!(config["system"]["baseline_wattage"], json!(7.0));
}

#[tokio::test]
async fn test_dashboard_getters() {
    let rig = build_rig(ManualClock::at(9, 0));
    EngineLoop::new(rig.engine.clone()).run_cycle().await.unwrap();

    assert_eq!(rig.engine.get_sensors(None).len(), 2);
    assert_eq!(rig.engine.get_sensors(Some("h1"))[0].value, 80.0);
    assert_eq!(rig.engine.get_sensors(Some("temperature")).len(), 1);
    assert_eq!(rig.engine.sensor_count(Some("humidity")), 1);
    assert_eq!(rig.engine.get_switches(Some("pump")).len(), 1);
    assert_eq!(rig.engine.webcam_count(), 1);
    assert!(rig.engine.is_door_closed());

    let environment = rig.engine.get_environment(Some("temperature"));
    assert_eq!(environment.len(), 1);
    assert_eq!(environment["temperature"]["current"], json!(25.0));

    let full = rig.engine.get_environment(None);
    assert!(full.contains_key("heater"));

    assert!(matches!(
        rig.engine.get_history(&[]).await,
        Err(EngineError::History(HistoryError::NoCategory))
    ));
    let history = rig
        .engine
        .get_history(&[HistoryCategory::Summary])
        .await
        .unwrap();
    assert_eq!(history.summaries().count(), 1);

    let config = rig.engine.get_config(None);
    assert_eq!(config.len(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_loop_survives_panicking_sensor() {
    let rig = build_rig(ManualClock::at(9, 0));
    rig.temperature.panic_once.store(true, Ordering::Relaxed);
    let mut rx = rig.engine.hub().subscribe_channel(256);

    let handle = EngineLoop::new(rig.engine.clone()).spawn();
    sleep(Duration::from_secs(120)).await;
    handle.abort();

    assert!(rig.temperature.get_update_count() >= 2);
    assert!(!records(&rig, HistoryCategory::Summary).await.is_empty());
    let messages = drain(&mut rx);
    assert_eq!(messages[0].kind, MessageType::DashboardOnline);
    assert!(messages
        .iter()
        .any(|m| m.kind == MessageType::DashboardPowerUsage));
}

#[tokio::test(start_paused = true)]
async fn test_aborting_loop_stops_sampling() {
    let rig = build_rig(ManualClock::at(9, 0));

    let handle = EngineLoop::new(rig.engine.clone()).spawn();
    sleep(Duration::from_secs(65)).await;
    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());

    let at_abort = rig.temperature.get_update_count();
    assert!(at_abort >= 2);
    sleep(Duration::from_secs(300)).await;
    assert_eq!(rig.temperature.get_update_count(), at_abort);
}

#[tokio::test]
async fn test_failed_save_leaves_devices_untouched() {
    let rig = build_rig_with(
        ManualClock::at(9, 0),
        Arc::new(FullDiskConfigStore),
        HostProbe::new("/nonexistent/proc", "/nonexistent/temp"),
    );

    assert!(!rig.engine.set_config(ConfigUpdate::Weather(WeatherSettings {
        location: "Amsterdam".to_string(),
        windspeed: "kmh".to_string(),
        temperature: "F".to_string(),
    })));
    assert_eq!(rig.weather.settings().location, "Lab");

    assert!(!rig.engine.set_config(ConfigUpdate::Switches(vec![SwitchSettings {
        id: "pump".to_string(),
        name: "pump".to_string(),
        power_wattage: 99.0,
        water_flow: 9.0,
    }])));
    assert_eq!(rig.pump.power_wattage(), 10.0);
    assert_eq!(rig.pump.water_flow_per_minute(), 2.0);

    assert!(!rig.engine.set_config(ConfigUpdate::Environment(EnvironmentSettings {
        light: Some(json!({"mode": "timer"})),
        ..Default::default()
    })));
    let config = rig.engine.get_config(Some(ConfigSection::Environment));
    assert_eq!(config["environment"]["light"], serde_json::Value::Null);
}

#[tokio::test]
async fn test_cycle_records_host_stats() {
    let root = std::env::temp_dir().join(format!("terrarium-host-{}", std::process::id()));
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(root.join("loadavg"), "0.52 0.58 0.59 1/467 12345\n").unwrap();
    std::fs::write(
        root.join("meminfo"),
        "MemTotal:        1000 kB\nMemFree:          200 kB\nMemAvailable:     600 kB\n",
    )
    .unwrap();
    std::fs::write(root.join("thermal"), "48312\n").unwrap();

    let rig = build_rig_with(
        ManualClock::at(9, 0),
        Arc::new(MemoryConfigStore::new()),
        HostProbe::new(&root, root.join("thermal")),
    );
    assert_ok!(EngineLoop::new(rig.engine.clone()).run_cycle().await);

    let system = records(&rig, HistoryCategory::System).await;
    assert_eq!(
        system,
        vec![HistoryRecord::System(SystemStats {
            memory: MemoryUsage {
                total: 1000 * 1024,
                used: 400 * 1024,
                free: 200 * 1024,
            },
            load: LoadAverage {
                load1: 0.52,
                load5: 0.58,
                load15: 0.59,
            },
            uptime: 0.0,
            temperature: Some(48.312),
        })]
    );

    let uptime = rig.engine.get_uptime().await;
    assert_eq!(uptime.load5, 0.58);

    std::fs::remove_dir_all(&root).unwrap();
}
