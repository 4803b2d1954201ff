use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::SystemSettings;

/// Process-level settings, read once from the environment at start-up.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub system: SystemSettings,
    /// Idle time between two engine cycles.
    pub cycle_delay: Duration,
    /// Cooperative pause between consecutive sensors or webcams.
    pub device_pause: Duration,
    /// Upper bound on any single device call.
    pub device_timeout: Duration,
    pub weather_url: Option<String>,
    pub thermal_zone: PathBuf,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            system: SystemSettings::default(),
            cycle_delay: Duration::from_secs(30),
            device_pause: Duration::from_millis(200),
            device_timeout: Duration::from_secs(10),
            weather_url: None,
            thermal_zone: PathBuf::from("/sys/class/thermal/thermal_zone0/temp"),
        }
    }
}

impl EngineSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let settings = Self {
            system: SystemSettings {
                baseline_wattage: parse_or_default(
                    "TERRARIUM_BASELINE_WATTAGE",
                    env::var("TERRARIUM_BASELINE_WATTAGE").ok(),
                    defaults.system.baseline_wattage,
                ),
                max_switches: parse_or_default(
                    "TERRARIUM_MAX_SWITCHES",
                    env::var("TERRARIUM_MAX_SWITCHES").ok(),
                    defaults.system.max_switches,
                ),
            },
            cycle_delay: Duration::from_secs(parse_or_default(
                "TERRARIUM_CYCLE_DELAY_SECS",
                env::var("TERRARIUM_CYCLE_DELAY_SECS").ok(),
                defaults.cycle_delay.as_secs(),
            )),
            device_pause: Duration::from_millis(parse_or_default(
                "TERRARIUM_DEVICE_PAUSE_MS",
                env::var("TERRARIUM_DEVICE_PAUSE_MS").ok(),
                defaults.device_pause.as_millis() as u64,
            )),
            device_timeout: Duration::from_secs(parse_or_default(
                "TERRARIUM_DEVICE_TIMEOUT_SECS",
                env::var("TERRARIUM_DEVICE_TIMEOUT_SECS").ok(),
                defaults.device_timeout.as_secs(),
            )),
            weather_url: env::var("TERRARIUM_WEATHER_URL")
                .ok()
                .filter(|url| !url.is_empty()),
            thermal_zone: env::var("TERRARIUM_THERMAL_ZONE")
                .map(PathBuf::from)
                .unwrap_or(defaults.thermal_zone),
        };

        info!(
            baseline_wattage = settings.system.baseline_wattage,
            cycle_delay = ?settings.cycle_delay,
            device_pause = ?settings.device_pause,
            device_timeout = ?settings.device_timeout,
            weather = settings.weather_url.as_deref().unwrap_or("none"),
            "Engine settings loaded"
        );
        settings
    }
}

/// Parses `val`, falling back to `default` when it is unset or malformed.
fn parse_or_default<T>(name: &str, val: Option<String>, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match val {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Ignoring {name}=`{raw}` ({e}), using {default}");
            default
        }),
    }
}
