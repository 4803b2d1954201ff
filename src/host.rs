//! Host health snapshot read from procfs and sysfs.

use std::path::{Path, PathBuf};

use serde_derive::{Deserialize, Serialize};

use crate::error::DeviceError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadAverage {
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemStats {
    pub memory: MemoryUsage,
    pub load: LoadAverage,
    pub uptime: f64,
    /// Degrees Celsius, or `None` when the board has no thermal zone.
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Uptime {
    pub uptime_seconds: f64,
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
}

#[derive(Debug, Clone)]
pub struct HostProbe {
    proc_root: PathBuf,
    thermal_zone: PathBuf,
}

impl HostProbe {
    pub fn new(proc_root: impl Into<PathBuf>, thermal_zone: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            thermal_zone: thermal_zone.into(),
        }
    }

    pub async fn load_average(&self) -> Result<LoadAverage, DeviceError> {
        let raw = read_file(&self.proc_root.join("loadavg")).await?;
        parse_loadavg(&raw)
    }

    pub async fn memory(&self) -> Result<MemoryUsage, DeviceError> {
        let raw = read_file(&self.proc_root.join("meminfo")).await?;
        parse_meminfo(&raw)
    }

    pub async fn cpu_temperature(&self) -> Result<f64, DeviceError> {
        let raw = read_file(&self.thermal_zone).await?;
        parse_millidegrees(&raw)
    }

    /// One sample of host metrics. `uptime` is supplied by the caller.
    pub async fn system_stats(&self, uptime: f64) -> Result<SystemStats, DeviceError> {
        let memory = self.memory().await?;
        let load = self.load_average().await?;
        let temperature = self.cpu_temperature().await.ok();
        Ok(SystemStats {
            memory,
            load,
            uptime,
            temperature,
        })
    }
}

impl Default for HostProbe {
    fn default() -> Self {
        Self::new("/proc", "/sys/class/thermal/thermal_zone0/temp")
    }
}

async fn read_file(path: &Path) -> Result<String, DeviceError> {
    Ok(tokio::fs::read_to_string(path).await?)
}

fn parse_loadavg(raw: &str) -> Result<LoadAverage, DeviceError> {
    let mut fields = raw.split_whitespace().map(|field| {
        field
            .parse::<f64>()
            .map_err(|e| DeviceError::Parse(format!("loadavg field `{field}`: {e}")))
    });
    let mut next = || {
        fields
            .next()
            .unwrap_or_else(|| Err(DeviceError::Parse("loadavg is truncated".to_string())))
    };
    Ok(LoadAverage {
        load1: next()?,
        load5: next()?,
        load15: next()?,
    })
}

fn parse_meminfo(raw: &str) -> Result<MemoryUsage, DeviceError> {
    let field = |name: &str| -> Result<u64, DeviceError> {
        raw.lines()
            .find_map(|line| line.strip_prefix(name)?.strip_prefix(':'))
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|kib| kib.parse::<u64>().ok())
            .map(|kib| kib * 1024)
            .ok_or_else(|| DeviceError::Parse(format!("meminfo has no usable {name}")))
    };
    let total = field("MemTotal")?;
    let free = field("MemFree")?;
    let available = field("MemAvailable").unwrap_or(free);
    Ok(MemoryUsage {
        total,
        used: total.saturating_sub(available),
        free,
    })
}

fn parse_millidegrees(raw: &str) -> Result<f64, DeviceError> {
    raw.trim()
        .parse::<f64>()
        .map(|milli| milli / 1000.0)
        .map_err(|e| DeviceError::Parse(format!("thermal zone value `{}`: {e}", raw.trim())))
}
