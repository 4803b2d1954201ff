use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::broadcast::MessageType;
use crate::engine::TerrariumEngine;
use crate::error::{DeviceError, Result};
use crate::history::HistoryRecord;
use crate::usage::UsageMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Sampling,
    Aggregating,
    Persisting,
    Broadcasting,
    Idle,
}

/// Drives the engine through one fixed sequence of steps per cycle, forever.
///
/// Device failures are logged and skipped. A failed usage aggregation ends
/// the cycle early; the next one starts after the usual idle delay.
pub struct EngineLoop {
    engine: Arc<TerrariumEngine>,
}

impl EngineLoop {
    pub fn new(engine: Arc<TerrariumEngine>) -> Self {
        Self { engine }
    }

    /// Spawns the loop under a supervisor that restarts it after a panic.
    ///
    /// Aborting the returned handle also stops the running worker.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let delay = self.engine.settings().cycle_delay;
            loop {
                let worker = EngineLoop::new(self.engine.clone());
                let mut worker = AbortOnDrop(tokio::spawn(async move { worker.run().await }));
                match (&mut worker.0).await {
                    Ok(()) => {
                        warn!("Engine loop returned, restarting");
                    }
                    Err(e) if e.is_panic() => {
                        error!("Engine loop panicked, restarting in {delay:?}");
                        sleep(delay).await;
                    }
                    Err(e) => {
                        info!("Engine loop cancelled: {e}");
                        break;
                    }
                }
            }
        })
    }

    pub async fn run(&self) {
        info!("Starting engine loop");
        let mut cycle: u64 = 0;
        loop {
            cycle += 1;
            if let Err(e) = self.run_cycle().await {
                error!(cycle, "Engine cycle aborted: {e}");
            }
            self.enter(CyclePhase::Idle);
            sleep(self.engine.settings().cycle_delay).await;
        }
    }

    /// One full pass over sensors, usage, weather, host and webcams.
    pub async fn run_cycle(&self) -> Result<()> {
        self.enter(CyclePhase::Sampling);
        self.sample_sensors().await;
        self.record_environment().await;

        self.enter(CyclePhase::Aggregating);
        let total = self.engine.daily_usage(UsageMode::Settled).await?;

        self.enter(CyclePhase::Persisting);
        debug!(
            date = %total.date,
            power_wh = total.power_watt_hours,
            water_l = total.water_liters,
            "Daily usage reconstructed"
        );
        self.engine
            .history()
            .append(HistoryRecord::Summary(total))
            .await?;

        self.enter(CyclePhase::Broadcasting);
        self.engine.push_uptime().await;
        self.engine.push_power_usage_water_flow().await?;
        self.engine.push_environment();

        self.enter(CyclePhase::Sampling);
        self.refresh_weather().await;
        self.record_host_stats().await;
        self.update_webcams().await;
        Ok(())
    }

    fn enter(&self, phase: CyclePhase) {
        debug!(?phase, "Engine phase");
    }

    async fn sample_sensors(&self) {
        let settings = self.engine.settings();
        for (id, sensor) in &self.engine.devices().sensors {
            match bounded(id, settings.device_timeout, sensor.update()).await {
                Ok(reading) => {
                    self.append(HistoryRecord::Sensors(reading.clone())).await;
                    self.engine.hub().send(MessageType::SensorGauge, vec![reading]);
                }
                Err(e) => warn!(sensor = %id, "Sensor skipped this cycle: {e}"),
            }
            sleep(settings.device_pause).await;
        }
    }

    async fn record_environment(&self) {
        let averages = self.engine.get_average_sensors();
        for average in &averages {
            self.append(HistoryRecord::Environment(average.clone())).await;
        }
        self.engine.hub().send(MessageType::SensorGauge, averages);
    }

    async fn refresh_weather(&self) {
        let Some(weather) = self.engine.devices().weather.clone() else {
            return;
        };
        let settings = self.engine.settings();
        if let Err(e) = bounded("weather", settings.device_timeout, weather.update()).await {
            warn!("Weather refresh skipped this cycle: {e}");
            return;
        }
        let now_millis = self.engine.now().timestamp_millis();
        match weather.data().nearest_hour(now_millis) {
            Some(sample) => self.append(HistoryRecord::Weather(sample.clone())).await,
            None => debug!("Weather forecast has no hourly samples"),
        }
        self.engine.push_weather();
    }

    async fn record_host_stats(&self) {
        let uptime = self.engine.uptime().as_secs_f64();
        match self.engine.host().system_stats(uptime).await {
            Ok(stats) => self.append(HistoryRecord::System(stats)).await,
            Err(e) => warn!("Host stats skipped this cycle: {e}"),
        }
    }

    async fn update_webcams(&self) {
        let settings = self.engine.settings();
        for (id, webcam) in &self.engine.devices().webcams {
            if let Err(e) = bounded(id, settings.device_timeout, webcam.update()).await {
                warn!(webcam = %id, "Webcam skipped this cycle: {e}");
            }
            sleep(settings.device_pause).await;
        }
    }

    /// History writes from device steps are best effort.
    async fn append(&self, record: HistoryRecord) {
        let category = record.category();
        if let Err(e) = self.engine.history().append(record).await {
            warn!(?category, "History append failed: {e}");
        }
    }
}

/// Aborts the worker task when the supervisor holding it goes away.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Runs a device call, giving up after `after`.
pub async fn bounded<T>(
    device: &str,
    after: Duration,
    call: impl Future<Output = std::result::Result<T, DeviceError>>,
) -> std::result::Result<T, DeviceError> {
    match timeout(after, call).await {
        Ok(result) => result,
        Err(_) => Err(DeviceError::Timeout {
            device: device.to_string(),
            after,
        }),
    }
}
