//! Daily power and water usage, rebuilt from switch history.
//!
//! Nothing here keeps a running counter. Every call re-derives the day's
//! usage from raw `UsageEvent`s plus the newest summary written before today,
//! so two calls over the same history give the same answer.
//!
//! A run is credited in full to the day on which it closes. Persisted
//! summaries are computed in [`UsageMode::Settled`] and never contain an open
//! run, so a run spanning midnight is counted exactly once.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveTime, TimeZone};
use serde_derive::{Deserialize, Serialize};

use crate::error::HistoryError;
use crate::history::{DailyUsageTotal, HistoryCategory, HistorySeries, HistoryStore, UsageEvent};

/// Source of "now" for everything date related.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageMode {
    /// Open runs are closed virtually at `now`. Used for dashboards.
    Live,
    /// Only closed on/off pairs count. Used for persisted summaries.
    Settled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageGauge {
    pub current: f64,
    pub max: f64,
    pub total: f64,
}

/// Instantaneous draw, next to the running total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveUsage {
    pub power: UsageGauge,
    pub water: UsageGauge,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyTotals {
    pub total_power_kwh: f64,
    pub total_water_liters: f64,
}

impl From<&DailyUsageTotal> for DailyTotals {
    fn from(total: &DailyUsageTotal) -> Self {
        Self {
            total_power_kwh: total.power_watt_hours / 1000.0,
            total_water_liters: total.water_liters,
        }
    }
}

/// Local midnight at the start of `now`'s day.
pub fn start_of_day(now: &DateTime<Local>) -> DateTime<Local> {
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&midnight).earliest() {
        Some(start) => start,
        // Midnight skipped by a DST jump; count from the first valid instant
        None => *now - (now.naive_local() - midnight),
    }
}

/// Rebuild the usage of `now`'s day from `history`.
///
/// `history` must hold the `switches` and `summary` categories. `uptime` is
/// how long the process has been running; baseline draw is only counted for
/// the part of today the process was actually up.
pub fn compute_daily_usage(
    history: &HistorySeries,
    now: DateTime<Local>,
    uptime: Duration,
    baseline_wattage: f64,
    mode: UsageMode,
) -> DailyUsageTotal {
    let today = start_of_day(&now);
    let today_millis = today.timestamp_millis();
    let now_millis = now.timestamp_millis();

    let elapsed_today = (now_millis - today_millis).max(0) as f64 / 1000.0;
    let runtime_seconds = uptime.as_secs_f64().min(elapsed_today);

    let mut power_watt_hours = runtime_seconds / 3600.0 * baseline_wattage;
    let mut water_liters = 0.0;

    let (seed_power, seed_water) = history
        .summaries()
        .filter(|summary| summary.date < today.date_naive())
        .last()
        .map(|summary| (summary.cumulative_total_power, summary.cumulative_total_water))
        .unwrap_or((0.0, 0.0));

    for mut events in history.switch_events().into_values() {
        if mode == UsageMode::Live {
            close_open_run(&mut events, now_millis);
        }
        let (power, water) = closed_run_usage(&events, today_millis);
        power_watt_hours += power;
        water_liters += water;
    }

    DailyUsageTotal {
        date: today.date_naive(),
        timestamp_millis: now_millis,
        power_watt_hours,
        water_liters,
        cumulative_total_power: seed_power + power_watt_hours,
        cumulative_total_water: seed_water + water_liters,
    }
}

/// Append a virtual "off" at `now_millis` when the last transition is "on".
fn close_open_run(events: &mut Vec<UsageEvent>, now_millis: i64) {
    let closing = match events.last() {
        Some(last) if last.is_on => UsageEvent {
            timestamp_millis: now_millis.max(last.timestamp_millis),
            is_on: false,
            ..last.clone()
        },
        _ => return,
    };
    events.push(closing);
}

/// Sum of (Wh, L) for every on→off pair closing at or after `today_millis`.
fn closed_run_usage(events: &[UsageEvent], today_millis: i64) -> (f64, f64) {
    events
        .windows(2)
        .filter(|pair| pair[0].is_on && !pair[1].is_on && pair[1].timestamp_millis >= today_millis)
        .fold((0.0, 0.0), |(power, water), pair| {
            let (on, off) = (&pair[0], &pair[1]);
            let seconds = (off.timestamp_millis - on.timestamp_millis) as f64 / 1000.0;
            (
                power + seconds / 3600.0 * on.power_wattage,
                water + seconds / 60.0 * on.water_flow_per_minute,
            )
        })
}

/// Runs [`compute_daily_usage`] against a history store.
#[derive(Clone)]
pub struct UsageAggregator {
    history: Arc<dyn HistoryStore>,
}

impl UsageAggregator {
    pub fn new(history: Arc<dyn HistoryStore>) -> Self {
        Self { history }
    }

    pub async fn compute_daily_usage(
        &self,
        now: DateTime<Local>,
        uptime: Duration,
        baseline_wattage: f64,
        mode: UsageMode,
    ) -> Result<DailyUsageTotal, HistoryError> {
        let series = self
            .history
            .query(&[HistoryCategory::Switches, HistoryCategory::Summary])
            .await?;
        Ok(compute_daily_usage(&series, now, uptime, baseline_wattage, mode))
    }
}
