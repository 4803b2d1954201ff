//! Time-series history, grouped by category, with bounded retention.

use std::collections::{BTreeMap, VecDeque};

use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveTime, TimeZone};
use serde_derive::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::devices::{ForecastSample, SensorReading};
use crate::environment::EnvironmentAverage;
use crate::error::HistoryError;
use crate::host::SystemStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryCategory {
    Sensors,
    Environment,
    Switches,
    Summary,
    Weather,
    System,
}

impl HistoryCategory {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "sensors" => Some(Self::Sensors),
            "environment" => Some(Self::Environment),
            "switches" => Some(Self::Switches),
            "summary" => Some(Self::Summary),
            "weather" => Some(Self::Weather),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// One on/off transition of a switch, with the rates in force at that moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub timestamp_millis: i64,
    pub switch_id: String,
    pub is_on: bool,
    pub power_wattage: f64,
    pub water_flow_per_minute: f64,
}

/// Reconstructed usage for one calendar day plus running totals over all days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyUsageTotal {
    pub date: NaiveDate,
    pub timestamp_millis: i64,
    pub power_watt_hours: f64,
    pub water_liters: f64,
    pub cumulative_total_power: f64,
    pub cumulative_total_water: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", content = "record", rename_all = "lowercase")]
pub enum HistoryRecord {
    Sensors(SensorReading),
    Environment(EnvironmentAverage),
    Switches(UsageEvent),
    Summary(DailyUsageTotal),
    Weather(ForecastSample),
    System(SystemStats),
}

impl HistoryRecord {
    pub fn category(&self) -> HistoryCategory {
        match self {
            HistoryRecord::Sensors(_) => HistoryCategory::Sensors,
            HistoryRecord::Environment(_) => HistoryCategory::Environment,
            HistoryRecord::Switches(_) => HistoryCategory::Switches,
            HistoryRecord::Summary(_) => HistoryCategory::Summary,
            HistoryRecord::Weather(_) => HistoryCategory::Weather,
            HistoryRecord::System(_) => HistoryCategory::System,
        }
    }
}

/// Query result: every requested category mapped to its records in append order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistorySeries(pub BTreeMap<HistoryCategory, Vec<HistoryRecord>>);

impl HistorySeries {
    /// Switch transitions grouped by switch id, each ordered by timestamp.
    pub fn switch_events(&self) -> BTreeMap<String, Vec<UsageEvent>> {
        let mut grouped: BTreeMap<String, Vec<UsageEvent>> = BTreeMap::new();
        for record in self.records(HistoryCategory::Switches) {
            if let HistoryRecord::Switches(event) = record {
                grouped
                    .entry(event.switch_id.clone())
                    .or_default()
                    .push(event.clone());
            }
        }
        for events in grouped.values_mut() {
            // Stable, so same-millisecond transitions keep their append order
            events.sort_by_key(|event| event.timestamp_millis);
        }
        grouped
    }

    pub fn summaries(&self) -> impl Iterator<Item = &DailyUsageTotal> {
        self.records(HistoryCategory::Summary)
            .iter()
            .filter_map(|record| match record {
                HistoryRecord::Summary(total) => Some(total),
                _ => None,
            })
    }

    pub fn records(&self, category: HistoryCategory) -> &[HistoryRecord] {
        self.0.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, record: HistoryRecord) -> Result<(), HistoryError>;
    async fn query(&self, categories: &[HistoryCategory]) -> Result<HistorySeries, HistoryError>;
}

/// Sample records kept per category before the oldest are dropped.
pub const DEFAULT_CAPACITY: usize = 20_000;

/// In-process store. Readers and the appending loop share a `RwLock`.
///
/// Retention keeps it bounded:
/// - sample categories hold at most `capacity` records, oldest dropped first;
/// - `summary` keeps the newest record per day;
/// - `switches` drops runs that closed before the newest summary's day. Those
///   can no longer count towards any day still to be computed.
pub struct MemoryHistoryStore {
    records: RwLock<BTreeMap<HistoryCategory, VecDeque<HistoryRecord>>>,
    capacity: usize,
}

impl Default for MemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            capacity: capacity.max(1),
        }
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, record: HistoryRecord) -> Result<(), HistoryError> {
        let mut records = self.records.write().await;
        let category = record.category();

        if let HistoryRecord::Summary(total) = &record {
            let date = total.date;
            if let (Some(cutoff), Some(events)) = (
                day_start_millis(date),
                records.get_mut(&HistoryCategory::Switches),
            ) {
                prune_settled_events(events, cutoff);
            }
            let summaries = records.entry(HistoryCategory::Summary).or_default();
            if matches!(summaries.back(), Some(HistoryRecord::Summary(last)) if last.date == date) {
                summaries.pop_back();
            }
        }

        let items = records.entry(category).or_default();
        items.push_back(record);
        // Switch events are never dropped by count, that would split a run
        if category != HistoryCategory::Switches {
            while items.len() > self.capacity {
                items.pop_front();
            }
        }
        Ok(())
    }

    async fn query(&self, categories: &[HistoryCategory]) -> Result<HistorySeries, HistoryError> {
        let records = self.records.read().await;
        let series = categories
            .iter()
            .map(|category| {
                let items = records
                    .get(category)
                    .map(|items| items.iter().cloned().collect::<Vec<_>>())
                    .unwrap_or_default();
                (*category, items)
            })
            .collect();
        Ok(HistorySeries(series))
    }
}

/// Local midnight at the start of `date`, or `None` when a DST jump skips it.
fn day_start_millis(date: NaiveDate) -> Option<i64> {
    Local
        .from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .map(|start| start.timestamp_millis())
}

/// Drops switch events that only take part in runs closed before `cutoff`.
///
/// Per switch, in timestamp order, an event is kept when it or its successor
/// falls at or after `cutoff`, or when it is the last one (a possibly open run).
/// The dropped events always form a prefix of each switch's timeline.
fn prune_settled_events(events: &mut VecDeque<HistoryRecord>, cutoff: i64) {
    let mut timelines: BTreeMap<&str, Vec<(usize, i64)>> = BTreeMap::new();
    for (index, record) in events.iter().enumerate() {
        if let HistoryRecord::Switches(event) = record {
            timelines
                .entry(event.switch_id.as_str())
                .or_default()
                .push((index, event.timestamp_millis));
        }
    }

    let mut keep = vec![true; events.len()];
    for timeline in timelines.values_mut() {
        timeline.sort_by_key(|(_, timestamp)| *timestamp);
        for (position, (index, timestamp)) in timeline.iter().enumerate() {
            let next = timeline.get(position + 1).map(|(_, next)| *next);
            keep[*index] = *timestamp >= cutoff || next.map_or(true, |next| next >= cutoff);
        }
    }

    let before = events.len();
    let mut index = 0;
    events.retain(|_| {
        let kept = keep[index];
        index += 1;
        kept
    });
    if events.len() < before {
        debug!(dropped = before - events.len(), "Pruned settled switch events");
    }
}
