//! Terrarium Engine Library
//!
//! Control and telemetry core for a single-node terrarium rig: a periodic
//! engine loop that samples devices into history, daily power and water usage
//! rebuilt from switch history, and a hub that pushes live state to dashboards.

pub mod broadcast;
pub mod config;
pub mod devices;
pub mod engine;
pub mod engine_loop;
pub mod environment;
pub mod error;
pub mod history;
pub mod host;
pub mod settings;
pub mod usage;
pub mod weather;

// Re-export commonly used types for easier access
pub use broadcast::{BroadcastHub, Message, MessageType};
pub use config::{ConfigSection, ConfigStore, ConfigUpdate, MemoryConfigStore, SystemSettings};
pub use devices::DeviceRegistry;
pub use engine::TerrariumEngine;
pub use engine_loop::EngineLoop;
pub use error::{EngineError, Result};
pub use history::{HistoryStore, MemoryHistoryStore};
pub use settings::EngineSettings;
pub use usage::{compute_daily_usage, UsageAggregator, UsageMode};
