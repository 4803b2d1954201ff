use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigSection;

/// Failure of a single hardware or network device call.
///
/// These never abort an engine cycle; the loop logs them and moves on.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Device {device} read failed: {reason}")]
    Read { device: String, reason: String },

    #[error("Device {device} did not answer within {after:?}")]
    Timeout { device: String, after: Duration },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("History store unavailable: {0}")]
    Unavailable(String),

    #[error("History serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No history category selected")]
    NoCategory,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {section} settings: {reason}")]
    Invalid {
        section: ConfigSection,
        reason: String,
    },

    #[error("Unknown {section} item `{id}`")]
    UnknownItem { section: ConfigSection, id: String },

    #[error("Config store error: {0}")]
    Store(String),

    #[error("Config serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Unknown switch `{0}`")]
    UnknownSwitch(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
