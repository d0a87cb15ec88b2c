//! Configuration for lockstep components

use crate::common::utils::parse_duration;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Checkpoint service connection
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// Default approval-round deadline for new groups (e.g. "90s", "5m").
    /// Unset means rounds never expire unless the creator sets a deadline.
    #[serde(default)]
    pub approval_deadline: Option<String>,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Checkpoint service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Address of the external checkpoint service
    #[serde(default = "default_checkpoint_addr")]
    pub addr: String,
}

fn default_checkpoint_addr() -> String {
    "127.0.0.1:9995".to_string()
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            addr: default_checkpoint_addr(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            checkpoint: CheckpointConfig::default(),
            approval_deadline: None,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load config from `lockstep.toml` and `LOCKSTEP_*` environment
    /// variables, falling back to defaults if neither is present.
    pub fn load() -> Self {
        match Self::try_load() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Load config, surfacing parse errors to the caller.
    pub fn try_load() -> crate::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("lockstep").required(false))
            .add_source(config::Environment::with_prefix("LOCKSTEP").separator("__"))
            .build()
            .map_err(|e| crate::Error::InvalidConfig(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| crate::Error::InvalidConfig(e.to_string()))
    }

    /// Default approval deadline as a parsed duration.
    pub fn approval_deadline(&self) -> crate::Result<Option<Duration>> {
        self.approval_deadline
            .as_deref()
            .map(parse_duration)
            .transpose()
    }
}
