//! Controller configuration.

use lattice_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Address the HTTP API listens on.
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Placement pass interval in seconds.
    #[serde(default = "default_placement_interval")]
    pub placement_interval_secs: u64,
    /// Reaper pass interval in seconds.
    #[serde(default = "default_reaper_interval")]
    pub reaper_interval_secs: u64,
    /// Silence after which an active agent is marked missing.
    #[serde(default = "default_missing_after")]
    pub agent_missing_after_secs: u64,
    /// Further silence after which a missing agent is removed.
    #[serde(default = "default_remove_after")]
    pub agent_remove_after_secs: u64,
}

fn default_listen() -> String {
    "0.0.0.0:43210".to_string()
}

fn default_placement_interval() -> u64 {
    5
}

fn default_reaper_interval() -> u64 {
    15
}

fn default_missing_after() -> u64 {
    60
}

fn default_remove_after() -> u64 {
    300
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            placement_interval_secs: default_placement_interval(),
            reaper_interval_secs: default_reaper_interval(),
            agent_missing_after_secs: default_missing_after(),
            agent_remove_after_secs: default_remove_after(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    pub fn placement_interval(&self) -> Duration {
        Duration::from_secs(self.placement_interval_secs)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }

    pub fn agent_missing_after(&self) -> Duration {
        Duration::from_secs(self.agent_missing_after_secs)
    }

    pub fn agent_remove_after(&self) -> Duration {
        Duration::from_secs(self.agent_remove_after_secs)
    }
}
