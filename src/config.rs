use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_ENV_VAR: &str = "FRAMETREE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read frame tree config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteIsolationPolicy {
    /// When set, cross-site-instance placeholders are always proxies; a
    /// hidden swapped-out frame is never created.
    pub swapped_out_state_forbidden: bool,
    pub cross_process_frames_possible: bool,
}

impl Default for SiteIsolationPolicy {
    fn default() -> Self {
        Self {
            swapped_out_state_forbidden: true,
            cross_process_frames_possible: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameTreeConfig {
    pub site_isolation: SiteIsolationPolicy,
}

impl FrameTreeConfig {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        match config_path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)?;
                Ok(serde_yaml::from_str(&contents)?)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
    }
}
