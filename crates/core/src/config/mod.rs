use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for the host runtime.
///
/// Every section falls back to its defaults, so an empty JSON object is a
/// valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub audio: AudioConfig,
    pub analysis: AnalysisConfig,
    pub ui: UiConfig,
    pub host: HostPolicy,
    pub plugins: PluginConfig,
}

impl HostConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&text)?;
        tracing::debug!(path = ?path.as_ref(), "loaded host configuration");
        Ok(config)
    }
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub block_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            block_size: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Number of onset values kept in each pulse buffer.
    pub pulse_history: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { pulse_history: 256 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Upper bound on live controls across all instances.
    pub max_controls: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self { max_controls: 64 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostPolicy {
    /// Reject analysis queries outside the plugin's declared capabilities
    /// instead of answering with whatever the host happens to hold.
    pub strict_capabilities: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Directories scanned for visualisation libraries.
    pub search_paths: Vec<PathBuf>,
}
