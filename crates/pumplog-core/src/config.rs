//! Configuration loading.
//!
//! A single optional TOML file; a missing file means defaults. Only the
//! embedding application decides where the file lives.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Tunable settings for an embedding application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PumplogConfig {
    /// Directory the file-backed store writes under.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Rolling retention window in hours.
    #[serde(default = "default_retention_hours")]
    pub retention_hours: i64,
}

impl Default for PumplogConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            retention_hours: default_retention_hours(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pumplog")
}

const fn default_retention_hours() -> i64 {
    24
}

/// Load configuration from `path`, falling back to defaults when the file
/// does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<PumplogConfig> {
    if !path.exists() {
        return Ok(PumplogConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<PumplogConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}
