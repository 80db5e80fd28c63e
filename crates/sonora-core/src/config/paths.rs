//! Standard locations for sonora configuration files

use std::path::PathBuf;

/// Per-user sonora config directory
///
/// Returns: `<platform config dir>/sonora` (falls back to `./sonora`)
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sonora")
}

/// Returns: `<platform config dir>/sonora/config.yaml`
pub fn default_config_path() -> PathBuf {
    config_dir().join("config.yaml")
}
