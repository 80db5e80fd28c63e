//! Configuration for sonora applications
//!
//! - Generic YAML config loading/saving
//! - Platform config paths
//! - The `SonoraConfig` document read at startup
//!
//! # Usage
//!
//! ```ignore
//! use sonora_core::config::{default_config_path, load_config, SonoraConfig};
//!
//! let config: SonoraConfig = load_config(&default_config_path());
//! ```

mod io;
mod paths;
mod settings;

pub use io::{load_config, save_config};
pub use paths::{config_dir, default_config_path};
pub use settings::{ReverbConfig, SonoraConfig, DEFAULT_MASTER_GAIN};
