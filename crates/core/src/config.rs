//! Application configuration.

use std::{
    fs,
    path::{Path, PathBuf},
};

use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resource::PortKind;

/// Directory under the platform config dir holding everything we write.
pub const APP_DIR: &str = "fluidport";

const DEFAULT_CONFIG: &str = r#"# fluidport sandbox configuration
# Every key may also be set through a FLUIDPORT_<KEY> environment variable.

# Milliseconds between simulation steps.
tick_rate_ms = 250

# Kind of resource the port carries: "liquid" or "gas".
port_kind = "gas"

# Resource name stored in the structure reservoir.
resource = "steam"

reservoir_capacity = 10000
initial_reservoir = 4000
neighbor_capacity = 8000

# Amount the neighbor pushes into an input port every step.
pump_rate = 250
"#;

/// Errors raised while loading or writing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The layered sources could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
    /// The default file could not be written.
    #[error("failed to write default configuration to {path}: {source}")]
    Write {
        /// Target file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Settings for the sandbox simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Milliseconds between simulation steps.
    pub tick_rate_ms: u64,
    /// Kind of resource the port carries.
    pub port_kind: PortKind,
    /// Resource name stored in the reservoir.
    pub resource: String,
    /// Capacity of the structure reservoir.
    pub reservoir_capacity: u64,
    /// Amount the reservoir starts with.
    pub initial_reservoir: u64,
    /// Capacity of the neighbor tank.
    pub neighbor_capacity: u64,
    /// Amount the neighbor pushes into an input port per step.
    pub pump_rate: u64,
    /// Where snapshots are written.
    pub snapshot_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_rate_ms: 250,
            port_kind: PortKind::Gas,
            resource: "steam".to_string(),
            reservoir_capacity: 10_000,
            initial_reservoir: 4_000,
            neighbor_capacity: 8_000,
            pump_rate: 250,
            snapshot_dir: app_dir().join("snapshots"),
        }
    }
}

impl AppConfig {
    /// Load from the default file and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&default_config_path())
    }

    /// Load from `path` (optional) layered under `FLUIDPORT_*` variables.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with(path, Environment::with_prefix("FLUIDPORT"))
    }

    fn load_with(path: &Path, environment: Environment) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(environment.try_parsing(true))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

fn app_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Location of the configuration file.
pub fn default_config_path() -> PathBuf {
    app_dir().join("config.toml")
}

/// Write the commented default file if none exists yet; returns its path.
pub fn ensure_default_config() -> Result<PathBuf, ConfigError> {
    let path = default_config_path();
    write_default_config(&path)?;
    Ok(path)
}

fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        return Ok(());
    }
    let write_err = |source: std::io::Error| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, DEFAULT_CONFIG).map_err(write_err)
}
