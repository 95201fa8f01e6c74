//! Configuration using Figment
//!
//! Configuration is loaded from:
//! 1. a TOML file (base configuration, e.g. `config/uedinst.toml`)
//! 2. Environment variables (prefixed with `UEDINST_`, sections split on `__`)
//!
//! Every field has a default, so an empty or missing file yields the stock
//! lab setup: camera server on `127.0.0.1:42057`, image hand-off through
//! `<tmp>/_uedinst_temp.dat`.
//!
//! # Example
//! ```no_run
//! use uedinst::config::UedConfig;
//!
//! let config = UedConfig::load()?;
//! println!("Camera server: {}", config.camera.socket_addr());
//! # Ok::<(), uedinst::InstrumentError>(())
//! ```

use crate::error::{InstrumentError, Result};
use crate::validation::{is_valid_ip, is_valid_path, is_valid_port, MAX_ABS_VOLTAGE};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default camera server address.
pub const DEFAULT_CAMERA_ADDRESS: &str = "127.0.0.1";
/// Default camera server port.
pub const DEFAULT_CAMERA_PORT: u16 = 42057;
/// File name of the image hand-off file inside the system temp directory.
pub const TEMP_IMAGE_FILE_NAME: &str = "_uedinst_temp.dat";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UedConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Camera server connection
    #[serde(default)]
    pub camera: CameraConfig,
    /// Analog I/O settings
    #[serde(default)]
    pub daq: DaqConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Connection settings for the Gatan camera server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// IP address of the machine running DigitalMicrograph
    #[serde(default = "default_camera_address")]
    pub address: String,
    /// TCP port of the camera server plugin
    #[serde(default = "default_camera_port")]
    pub port: u16,
    /// Image hand-off file. Must be a path the camera server can write and
    /// this process can read; defaults to a file in the system temp directory.
    #[serde(default)]
    pub temp_image_path: Option<PathBuf>,
    /// Connect timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

/// Analog I/O settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaqConfig {
    /// Voltage envelope, in volts. May tighten the ±10 V hardware bound,
    /// never widen it.
    #[serde(default = "default_voltage_limit")]
    pub voltage_limit: f64,
}

fn default_name() -> String {
    "uedinst".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_camera_address() -> String {
    DEFAULT_CAMERA_ADDRESS.to_string()
}

fn default_camera_port() -> u16 {
    DEFAULT_CAMERA_PORT
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_voltage_limit() -> f64 {
    MAX_ABS_VOLTAGE
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            address: default_camera_address(),
            port: default_camera_port(),
            temp_image_path: None,
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

impl Default for DaqConfig {
    fn default() -> Self {
        Self {
            voltage_limit: default_voltage_limit(),
        }
    }
}

impl CameraConfig {
    /// Config pointing at a specific server, everything else default.
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            ..Default::default()
        }
    }

    /// Use a specific image hand-off file instead of the shared default.
    pub fn with_temp_image_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.temp_image_path = Some(path.into());
        self
    }

    /// `address:port` string used for connecting and in error messages.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// The hand-off file this controller will ask the server to write.
    pub fn image_path(&self) -> PathBuf {
        self.temp_image_path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(TEMP_IMAGE_FILE_NAME))
    }

    /// Connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl UedConfig {
    /// Load configuration from `config/uedinst.toml` and environment variables
    ///
    /// Environment variables can override configuration with prefix `UEDINST_`
    /// Example: `UEDINST_CAMERA__PORT=42058`
    pub fn load() -> Result<Self> {
        Self::load_from("config/uedinst.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("UEDINST_").split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(InstrumentError::range(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        is_valid_ip(&self.camera.address).map_err(|e| {
            InstrumentError::range(format!("camera.address '{}': {e}", self.camera.address))
        })?;
        is_valid_port(self.camera.port)
            .map_err(|e| InstrumentError::range(format!("camera.port: {e}")))?;

        if let Some(path) = &self.camera.temp_image_path {
            is_valid_path(&path.to_string_lossy())
                .map_err(|e| InstrumentError::range(format!("camera.temp_image_path: {e}")))?;
        }

        let limit = self.daq.voltage_limit;
        if !(limit > 0.0 && limit <= MAX_ABS_VOLTAGE) {
            return Err(InstrumentError::range(format!(
                "daq.voltage_limit {limit} must be in (0, {MAX_ABS_VOLTAGE}]"
            )));
        }

        Ok(())
    }
}
