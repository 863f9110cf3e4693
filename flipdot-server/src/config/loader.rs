//! Configuration loader
//!
//! Order of precedence, lowest first: built-in defaults, the TOML file
//! (`--config`, or the embedded `flipdot.toml`), command-line overrides.
//! The result is validated before it is handed to the server.

use std::fs;
use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use flipdot_core::config::{ConfigError, ServerConfig};
use flipdot_core::Baseline;
use log::{debug, info};
use thiserror::Error;

/// Embedded default configuration (compiled into the binary)
/// Edit flipdot.toml and rebuild to change the defaults
pub const EMBEDDED_CONFIG: &str = include_str!("../../flipdot.toml");

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum LoadError {
    /// Config file could not be read
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Config text is not valid TOML or does not match the schema
    #[error("invalid configuration in {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: toml::de::Error,
    },
    /// Configuration parsed but cannot be run with
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Values given on the command line
///
/// `None` leaves the loaded value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub width: Option<u8>,
    pub height: Option<u8>,
    pub baseline: Option<Baseline>,
    pub bind: Option<IpAddr>,
    pub port: Option<u16>,
    pub device: Option<String>,
    pub baud_rate: Option<u32>,
    pub no_serial: bool,
    pub write_interval_us: Option<u64>,
    pub idle_pass_delay_us: Option<u64>,
}

impl Overrides {
    /// Apply the overrides to `config`
    pub fn apply(&self, config: &mut ServerConfig) {
        if let Some(width) = self.width {
            config.display.width = width;
        }
        if let Some(height) = self.height {
            config.display.height = height;
        }
        if let Some(baseline) = self.baseline {
            config.display.baseline = baseline;
        }
        if let Some(bind) = self.bind {
            config.network.bind = bind;
        }
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(device) = &self.device {
            config.serial.device = device.clone();
        }
        if let Some(baud_rate) = self.baud_rate {
            config.serial.baud_rate = baud_rate;
        }
        if self.no_serial {
            config.serial.enabled = false;
        }
        if let Some(interval) = self.write_interval_us {
            config.pacing.write_interval_us = interval;
        }
        if let Some(delay) = self.idle_pass_delay_us {
            config.pacing.idle_pass_delay_us = delay;
        }
    }
}

/// Parse TOML configuration text
///
/// `origin` names the source in error messages.
pub fn parse_config(text: &str, origin: &str) -> Result<ServerConfig, LoadError> {
    toml::from_str(text).map_err(|source| LoadError::Parse {
        origin: origin.to_string(),
        source,
    })
}

/// Load, override and validate the server configuration
pub fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<ServerConfig, LoadError> {
    let mut config = match path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            let text = fs::read_to_string(path).map_err(|source| LoadError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            parse_config(&text, &path.display().to_string())?
        }
        None => {
            debug!("Using embedded configuration");
            parse_config(EMBEDDED_CONFIG, "embedded flipdot.toml")?
        }
    };

    overrides.apply(&mut config);
    config.validate()?;

    log_config_summary(&config);
    Ok(config)
}

/// Log a summary of the loaded configuration
fn log_config_summary(config: &ServerConfig) {
    info!(
        "Display {}x{}, baseline {:?}",
        config.display.width, config.display.height, config.display.baseline
    );
    debug!("  listen udp://{}", config.network.bind_addr());
    if config.serial.enabled {
        let line = config.serial.line();
        debug!(
            "  serial {} at {} baud, {:?}/{:?}/{:?} bits, {:?} flow control",
            config.serial.device,
            line.baudrate,
            line.data_bits,
            line.parity,
            line.stop_bits,
            line.flow_control
        );
    } else {
        debug!("  serial disabled");
    }
    debug!(
        "  pacing {}us per write, {}us idle",
        config.pacing.write_interval_us, config.pacing.idle_pass_delay_us
    );
}
