//! Configuration type definitions
//!
//! These types represent the server configuration. With the `serde` feature
//! they map one-to-one onto the sections of `flipdot.toml`; every field has a
//! default so a partial file is valid.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use flipdot_hal::{DataBits, FlowControl, Parity, SerialConfig, StopBits};
use flipdot_protocol::{MAX_COLUMNS, MAX_ROWS};
use thiserror::Error;

use crate::grid::Baseline;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default UDP port
pub const DEFAULT_PORT: u16 = 1337;

/// Default output device
pub const DEFAULT_DEVICE: &str = "/dev/serial0";

/// Default display width (columns)
pub const DEFAULT_WIDTH: u8 = 112;

/// Default display height (rows)
pub const DEFAULT_HEIGHT: u8 = 16;

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Display size is zero or not addressable by the wire protocol
    #[error("display size {width}x{height} is not addressable (1..={max_width} columns, 1..={max_height} rows)")]
    InvalidDimensions {
        width: u8,
        height: u8,
        max_width: u8,
        max_height: u8,
    },
    /// Serial output enabled with a zero baud rate
    #[error("serial baud rate must be greater than zero")]
    ZeroBaudRate,
    /// Serial output enabled without a device path
    #[error("serial device path is empty")]
    EmptyDevicePath,
    /// Receive timeout of zero would make the socket block forever
    #[error("network receive timeout must be greater than zero")]
    ZeroReceiveTimeout,
}

/// Display geometry
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct DisplayConfig {
    /// Number of columns
    pub width: u8,
    /// Number of rows
    pub height: u8,
    /// State the first render pass drives every dot to
    pub baseline: Baseline,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            baseline: Baseline::On,
        }
    }
}

/// UDP listener settings
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct NetworkConfig {
    /// Address to bind
    pub bind: IpAddr,
    /// Port to bind
    pub port: u16,
    /// Set `SO_REUSEADDR` before binding
    pub reuse_address: bool,
    /// Receive timeout in milliseconds; bounds how long shutdown takes to
    /// reach the receiver
    pub recv_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            reuse_address: true,
            recv_timeout_ms: 250,
        }
    }
}

impl NetworkConfig {
    /// Socket address to bind
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// Receive timeout as a duration
    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }
}

/// Serial output settings
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct SerialOutputConfig {
    /// Open the output device at startup
    pub enabled: bool,
    /// Device path
    pub device: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits per character
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
}

impl Default for SerialOutputConfig {
    fn default() -> Self {
        let line = SerialConfig::default();
        Self {
            enabled: true,
            device: DEFAULT_DEVICE.to_string(),
            baud_rate: line.baudrate,
            data_bits: line.data_bits,
            parity: line.parity,
            stop_bits: line.stop_bits,
            flow_control: line.flow_control,
        }
    }
}

impl SerialOutputConfig {
    /// Line settings for the output device
    pub fn line(&self) -> SerialConfig {
        SerialConfig {
            baudrate: self.baud_rate,
            data_bits: self.data_bits,
            parity: self.parity,
            stop_bits: self.stop_bits,
            flow_control: self.flow_control,
        }
    }
}

/// Renderer pacing
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct PacingConfig {
    /// Minimum interval after each device write, in microseconds
    pub write_interval_us: u64,
    /// Pause after a pass that wrote nothing, in microseconds (0 = yield)
    pub idle_pass_delay_us: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            write_interval_us: 215,
            idle_pass_delay_us: 0,
        }
    }
}

impl PacingConfig {
    /// Write interval as a duration
    pub fn write_interval(&self) -> Duration {
        Duration::from_micros(self.write_interval_us)
    }

    /// Idle pass delay as a duration
    pub fn idle_pass_delay(&self) -> Duration {
        Duration::from_micros(self.idle_pass_delay_us)
    }
}

/// Complete server configuration
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct ServerConfig {
    pub display: DisplayConfig,
    pub network: NetworkConfig,
    pub serial: SerialOutputConfig,
    pub pacing: PacingConfig,
}

impl ServerConfig {
    /// Check the configuration for values the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let DisplayConfig { width, height, .. } = self.display;
        if width == 0 || height == 0 || width > MAX_COLUMNS || height > MAX_ROWS {
            return Err(ConfigError::InvalidDimensions {
                width,
                height,
                max_width: MAX_COLUMNS,
                max_height: MAX_ROWS,
            });
        }

        if self.network.recv_timeout_ms == 0 {
            return Err(ConfigError::ZeroReceiveTimeout);
        }

        if self.serial.enabled {
            if self.serial.baud_rate == 0 {
                return Err(ConfigError::ZeroBaudRate);
            }
            if self.serial.device.trim().is_empty() {
                return Err(ConfigError::EmptyDevicePath);
            }
        }

        Ok(())
    }
}
