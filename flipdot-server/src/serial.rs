//! Serial output device
//!
//! Wraps a `serialport` handle as a [`SerialSink`] for the renderer.

use std::io::{self, Write};
use std::time::Duration;

use flipdot_core::config::SerialOutputConfig;
use flipdot_hal::{DataBits, FlowControl, Parity, SerialConfig, SerialSink, StopBits};
use log::{info, warn};
use thiserror::Error;

/// Write timeout for a single command
const WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// Serial device errors
#[derive(Debug, Error)]
pub enum SerialError {
    /// The device could not be opened or configured
    #[error("failed to open serial device {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: serialport::Error,
    },
    /// Writing to or flushing the device failed
    #[error("serial I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Open serial output device
pub struct SerialDevice {
    port: Box<dyn serialport::SerialPort>,
    path: String,
}

impl SerialDevice {
    /// Open `path` with the given line settings
    pub fn open(path: &str, line: &SerialConfig) -> Result<Self, SerialError> {
        let port = serialport::new(path, line.baudrate)
            .data_bits(data_bits(line.data_bits))
            .parity(parity(line.parity))
            .stop_bits(stop_bits(line.stop_bits))
            .flow_control(flow_control(line.flow_control))
            .timeout(WRITE_TIMEOUT)
            .open()
            .map_err(|source| SerialError::Open {
                path: path.to_string(),
                source,
            })?;

        Ok(Self {
            port,
            path: path.to_string(),
        })
    }

    /// Device path
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl SerialSink for SerialDevice {
    type Error = SerialError;

    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.port.write_all(data)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.port.flush()?;
        Ok(())
    }
}

/// Open the configured output device, if any
///
/// A device that cannot be opened is not fatal: the failure is logged once
/// and the server runs without output.
pub fn open_output(config: &SerialOutputConfig) -> Option<SerialDevice> {
    if !config.enabled {
        info!("Serial output disabled");
        return None;
    }

    match SerialDevice::open(&config.device, &config.line()) {
        Ok(device) => {
            info!(
                "Serial output on {} at {} baud",
                device.path(),
                config.baud_rate
            );
            Some(device)
        }
        Err(e) => {
            warn!("{}; dot writes are suppressed", e);
            None
        }
    }
}

fn data_bits(bits: DataBits) -> serialport::DataBits {
    match bits {
        DataBits::Seven => serialport::DataBits::Seven,
        DataBits::Eight => serialport::DataBits::Eight,
    }
}

fn parity(parity: Parity) -> serialport::Parity {
    match parity {
        Parity::None => serialport::Parity::None,
        Parity::Even => serialport::Parity::Even,
        Parity::Odd => serialport::Parity::Odd,
    }
}

fn stop_bits(bits: StopBits) -> serialport::StopBits {
    match bits {
        StopBits::One => serialport::StopBits::One,
        StopBits::Two => serialport::StopBits::Two,
    }
}

fn flow_control(flow: FlowControl) -> serialport::FlowControl {
    match flow {
        FlowControl::None => serialport::FlowControl::None,
        FlowControl::Software => serialport::FlowControl::Software,
        FlowControl::Hardware => serialport::FlowControl::Hardware,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_line_maps_to_8n1() {
        let line = SerialConfig::raw_8n1(74_880);
        assert_eq!(data_bits(line.data_bits), serialport::DataBits::Eight);
        assert_eq!(parity(line.parity), serialport::Parity::None);
        assert_eq!(stop_bits(line.stop_bits), serialport::StopBits::One);
        assert_eq!(flow_control(line.flow_control), serialport::FlowControl::None);
    }

    #[test]
    fn test_configured_framing_maps_through() {
        let config = SerialOutputConfig {
            data_bits: DataBits::Seven,
            parity: Parity::Even,
            stop_bits: StopBits::Two,
            flow_control: FlowControl::Hardware,
            ..Default::default()
        };
        let line = config.line();
        assert_eq!(data_bits(line.data_bits), serialport::DataBits::Seven);
        assert_eq!(parity(line.parity), serialport::Parity::Even);
        assert_eq!(stop_bits(line.stop_bits), serialport::StopBits::Two);
        assert_eq!(flow_control(line.flow_control), serialport::FlowControl::Hardware);

        assert_eq!(parity(Parity::Odd), serialport::Parity::Odd);
        assert_eq!(flow_control(FlowControl::Software), serialport::FlowControl::Software);
    }

    #[test]
    fn test_missing_device_fails_to_open() {
        let result = SerialDevice::open("/dev/flipdot-does-not-exist", &SerialConfig::default());
        match result {
            Err(SerialError::Open { path, .. }) => assert_eq!(path, "/dev/flipdot-does-not-exist"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("device should not exist"),
        }
    }

    #[test]
    fn test_open_output_degrades_to_none() {
        let config = SerialOutputConfig {
            device: "/dev/flipdot-does-not-exist".to_string(),
            ..Default::default()
        };
        assert!(open_output(&config).is_none());

        let disabled = SerialOutputConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(open_output(&disabled).is_none());
    }
}
