//! Datagram receiver
//!
//! Decodes inbound datagrams, validates them against the grid and records
//! the requested state. Nothing is ever sent back to the client; malformed
//! or out-of-range datagrams are logged and dropped.

use std::io;
use std::net::{SocketAddr, UdpSocket};

use flipdot_protocol::{PixelCommand, WireError};
use log::{debug, info, trace, warn};
use thiserror::Error;

use crate::grid::PixelGrid;
use crate::shutdown::Shutdown;

/// Receive buffer size; anything longer than a command is rejected anyway
pub const RECV_BUF_LEN: usize = 64;

/// Source of inbound datagrams
pub trait DatagramSource {
    /// Receive one datagram into `buf`
    ///
    /// Returns `Ok(None)` when the read timed out without data, which gives
    /// the receiver a chance to observe shutdown.
    fn recv_datagram(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>>;
}

impl DatagramSource for UdpSocket {
    fn recv_datagram(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        match self.recv_from(buf) {
            Ok(received) => Ok(Some(received)),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

impl<T: DatagramSource + ?Sized> DatagramSource for &T {
    fn recv_datagram(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        (**self).recv_datagram(buf)
    }
}

/// Why a datagram was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReceiveError {
    /// Datagram is not exactly one command long
    #[error("invalid length {0}")]
    InvalidLength(usize),
    /// Framing marker missing or reserved bit set
    #[error("invalid structure")]
    InvalidStructure,
    /// Well-formed command addressing a dot outside the display
    #[error("position ({column}, {row}) exceeds allowed positions")]
    OutOfBounds { column: u8, row: u8 },
}

impl From<WireError> for ReceiveError {
    fn from(e: WireError) -> Self {
        match e {
            WireError::InvalidLength(len) => ReceiveError::InvalidLength(len),
            WireError::InvalidStructure => ReceiveError::InvalidStructure,
        }
    }
}

/// Effect of a valid command on its pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The requested state differs from the display; a flip is pending
    FlipPending,
    /// The dot already shows the requested state; no flip is pending
    NoOp,
}

/// Decode a datagram and apply it to the grid
///
/// Touches at most one pixel, and none if the datagram is rejected.
pub fn apply(grid: &PixelGrid, datagram: &[u8]) -> Result<Applied, ReceiveError> {
    let command = PixelCommand::decode(datagram)?;
    let pending = grid
        .request(&command)
        .map_err(|_| ReceiveError::OutOfBounds {
            column: command.column,
            row: command.row,
        })?;
    Ok(if pending {
        Applied::FlipPending
    } else {
        Applied::NoOp
    })
}

/// Receiver counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Valid commands that left a flip pending
    pub flips_requested: u64,
    /// Valid commands matching the displayed state
    pub no_ops: u64,
    /// Datagrams with the wrong length
    pub invalid_length: u64,
    /// Datagrams with bad framing bits
    pub invalid_structure: u64,
    /// Datagrams addressing dots outside the display
    pub out_of_bounds: u64,
    /// Receive errors that were skipped
    pub transient_errors: u64,
}

impl ReceiverStats {
    /// Number of valid commands
    pub fn accepted(&self) -> u64 {
        self.flips_requested + self.no_ops
    }

    /// Number of dropped datagrams
    pub fn rejected(&self) -> u64 {
        self.invalid_length + self.invalid_structure + self.out_of_bounds
    }

    fn record(&mut self, result: &Result<Applied, ReceiveError>) {
        match result {
            Ok(Applied::FlipPending) => self.flips_requested += 1,
            Ok(Applied::NoOp) => self.no_ops += 1,
            Err(ReceiveError::InvalidLength(_)) => self.invalid_length += 1,
            Err(ReceiveError::InvalidStructure) => self.invalid_structure += 1,
            Err(ReceiveError::OutOfBounds { .. }) => self.out_of_bounds += 1,
        }
    }
}

/// Receive loop state
pub struct Receiver<'g, S> {
    grid: &'g PixelGrid,
    source: S,
    stats: ReceiverStats,
    buf: [u8; RECV_BUF_LEN],
}

impl<'g, S: DatagramSource> Receiver<'g, S> {
    /// Create a receiver writing into `grid`
    pub fn new(grid: &'g PixelGrid, source: S) -> Self {
        Self {
            grid,
            source,
            stats: ReceiverStats::default(),
            buf: [0; RECV_BUF_LEN],
        }
    }

    /// Counters so far
    pub fn stats(&self) -> ReceiverStats {
        self.stats
    }

    /// Validate and apply one datagram from `from`
    pub fn handle(&mut self, datagram: &[u8], from: SocketAddr) -> Result<Applied, ReceiveError> {
        let result = apply(self.grid, datagram);
        self.stats.record(&result);

        match &result {
            Ok(applied) => trace!("Command from {}: {:?}", from, applied),
            Err(ReceiveError::InvalidLength(len)) => {
                warn!("Received package with invalid length {} from {}", len, from)
            }
            Err(ReceiveError::InvalidStructure) => {
                warn!("Received package with invalid structure from {}", from)
            }
            Err(ReceiveError::OutOfBounds { column, row }) => warn!(
                "Received package exceeding allowed positions ({}, {}) from {}",
                column, row, from
            ),
        }

        result
    }

    /// Wait for one datagram and apply it
    ///
    /// Returns `Ok(false)` if the read timed out. Transient socket errors are
    /// logged and skipped; any other error is returned.
    pub fn poll_once(&mut self) -> io::Result<bool> {
        let (len, from) = match self.source.recv_datagram(&mut self.buf) {
            Ok(Some(received)) => received,
            Ok(None) => return Ok(false),
            Err(e) if is_transient(&e) => {
                debug!("Skipping transient receive error: {}", e);
                self.stats.transient_errors += 1;
                return Ok(true);
            }
            Err(e) => return Err(e),
        };

        let datagram = self.buf;
        // Dropped datagrams are already logged and counted
        let _ = self.handle(&datagram[..len.min(RECV_BUF_LEN)], from);
        Ok(true)
    }

    /// Receive until shutdown or a fatal socket error
    pub fn run(&mut self, shutdown: &Shutdown) -> io::Result<ReceiverStats> {
        info!("Receiver started");

        while !shutdown.is_triggered() {
            self.poll_once()?;
        }

        info!("Receiver stopped");
        Ok(self.stats)
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::Interrupted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use flipdot_protocol::DotState;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    fn client() -> SocketAddr {
        "192.0.2.7:40000".parse().unwrap()
    }

    fn settled_grid(width: u8, height: u8) -> PixelGrid {
        let grid = PixelGrid::new(width, height).unwrap();
        let positions: Vec<_> = grid.raster().collect();
        for (column, row) in positions {
            grid.take_flip(column, row).unwrap();
        }
        grid
    }

    /// Replays datagrams, then triggers shutdown once drained
    struct ScriptedSource {
        datagrams: RefCell<VecDeque<io::Result<Vec<u8>>>>,
        shutdown: Shutdown,
    }

    impl ScriptedSource {
        fn new(datagrams: Vec<io::Result<Vec<u8>>>, shutdown: Shutdown) -> Self {
            Self {
                datagrams: RefCell::new(datagrams.into()),
                shutdown,
            }
        }
    }

    impl DatagramSource for ScriptedSource {
        fn recv_datagram(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
            match self.datagrams.borrow_mut().pop_front() {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(Some((bytes.len(), client())))
                }
                Some(Err(e)) => Err(e),
                None => {
                    self.shutdown.trigger();
                    Ok(None)
                }
            }
        }
    }

    #[test]
    fn test_apply_valid_command() {
        let grid = settled_grid(4, 2);
        let cmd = PixelCommand::new(1, 1, DotState::Off).encode();
        assert_eq!(apply(&grid, &cmd), Ok(Applied::FlipPending));
        assert!(grid.pixel(1, 1).unwrap().pending_flip);
        assert_eq!(grid.pending_count(), 1);
    }

    #[test]
    fn test_apply_matching_state_is_noop() {
        let grid = settled_grid(4, 2);
        let cmd = PixelCommand::new(2, 1, DotState::On).encode();
        assert_eq!(apply(&grid, &cmd), Ok(Applied::NoOp));
        assert_eq!(grid.pending_count(), 0);
    }

    #[test]
    fn test_apply_never_touches_displayed_state() {
        let grid = settled_grid(4, 2);
        let cmd = PixelCommand::new(0, 0, DotState::Off).encode();
        apply(&grid, &cmd).unwrap();
        assert_eq!(grid.pixel(0, 0).unwrap().displayed, DotState::On);
    }

    #[test]
    fn test_three_byte_datagram_rejected() {
        let grid = settled_grid(4, 2);
        assert_eq!(
            apply(&grid, &[0x81, 0x00, 0x00]),
            Err(ReceiveError::InvalidLength(3))
        );
        assert_eq!(grid.pending_count(), 0);
    }

    #[test]
    fn test_bad_framing_rejected() {
        let grid = settled_grid(4, 2);
        assert_eq!(
            apply(&grid, &[0x01, 0x00]),
            Err(ReceiveError::InvalidStructure)
        );
        assert_eq!(
            apply(&grid, &[0x81, 0x80]),
            Err(ReceiveError::InvalidStructure)
        );
        assert_eq!(grid.pending_count(), 0);
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let grid = settled_grid(112, 16);
        for column in 112..=127u8 {
            let cmd = PixelCommand::new(column, 0, DotState::Off).encode();
            assert_eq!(
                apply(&grid, &cmd),
                Err(ReceiveError::OutOfBounds { column, row: 0 })
            );
        }
        assert_eq!(grid.pending_count(), 0);
    }

    #[test]
    fn test_run_counts_and_stops_on_shutdown() {
        let grid = settled_grid(4, 2);
        let shutdown = Shutdown::new();
        let source = ScriptedSource::new(
            vec![
                Ok(PixelCommand::new(0, 0, DotState::Off).encode().to_vec()),
                Ok(PixelCommand::new(1, 0, DotState::On).encode().to_vec()),
                Ok(vec![0x81, 0x00, 0x00]),
                Ok(vec![0x01, 0x00]),
                Ok(PixelCommand::new(3, 5, DotState::On).encode().to_vec()),
                Err(io::Error::from(io::ErrorKind::Interrupted)),
                Ok(PixelCommand::new(3, 1, DotState::Off).encode().to_vec()),
            ],
            shutdown.clone(),
        );

        let mut receiver = Receiver::new(&grid, source);
        let stats = receiver.run(&shutdown).unwrap();

        assert_eq!(stats.flips_requested, 2);
        assert_eq!(stats.no_ops, 1);
        assert_eq!(stats.invalid_length, 1);
        assert_eq!(stats.invalid_structure, 1);
        assert_eq!(stats.out_of_bounds, 1);
        assert_eq!(stats.transient_errors, 1);
        assert_eq!(stats.accepted(), 3);
        assert_eq!(stats.rejected(), 3);
        assert_eq!(grid.pending_count(), 2);
    }

    #[test]
    fn test_run_returns_fatal_errors() {
        let grid = settled_grid(4, 2);
        let shutdown = Shutdown::new();
        let source = ScriptedSource::new(
            vec![Err(io::Error::from(io::ErrorKind::PermissionDenied))],
            shutdown.clone(),
        );

        let mut receiver = Receiver::new(&grid, source);
        let err = receiver.run(&shutdown).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_run_exits_immediately_when_already_shut_down() {
        let grid = settled_grid(4, 2);
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let source = ScriptedSource::new(
            vec![Ok(PixelCommand::new(0, 0, DotState::Off).encode().to_vec())],
            shutdown.clone(),
        );

        let mut receiver = Receiver::new(&grid, source);
        let stats = receiver.run(&shutdown).unwrap();
        assert_eq!(stats, ReceiverStats::default());
        assert_eq!(grid.pending_count(), 0);
    }
}
