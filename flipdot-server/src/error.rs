//! Server setup errors
//!
//! Only setup failures reach the top level. Protocol errors stay inside the
//! receiver and device errors inside the renderer.

use std::io;
use std::net::SocketAddr;

use flipdot_core::GridError;
use thiserror::Error;

/// Errors that stop the server
#[derive(Debug, Error)]
pub enum ServerError {
    /// Display geometry rejected by the grid
    #[error(transparent)]
    Grid(#[from] GridError),
    /// Creating or configuring the UDP socket failed
    #[error("failed to set up UDP socket: {0}")]
    Socket(#[source] io::Error),
    /// Binding the UDP socket failed
    #[error("failed to bind UDP socket to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    /// A worker thread could not be started
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: io::Error,
    },
    /// The receiver hit a socket error it cannot recover from
    #[error("receiver stopped on socket error: {0}")]
    Receive(#[source] io::Error),
    /// A worker thread panicked
    #[error("{0} thread panicked")]
    WorkerPanicked(&'static str),
}
