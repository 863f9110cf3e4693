//! Flipdot server
//!
//! Host side of the flip-dot display: binds the UDP socket, opens the serial
//! output device and runs the receiver and renderer workers from
//! `flipdot-core` until shutdown.
//!
//! # Architecture
//!
//! ```text
//!   UDP clients ──► [receiver thread] ──► PixelGrid ──► [renderer thread] ──► serial
//!                     decode, bounds       per-dot       raster scan,
//!                     last request wins    Mutex         mirrored, paced
//! ```
//!
//! The grid is owned by [`tasks::run_server`] and lent to both workers as a
//! shared reference inside a thread scope.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod net;
pub mod serial;
pub mod tasks;

pub use error::ServerError;
pub use tasks::{run_server, serve, ServerReport};
