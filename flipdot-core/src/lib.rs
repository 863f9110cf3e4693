//! Board-agnostic core of the flip-dot display server
//!
//! This crate contains everything between the network socket and the output
//! device that does not depend on a specific transport or device:
//!
//! - Pixel grid with one lock per dot
//! - Receiver: datagram validation and flip requests
//! - Renderer: raster scan, flip reconciliation, mirrored output
//! - Write pacing
//! - Shutdown signalling
//! - Configuration type definitions
//!
//! The receiver and renderer share a [`grid::PixelGrid`] by reference and
//! never touch each other's resources: the socket belongs to the receiver,
//! the output device to the renderer.

#![deny(unsafe_code)]

pub mod config;
pub mod grid;
pub mod pacing;
pub mod receiver;
pub mod renderer;
pub mod shutdown;

pub use grid::{Baseline, GridError, Pixel, PixelGrid};
pub use pacing::{IntervalPacer, NoPacing, Pacer};
pub use receiver::{Applied, DatagramSource, ReceiveError, Receiver, ReceiverStats};
pub use renderer::{PassOutcome, RenderStats, Renderer};
pub use shutdown::Shutdown;
