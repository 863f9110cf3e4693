//! Flip-dot Hardware Abstraction Layer
//!
//! This crate defines the output device traits the controller core writes
//! through. The core never opens devices itself; the application picks an
//! implementation (a serial port, a capture buffer in tests, ...) and hands
//! it to the renderer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application (flipdot-server)           │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  flipdot-core (renderer)                │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  flipdot-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`serial::SerialSink`] - Ordered, write-only byte output

#![no_std]
#![deny(unsafe_code)]

pub mod serial;

pub use serial::{DataBits, FlowControl, Parity, SerialConfig, SerialSink, StopBits};
