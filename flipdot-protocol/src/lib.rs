//! Flip-dot pixel command protocol
//!
//! This crate defines the two-byte command shared by the UDP front end and the
//! serial link to the display controller. The same encoding travels both
//! ways; only the column orientation differs (see the server's renderer).
//!
//! # Command Format
//!
//! ```text
//! ┌───────────────────┬───────────────────┐
//! │ CMDH              │ CMDL              │
//! │ 1CCC CCCC         │ 0xxP RRRR         │
//! └───────────────────┴───────────────────┘
//! ```
//!
//! - `1` framing marker, always set on the first byte
//! - `C` column address (0-127)
//! - `0` reserved, always clear on the second byte
//! - `P` dot polarity (1 = on, 0 = off)
//! - `R` row address (0-15)
//! - `x` unused, sent as 0
//!
//! Because only the first byte carries the framing marker, a byte stream can
//! be resynchronised at any byte with bit 7 set.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod command;
pub mod parser;

pub use command::{
    DotState, PixelCommand, WireError, COMMAND_LEN, FRAME_MARKER, MAX_COLUMNS, MAX_ROWS,
};
pub use parser::CommandParser;
