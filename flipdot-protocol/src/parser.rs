//! Byte stream parser for pixel commands
//!
//! Datagrams carry exactly one command each, but a serial link delivers a
//! plain byte stream. The parser reassembles commands from that stream and
//! resynchronises on the framing marker.

use crate::command::{PixelCommand, WireError, FRAME_MARKER};

/// State machine for parsing a command byte stream
#[derive(Debug, Clone, Default)]
pub struct CommandParser {
    state: ParseState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ParseState {
    /// Waiting for a byte with the framing marker
    #[default]
    WaitingForHigh,
    /// Got CMDH, waiting for CMDL
    WaitingForLow(u8),
}

impl CommandParser {
    /// Create a new command parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the parser state
    pub fn reset(&mut self) {
        self.state = ParseState::WaitingForHigh;
    }

    /// Feed a single byte to the parser
    ///
    /// Returns `Ok(Some(command))` when a complete command is parsed,
    /// `Ok(None)` when more bytes are needed, or `Err` when the byte could
    /// not belong to any command.
    pub fn feed(&mut self, byte: u8) -> Result<Option<PixelCommand>, WireError> {
        match self.state {
            ParseState::WaitingForHigh => {
                if byte & FRAME_MARKER == 0 {
                    return Err(WireError::InvalidStructure);
                }
                self.state = ParseState::WaitingForLow(byte);
                Ok(None)
            }
            ParseState::WaitingForLow(high) => {
                if byte & FRAME_MARKER != 0 {
                    // A marker byte always starts a new command; the pending
                    // CMDH was orphaned by a dropped byte.
                    self.state = ParseState::WaitingForLow(byte);
                    return Err(WireError::InvalidLength(1));
                }
                self.reset();
                PixelCommand::decode(&[high, byte]).map(Some)
            }
        }
    }
}
