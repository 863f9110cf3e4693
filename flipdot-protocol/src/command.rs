//! Pixel command encoding and decoding
//!
//! Command format:
//! - CMDH (1 byte): framing marker in bit 7, column in bits 6-0
//! - CMDL (1 byte): reserved bit 7 (clear), polarity in bit 4, row in bits 3-0

/// Length of an encoded command in bytes
pub const COMMAND_LEN: usize = 2;

/// Framing marker carried in bit 7 of the first byte
pub const FRAME_MARKER: u8 = 0x80;

/// Reserved bit of the second byte, must be clear
pub const RESERVED_BIT: u8 = 0x80;

/// Polarity bit of the second byte
pub const STATE_BIT: u8 = 0x10;

/// Column field mask (first byte)
pub const COLUMN_MASK: u8 = 0x7F;

/// Row field mask (second byte)
pub const ROW_MASK: u8 = 0x0F;

/// Number of columns addressable on the wire
pub const MAX_COLUMNS: u8 = COLUMN_MASK + 1;

/// Number of rows addressable on the wire
pub const MAX_ROWS: u8 = ROW_MASK + 1;

/// Errors that can occur while decoding a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WireError {
    /// Buffer is not exactly [`COMMAND_LEN`] bytes long
    InvalidLength(usize),
    /// Framing marker missing or reserved bit set
    InvalidStructure,
}

impl core::fmt::Display for WireError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            WireError::InvalidLength(len) => {
                write!(f, "invalid length {} (expected {})", len, COMMAND_LEN)
            }
            WireError::InvalidStructure => f.write_str("invalid structure"),
        }
    }
}

/// Polarity of a single dot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DotState {
    /// Dot shows its dark side
    #[default]
    Off,
    /// Dot shows its bright side
    On,
}

impl DotState {
    /// The opposite polarity
    pub fn toggled(self) -> Self {
        match self {
            DotState::Off => DotState::On,
            DotState::On => DotState::Off,
        }
    }

    /// Check if the dot is on
    pub fn is_on(self) -> bool {
        matches!(self, DotState::On)
    }
}

impl From<bool> for DotState {
    fn from(on: bool) -> Self {
        if on {
            DotState::On
        } else {
            DotState::Off
        }
    }
}

impl From<DotState> for bool {
    fn from(state: DotState) -> Self {
        state.is_on()
    }
}

/// A single "set dot (column, row) to state" command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PixelCommand {
    /// Column address
    pub column: u8,
    /// Row address
    pub row: u8,
    /// Desired dot polarity
    pub state: DotState,
}

impl PixelCommand {
    /// Create a new command
    pub fn new(column: u8, row: u8, state: DotState) -> Self {
        Self { column, row, state }
    }

    /// Encode this command into its two wire bytes
    ///
    /// Column and row are masked to their field widths, so values beyond
    /// [`MAX_COLUMNS`] / [`MAX_ROWS`] wrap.
    pub fn encode(&self) -> [u8; COMMAND_LEN] {
        let state = if self.state.is_on() { STATE_BIT } else { 0 };
        [
            FRAME_MARKER | (self.column & COLUMN_MASK),
            state | (self.row & ROW_MASK),
        ]
    }

    /// Decode a command from a complete datagram
    ///
    /// The buffer must be exactly two bytes, with the framing marker set on
    /// the first byte and the reserved bit clear on the second.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let [high, low] = match bytes {
            [high, low] => [*high, *low],
            _ => return Err(WireError::InvalidLength(bytes.len())),
        };

        if high & FRAME_MARKER == 0 || low & RESERVED_BIT != 0 {
            return Err(WireError::InvalidStructure);
        }

        Ok(Self {
            column: high & COLUMN_MASK,
            row: low & ROW_MASK,
            state: DotState::from(low & STATE_BIT != 0),
        })
    }
}
