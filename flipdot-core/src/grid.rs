//! Pixel grid
//!
//! One [`Pixel`] per dot, each behind its own mutex. The receiver and the
//! renderer only ever hold a single pixel lock at a time, so a full raster
//! scan never serialises against incoming commands for other dots.

use std::sync::{Mutex, MutexGuard, PoisonError};

use flipdot_protocol::{DotState, PixelCommand, MAX_COLUMNS, MAX_ROWS};
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Grid construction and addressing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GridError {
    /// Dimensions are zero or not addressable by the wire protocol
    #[error("invalid grid dimensions {width}x{height} (must be 1..=128 by 1..=16)")]
    InvalidDimensions { width: u8, height: u8 },
    /// Coordinates lie outside the grid
    #[error("position ({column}, {row}) exceeds grid {width}x{height}")]
    OutOfBounds {
        column: u8,
        row: u8,
        width: u8,
        height: u8,
    },
}

/// State the first render pass drives every dot to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Baseline {
    /// Start from Off with a pending flip: the first pass turns every dot on
    #[default]
    On,
    /// Start from On with a pending flip: the first pass turns every dot off
    Off,
}

impl Baseline {
    /// The displayed state a fresh pixel believes it has
    pub fn initial_displayed(self) -> DotState {
        match self {
            Baseline::On => DotState::Off,
            Baseline::Off => DotState::On,
        }
    }
}

/// State of a single dot
///
/// `displayed` and `pending_flip` are only meaningful as a pair and are
/// always read and written together under the pixel's lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pixel {
    /// Last state believed to be shown on the hardware
    pub displayed: DotState,
    /// The next render pass must toggle `displayed` and emit a write
    pub pending_flip: bool,
}

impl Pixel {
    /// Create a pixel that will be flipped on the first pass
    pub fn pending(displayed: DotState) -> Self {
        Self {
            displayed,
            pending_flip: true,
        }
    }

    /// Record the desired state for this dot
    ///
    /// Schedules a flip iff `desired` differs from the displayed state. A
    /// request for the displayed state cancels any earlier pending flip: the
    /// latest request wins.
    ///
    /// Returns whether a flip is now pending.
    pub fn request(&mut self, desired: DotState) -> bool {
        self.pending_flip = desired != self.displayed;
        self.pending_flip
    }

    /// Consume a pending flip
    ///
    /// Returns the new displayed state if a flip was pending.
    pub fn take_flip(&mut self) -> Option<DotState> {
        if !self.pending_flip {
            return None;
        }
        self.displayed = self.displayed.toggled();
        self.pending_flip = false;
        Some(self.displayed)
    }
}

/// Fixed-size grid of independently locked pixels
///
/// Cells are stored row-major: index = `column + width * row`.
#[derive(Debug)]
pub struct PixelGrid {
    width: u8,
    height: u8,
    cells: Box<[Mutex<Pixel>]>,
}

impl PixelGrid {
    /// Create a grid whose first render pass turns every dot on
    pub fn new(width: u8, height: u8) -> Result<Self, GridError> {
        Self::with_baseline(width, height, Baseline::default())
    }

    /// Create a grid with every pixel pending a flip towards `baseline`
    pub fn with_baseline(width: u8, height: u8, baseline: Baseline) -> Result<Self, GridError> {
        if width == 0 || height == 0 || width > MAX_COLUMNS || height > MAX_ROWS {
            return Err(GridError::InvalidDimensions { width, height });
        }

        let initial = Pixel::pending(baseline.initial_displayed());
        let cells = (0..usize::from(width) * usize::from(height))
            .map(|_| Mutex::new(initial))
            .collect();

        Ok(Self {
            width,
            height,
            cells,
        })
    }

    /// Number of columns
    pub fn width(&self) -> u8 {
        self.width
    }

    /// Number of rows
    pub fn height(&self) -> u8 {
        self.height
    }

    /// Total number of pixels
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Always false; a grid has at least one pixel
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Check that a position lies inside the grid
    pub fn check_bounds(&self, column: u8, row: u8) -> Result<(), GridError> {
        if column >= self.width || row >= self.height {
            return Err(GridError::OutOfBounds {
                column,
                row,
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    fn index(&self, column: u8, row: u8) -> Result<usize, GridError> {
        self.check_bounds(column, row)?;
        Ok(usize::from(column) + usize::from(self.width) * usize::from(row))
    }

    // A panic while holding a pixel lock cannot leave the pair torn: every
    // critical section assigns plain fields, so a poisoned lock is still
    // consistent.
    fn lock(&self, index: usize) -> MutexGuard<'_, Pixel> {
        self.cells[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a client command
    ///
    /// Returns whether a flip is now pending for the addressed pixel.
    /// Out-of-range commands are rejected without touching any pixel.
    pub fn request(&self, command: &PixelCommand) -> Result<bool, GridError> {
        let index = self.index(command.column, command.row)?;
        Ok(self.lock(index).request(command.state))
    }

    /// Consume the pending flip of a pixel, if any
    ///
    /// Returns the new displayed state. The lock is released before this
    /// returns, so callers can write to the device without blocking the
    /// receiver.
    pub fn take_flip(&self, column: u8, row: u8) -> Result<Option<DotState>, GridError> {
        let index = self.index(column, row)?;
        Ok(self.lock(index).take_flip())
    }

    /// Snapshot of a single pixel
    pub fn pixel(&self, column: u8, row: u8) -> Result<Pixel, GridError> {
        let index = self.index(column, row)?;
        Ok(*self.lock(index))
    }

    /// Number of pixels with a pending flip
    ///
    /// Each pixel is locked in turn, so the count is not an atomic snapshot
    /// while the receiver is running.
    pub fn pending_count(&self) -> usize {
        (0..self.cells.len())
            .filter(|&i| self.lock(i).pending_flip)
            .count()
    }

    /// Positions in raster order: row outer, column inner
    pub fn raster(&self) -> impl Iterator<Item = (u8, u8)> {
        let width = self.width;
        (0..self.height).flat_map(move |row| (0..width).map(move |column| (column, row)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn cmd(column: u8, row: u8, on: bool) -> PixelCommand {
        PixelCommand::new(column, row, on.into())
    }

    /// Consume every pending flip, returning how many were taken
    fn drain(grid: &PixelGrid) -> usize {
        let positions: Vec<_> = grid.raster().collect();
        positions
            .into_iter()
            .filter(|&(c, r)| grid.take_flip(c, r).unwrap().is_some())
            .count()
    }

    #[test]
    fn test_initial_state_forces_redraw() {
        let grid = PixelGrid::new(4, 2).unwrap();
        assert_eq!(grid.len(), 8);
        assert_eq!(grid.pending_count(), 8);
        for (column, row) in grid.raster() {
            let pixel = grid.pixel(column, row).unwrap();
            assert_eq!(pixel.displayed, DotState::Off);
            assert!(pixel.pending_flip);
        }
        for (column, row) in grid.raster() {
            assert_eq!(grid.take_flip(column, row).unwrap(), Some(DotState::On));
        }
    }

    #[test]
    fn test_off_baseline() {
        let grid = PixelGrid::with_baseline(3, 3, Baseline::Off).unwrap();
        let pixel = grid.pixel(1, 1).unwrap();
        assert_eq!(pixel.displayed, DotState::On);
        assert_eq!(grid.take_flip(1, 1).unwrap(), Some(DotState::Off));
    }

    #[test]
    fn test_invalid_dimensions() {
        assert!(matches!(
            PixelGrid::new(0, 16),
            Err(GridError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            PixelGrid::new(112, 0),
            Err(GridError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            PixelGrid::new(129, 16),
            Err(GridError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            PixelGrid::new(112, 17),
            Err(GridError::InvalidDimensions { .. })
        ));
        assert!(PixelGrid::new(128, 16).is_ok());
    }

    #[test]
    fn test_raster_order() {
        let grid = PixelGrid::new(3, 2).unwrap();
        let order: Vec<_> = grid.raster().collect();
        assert_eq!(order, vec![(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1)]);
    }

    #[test]
    fn test_request_out_of_bounds_leaves_grid_untouched() {
        let grid = PixelGrid::new(112, 16).unwrap();
        drain(&grid);

        let err = grid.request(&cmd(120, 0, false)).unwrap_err();
        assert_eq!(
            err,
            GridError::OutOfBounds {
                column: 120,
                row: 0,
                width: 112,
                height: 16
            }
        );
        assert!(grid.request(&cmd(0, 16, false)).is_err());
        assert_eq!(grid.pending_count(), 0);
    }

    #[test]
    fn test_request_matching_state_is_noop() {
        let grid = PixelGrid::new(4, 2).unwrap();
        drain(&grid);
        // Everything now shows On
        assert_eq!(grid.request(&cmd(2, 1, true)), Ok(false));
        assert!(!grid.pixel(2, 1).unwrap().pending_flip);
        assert_eq!(grid.take_flip(2, 1), Ok(None));
    }

    #[test]
    fn test_last_request_wins() {
        let grid = PixelGrid::new(4, 2).unwrap();
        drain(&grid);

        assert_eq!(grid.request(&cmd(0, 0, false)), Ok(true));
        // Asking for the displayed state again cancels the pending flip
        assert_eq!(grid.request(&cmd(0, 0, true)), Ok(false));
        assert_eq!(grid.take_flip(0, 0), Ok(None));
        assert_eq!(grid.pixel(0, 0).unwrap().displayed, DotState::On);
    }

    #[test]
    fn test_repeated_request_yields_one_flip() {
        let grid = PixelGrid::new(4, 2).unwrap();
        drain(&grid);

        assert_eq!(grid.request(&cmd(1, 1, false)), Ok(true));
        assert_eq!(grid.request(&cmd(1, 1, false)), Ok(true));
        assert_eq!(grid.pending_count(), 1);
        assert_eq!(grid.take_flip(1, 1), Ok(Some(DotState::Off)));
        assert_eq!(grid.take_flip(1, 1), Ok(None));
    }

    #[test]
    fn test_request_after_render_compares_new_state() {
        let grid = PixelGrid::new(4, 2).unwrap();
        drain(&grid);

        assert_eq!(grid.request(&cmd(3, 0, false)), Ok(true));
        assert_eq!(grid.take_flip(3, 0), Ok(Some(DotState::Off)));
        // Same command again: the dot already shows Off
        assert_eq!(grid.request(&cmd(3, 0, false)), Ok(false));
        // Opposite command flips it back
        assert_eq!(grid.request(&cmd(3, 0, true)), Ok(true));
    }

    #[test]
    fn test_concurrent_requests_and_flips_never_tear() {
        const WIDTH: u8 = 16;
        const HEIGHT: u8 = 8;
        const ROUNDS: usize = 2000;

        let grid = PixelGrid::new(WIDTH, HEIGHT).unwrap();
        let done = AtomicBool::new(false);
        let mut flips = vec![0usize; grid.len()];
        let mut last_requested = vec![DotState::On; grid.len()];

        thread::scope(|s| {
            // One sender per row so every pixel has a single writer and a
            // well-defined last request
            let senders: Vec<_> = (0..HEIGHT)
                .map(|row| {
                    let grid = &grid;
                    s.spawn(move || {
                        let mut seed = 0x9E37_79B9u32 ^ u32::from(row);
                        let mut last = vec![DotState::On; usize::from(WIDTH)];
                        for _ in 0..ROUNDS {
                            seed ^= seed << 13;
                            seed ^= seed >> 17;
                            seed ^= seed << 5;
                            let column = (seed % u32::from(WIDTH)) as u8;
                            let state = DotState::from(seed & 0x100 != 0);
                            grid.request(&PixelCommand::new(column, row, state)).unwrap();
                            last[usize::from(column)] = state;
                        }
                        (row, last)
                    })
                })
                .collect();

            let renderer = s.spawn(|| {
                let mut counts = vec![0usize; grid.len()];
                while !done.load(Ordering::Acquire) {
                    for (i, (column, row)) in grid.raster().enumerate() {
                        if grid.take_flip(column, row).unwrap().is_some() {
                            counts[i] += 1;
                        }
                    }
                }
                counts
            });

            for sender in senders {
                let (row, last) = sender.join().unwrap();
                let start = usize::from(row) * usize::from(WIDTH);
                last_requested[start..start + usize::from(WIDTH)].copy_from_slice(&last);
            }
            done.store(true, Ordering::Release);
            flips = renderer.join().unwrap();
        });

        // Final drain after all senders stopped
        for (i, (column, row)) in grid.raster().enumerate() {
            if grid.take_flip(column, row).unwrap().is_some() {
                flips[i] += 1;
            }
        }

        for (i, (column, row)) in grid.raster().enumerate() {
            let pixel = grid.pixel(column, row).unwrap();
            assert!(!pixel.pending_flip);
            // Every consumed flip toggled the displayed state exactly once
            let expected_parity = DotState::from(flips[i] % 2 == 1);
            assert_eq!(pixel.displayed, expected_parity, "pixel ({column}, {row})");
            // Pixels never addressed keep their baseline On after the first flip
            assert_eq!(pixel.displayed, last_requested[i], "pixel ({column}, {row})");
        }
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_displayed_follows_last_request(
                requests in proptest::collection::vec((0u8..6, 0u8..3, any::<bool>(), any::<bool>()), 1..64)
            ) {
                let grid = PixelGrid::new(6, 3).unwrap();
                drain(&grid);
                let mut expected = vec![DotState::On; grid.len()];

                for (column, row, on, render) in requests {
                    grid.request(&cmd(column, row, on)).unwrap();
                    expected[usize::from(column) + 6 * usize::from(row)] = on.into();
                    if render {
                        drain(&grid);
                    }
                }
                drain(&grid);

                for (i, (column, row)) in grid.raster().enumerate() {
                    prop_assert_eq!(grid.pixel(column, row).unwrap().displayed, expected[i]);
                }
            }
        }
    }
}
