//! Raster renderer
//!
//! Scans the grid row by row, consumes pending flips and writes one command
//! per flip to the output device. The pixel lock is held only while the flip
//! is consumed; encoding, the device write and pacing all happen after it is
//! released.
//!
//! The dot controller is wired right-to-left, so outgoing commands carry the
//! mirrored column `width - 1 - column`.

use core::fmt::Debug;
use std::thread;
use std::time::Duration;

use flipdot_hal::SerialSink;
use flipdot_protocol::{DotState, PixelCommand};
use log::{debug, error, info, trace};

use crate::grid::PixelGrid;
use crate::pacing::Pacer;
use crate::shutdown::Shutdown;

/// Renderer counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Completed raster passes
    pub passes: u64,
    /// Pending flips consumed
    pub flips: u64,
    /// Commands written to the device
    pub writes: u64,
    /// Flips not written because no device is available
    pub suppressed_writes: u64,
    /// Failed device writes
    pub write_errors: u64,
}

/// Result of a single raster pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassOutcome {
    /// Flips consumed during the pass
    pub flips: usize,
    /// False if shutdown interrupted the pass
    pub completed: bool,
}

/// Render loop state
///
/// Owns the output device; the receiver never sees it.
pub struct Renderer<'g, S, P> {
    grid: &'g PixelGrid,
    sink: Option<S>,
    pacer: P,
    idle_pass_delay: Duration,
    stats: RenderStats,
}

impl<'g, S, P> Renderer<'g, S, P>
where
    S: SerialSink,
    S::Error: Debug,
    P: Pacer,
{
    /// Create a renderer
    ///
    /// With `sink = None` the renderer still consumes flips (the grid stays
    /// consistent) but writes nothing.
    pub fn new(grid: &'g PixelGrid, sink: Option<S>, pacer: P) -> Self {
        Self {
            grid,
            sink,
            pacer,
            idle_pass_delay: Duration::ZERO,
            stats: RenderStats::default(),
        }
    }

    /// Pause after passes that consumed no flips (zero yields instead)
    pub fn with_idle_pass_delay(mut self, delay: Duration) -> Self {
        self.idle_pass_delay = delay;
        self
    }

    /// Check if an output device is attached
    pub fn has_output(&self) -> bool {
        self.sink.is_some()
    }

    /// Counters so far
    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Device command for a dot, with the column mirrored
    pub fn device_command(&self, column: u8, row: u8, state: DotState) -> PixelCommand {
        let mirrored = self.grid.width() - 1 - column;
        PixelCommand::new(mirrored, row, state)
    }

    /// Perform one full raster pass
    ///
    /// Shutdown is checked after every pixel; an interrupted pass leaves the
    /// grid consistent.
    pub fn render_pass(&mut self, shutdown: &Shutdown) -> PassOutcome {
        let mut flips = 0;

        for (column, row) in self.grid.raster() {
            // Positions come from the grid itself, so they are always in range
            if let Ok(Some(state)) = self.grid.take_flip(column, row) {
                flips += 1;
                self.stats.flips += 1;
                self.emit(self.device_command(column, row, state));
                self.pacer.pace();
            }

            if shutdown.is_triggered() {
                return PassOutcome {
                    flips,
                    completed: false,
                };
            }
        }

        self.stats.passes += 1;
        PassOutcome {
            flips,
            completed: true,
        }
    }

    fn emit(&mut self, command: PixelCommand) {
        let Some(sink) = self.sink.as_mut() else {
            self.stats.suppressed_writes += 1;
            return;
        };

        trace!(
            "Flip column {} row {} -> {:?}",
            command.column,
            command.row,
            command.state
        );

        match sink.write_blocking(&command.encode()) {
            Ok(()) => self.stats.writes += 1,
            Err(e) => {
                // Output is best-effort: stop writing, keep reconciling
                error!("Output device write failed, disabling output: {:?}", e);
                self.stats.write_errors += 1;
                self.sink = None;
            }
        }
    }

    /// Render passes back to back until shutdown
    ///
    /// Flushes the device before returning.
    pub fn run(&mut self, shutdown: &Shutdown) -> RenderStats {
        info!(
            "Renderer started ({}x{}, output {})",
            self.grid.width(),
            self.grid.height(),
            if self.has_output() { "enabled" } else { "disabled" }
        );

        while !shutdown.is_triggered() {
            let outcome = self.render_pass(shutdown);
            if outcome.completed && outcome.flips == 0 {
                if self.idle_pass_delay.is_zero() {
                    thread::yield_now();
                } else {
                    thread::sleep(self.idle_pass_delay);
                }
            } else if outcome.flips > 0 {
                debug!("Pass wrote {} flips", outcome.flips);
            }
        }

        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.flush() {
                error!("Failed to flush output device: {:?}", e);
            }
        }

        info!("Renderer stopped");
        self.stats
    }

    /// Release the output device
    pub fn into_sink(self) -> Option<S> {
        self.sink
    }
}
