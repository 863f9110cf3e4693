//! Renderer worker
//!
//! Owns the output device. Reconciles the grid with the panel, one paced
//! dot write at a time.

use core::fmt::Debug;

use flipdot_core::config::PacingConfig;
use flipdot_core::{IntervalPacer, PixelGrid, RenderStats, Renderer, Shutdown};
use flipdot_hal::SerialSink;
use log::info;

/// Renderer worker body
///
/// The device is dropped (closed) when this returns.
pub fn renderer_task<S>(
    grid: &PixelGrid,
    sink: Option<S>,
    pacing: &PacingConfig,
    shutdown: &Shutdown,
) -> RenderStats
where
    S: SerialSink,
    S::Error: Debug,
{
    let pacer = IntervalPacer::new(pacing.write_interval());
    if let Some(rate) = pacer.max_rate() {
        info!("Write pacing {:?} (at most {} dots/s)", pacer.interval(), rate);
    }

    let mut renderer =
        Renderer::new(grid, sink, pacer).with_idle_pass_delay(pacing.idle_pass_delay());
    let stats = renderer.run(shutdown);

    info!(
        "Renderer: {} passes, {} flips, {} written, {} suppressed, {} write errors",
        stats.passes, stats.flips, stats.writes, stats.suppressed_writes, stats.write_errors
    );
    stats
}
