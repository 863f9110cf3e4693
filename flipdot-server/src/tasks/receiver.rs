//! Receiver worker
//!
//! Owns the socket. Decodes datagrams into flip requests on the grid.

use flipdot_core::{DatagramSource, PixelGrid, Receiver, ReceiverStats, Shutdown};
use log::{error, info};

use crate::error::ServerError;

/// Receiver worker body
pub fn receiver_task<S: DatagramSource>(
    grid: &PixelGrid,
    source: S,
    shutdown: &Shutdown,
) -> Result<ReceiverStats, ServerError> {
    let mut receiver = Receiver::new(grid, source);

    let stats = receiver.run(shutdown).map_err(|e| {
        error!("Receiver failed: {}", e);
        ServerError::Receive(e)
    })?;

    info!(
        "Receiver: {} accepted ({} flips, {} no-ops), {} rejected",
        stats.accepted(),
        stats.flips_requested,
        stats.no_ops,
        stats.rejected()
    );
    Ok(stats)
}
