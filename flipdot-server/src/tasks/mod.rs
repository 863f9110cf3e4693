//! Worker threads
//!
//! The receiver and renderer run on scoped threads sharing one grid. When
//! either worker ends, for any reason, shutdown is triggered so the other
//! one follows.

pub mod receiver;
pub mod renderer;

use core::fmt::Debug;
use std::thread;

use flipdot_core::config::{PacingConfig, ServerConfig};
use flipdot_core::{DatagramSource, PixelGrid, ReceiverStats, RenderStats, Shutdown};
use flipdot_hal::SerialSink;
use log::info;

use crate::error::ServerError;
use crate::{net, serial};

pub use receiver::receiver_task;
pub use renderer::renderer_task;

/// Worker counters after shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerReport {
    pub receiver: ReceiverStats,
    pub renderer: RenderStats,
}

/// Triggers shutdown when dropped, including on unwind
struct ShutdownOnExit<'a>(&'a Shutdown);

impl Drop for ShutdownOnExit<'_> {
    fn drop(&mut self) {
        self.0.trigger();
    }
}

/// Set up the grid, socket and output device from `config` and serve until
/// shutdown
pub fn run_server(config: &ServerConfig, shutdown: &Shutdown) -> Result<ServerReport, ServerError> {
    let display = &config.display;
    let grid = PixelGrid::with_baseline(display.width, display.height, display.baseline)?;
    let socket = net::bind_udp(&config.network)?;
    let output = serial::open_output(&config.serial);

    serve(&grid, &socket, output, &config.pacing, shutdown)
}

/// Run both workers on `grid` until shutdown
pub fn serve<R, S>(
    grid: &PixelGrid,
    source: R,
    sink: Option<S>,
    pacing: &PacingConfig,
    shutdown: &Shutdown,
) -> Result<ServerReport, ServerError>
where
    R: DatagramSource + Send,
    S: SerialSink + Send,
    S::Error: Debug,
{
    thread::scope(|scope| {
        let receiver = thread::Builder::new()
            .name("receiver".into())
            .spawn_scoped(scope, move || {
                let _exit = ShutdownOnExit(shutdown);
                receiver_task(grid, source, shutdown)
            })
            .map_err(|e| ServerError::Spawn {
                name: "receiver",
                source: e,
            })?;

        let renderer = thread::Builder::new()
            .name("renderer".into())
            .spawn_scoped(scope, move || {
                let _exit = ShutdownOnExit(shutdown);
                renderer_task(grid, sink, pacing, shutdown)
            });
        let renderer = match renderer {
            Ok(handle) => handle,
            Err(e) => {
                shutdown.trigger();
                return Err(ServerError::Spawn {
                    name: "renderer",
                    source: e,
                });
            }
        };

        info!("Server running");
        let received = receiver.join();
        let rendered = renderer.join();

        let receiver = received.map_err(|_| ServerError::WorkerPanicked("receiver"))??;
        let renderer = rendered.map_err(|_| ServerError::WorkerPanicked("renderer"))?;
        Ok(ServerReport { receiver, renderer })
    })
}
