//! Flipdot server
//!
//! Listens for two-byte pixel commands on UDP and drives the flip-dot panel
//! over a serial line. Runs until SIGINT/SIGTERM.

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, LevelFilter};

use flipdot_core::{Baseline, Shutdown};
use flipdot_server::config::{load_config, Overrides};
use flipdot_server::run_server;

#[derive(Parser, Debug)]
#[command(name = "flipdot-server")]
#[command(about = "Networked flip-dot display server", long_about = None)]
struct Cli {
    /// TOML configuration file (defaults to the embedded configuration)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Display width in columns
    #[arg(long)]
    width: Option<u8>,

    /// Display height in rows
    #[arg(long)]
    height: Option<u8>,

    /// State the first render pass drives every dot to
    #[arg(long, value_enum)]
    baseline: Option<BaselineArg>,

    /// Address to listen on
    #[arg(long)]
    bind: Option<IpAddr>,

    /// UDP port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Serial output device
    #[arg(short, long)]
    device: Option<String>,

    /// Serial baud rate
    #[arg(long)]
    baud: Option<u32>,

    /// Run without opening the serial device
    #[arg(long)]
    no_serial: bool,

    /// Pause after each dot write, in microseconds
    #[arg(long)]
    write_interval_us: Option<u64>,

    /// Pause after a pass that flipped nothing, in microseconds
    #[arg(long)]
    idle_pass_delay_us: Option<u64>,

    /// Log level (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<LevelFilter>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum BaselineArg {
    On,
    Off,
}

impl From<BaselineArg> for Baseline {
    fn from(arg: BaselineArg) -> Self {
        match arg {
            BaselineArg::On => Baseline::On,
            BaselineArg::Off => Baseline::Off,
        }
    }
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            width: self.width,
            height: self.height,
            baseline: self.baseline.map(Baseline::from),
            bind: self.bind,
            port: self.port,
            device: self.device.clone(),
            baud_rate: self.baud,
            no_serial: self.no_serial,
            write_interval_us: self.write_interval_us,
            idle_pass_delay_us: self.idle_pass_delay_us,
        }
    }
}

fn init_logging(level: Option<LevelFilter>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder.init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    info!("Flipdot server starting...");

    let config = load_config(cli.config.as_deref(), &cli.overrides())
        .context("failed to load configuration")?;

    let shutdown = Shutdown::new();
    let handler = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("Shutdown requested");
        handler.trigger();
    })
    .context("failed to install signal handler")?;

    let report = run_server(&config, &shutdown).context("server failed")?;

    info!(
        "Flipdot server stopped: {} commands accepted, {} dots written",
        report.receiver.accepted(),
        report.renderer.writes
    );
    Ok(())
}
