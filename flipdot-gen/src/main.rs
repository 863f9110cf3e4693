//! Flipdot pattern generator
//!
//! Sends full frames to a flipdot server, one datagram per dot, in raster
//! order. Draws a built-in pattern or a PNG picture, once or continuously
//! until interrupted. Useful for exercising the server without a real client.

mod image;
mod pattern;

use std::io::{self, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};

use crate::image::{GrayImage, Scale};
use crate::pattern::{Frame, Pattern, XorShift};

#[derive(Parser, Debug)]
#[command(name = "flipdot-gen")]
#[command(about = "Send a test pattern to a flipdot server", long_about = None)]
struct Cli {
    /// Pattern to draw
    #[arg(value_enum, default_value_t = Pattern::Random)]
    pattern: Pattern,

    /// Send a PNG picture instead of a pattern
    #[arg(long, value_name = "PNG")]
    image: Option<PathBuf>,

    /// How the picture is fitted onto the panel
    #[arg(long, value_enum, default_value_t = Scale::Fill, requires = "image")]
    scale: Scale,

    /// Hard threshold instead of dithering the picture
    #[arg(long, requires = "image")]
    no_dither: bool,

    /// Swap on and off dots
    #[arg(long)]
    invert: bool,

    /// Keep sending frames until interrupted
    #[arg(long = "loop")]
    repeat: bool,

    /// Frame rate in loop mode
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..=1000))]
    fps: u32,

    /// Server address
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    ip: IpAddr,

    /// Server port
    #[arg(short, long, default_value_t = 1337)]
    port: u16,

    /// Panel width in columns
    #[arg(long, default_value_t = 112, value_parser = clap::value_parser!(u8).range(1..=128))]
    width: u8,

    /// Panel height in rows
    #[arg(long, default_value_t = 16, value_parser = clap::value_parser!(u8).range(1..=16))]
    height: u8,

    /// Pause between datagrams, in microseconds
    #[arg(long, default_value_t = 0)]
    interval_us: u64,

    /// Seed for the random pattern (defaults to the current time)
    #[arg(long)]
    seed: Option<u64>,

    /// Don't print the preview
    #[arg(short, long)]
    quiet: bool,
}

/// What each frame shows
enum Source {
    Pattern(Pattern),
    /// Pictures don't change, so the frame is built once
    Image(Frame),
}

fn seed_from_clock() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or(0)
}

/// Time between frame starts at `fps`
fn frame_period(fps: u32) -> Duration {
    Duration::from_secs(1) / fps.max(1)
}

/// Send every dot of `frame`, returning (bytes, datagrams)
fn send_frame(
    socket: &UdpSocket,
    target: SocketAddr,
    frame: &Frame,
    interval: Duration,
) -> Result<(usize, usize)> {
    let mut bytes = 0;
    let mut packages = 0;
    for command in frame.commands() {
        bytes += socket
            .send_to(&command.encode(), target)
            .with_context(|| format!("failed to send to {target}"))?;
        packages += 1;
        if !interval.is_zero() {
            thread::sleep(interval);
        }
    }
    Ok((bytes, packages))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let source = match &cli.image {
        Some(path) => {
            let picture = GrayImage::open(path)?;
            debug!(
                "Loaded {} ({}x{}), scale {:?}",
                path.display(),
                picture.width(),
                picture.height(),
                cli.scale
            );
            Source::Image(Frame::from_image(
                &picture,
                cli.scale,
                cli.width,
                cli.height,
                !cli.no_dither,
            ))
        }
        None => Source::Pattern(cli.pattern),
    };

    let seed = cli.seed.unwrap_or_else(seed_from_clock);
    let mut rng = XorShift::new(seed);
    debug!("Seed {}", seed);

    let target = SocketAddr::new(cli.ip, cli.port);
    let local: SocketAddr = match target {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => "[::]:0".parse()?,
    };
    let socket = UdpSocket::bind(local).context("failed to create UDP socket")?;

    let running = Arc::new(AtomicBool::new(true));
    if cli.repeat {
        let flag = Arc::clone(&running);
        ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))
            .context("failed to install Ctrl-C handler")?;
        info!("Sending to {} at {} fps, Ctrl-C to stop", target, cli.fps);
    } else {
        info!("Sending to {}", target);
    }

    let interval = Duration::from_micros(cli.interval_us);
    let period = frame_period(cli.fps);
    let start = Instant::now();
    let mut stdout = io::stdout();
    let mut frames = 0u64;
    let mut bytes = 0;
    let mut packages = 0;

    loop {
        let frame_start = Instant::now();
        let mut frame = match &source {
            Source::Pattern(pattern) => Frame::draw(
                *pattern,
                cli.width,
                cli.height,
                &mut rng,
                start.elapsed().as_secs_f64(),
            ),
            Source::Image(frame) => frame.clone(),
        };
        if cli.invert {
            frame.invert();
        }

        if !cli.quiet {
            if frames > 0 {
                // Redraw the preview in place
                write!(stdout, "\x1b[{}A", frame.height()).context("failed to print preview")?;
            }
            stdout
                .write_all(frame.preview().as_bytes())
                .and_then(|()| stdout.flush())
                .context("failed to print preview")?;
        }

        let (sent, count) = send_frame(&socket, target, &frame, interval)?;
        bytes += sent;
        packages += count;
        frames += 1;

        if !cli.repeat || !running.load(Ordering::SeqCst) {
            break;
        }
        if let Some(rest) = period.checked_sub(frame_start.elapsed()) {
            thread::sleep(rest);
        }
        if !running.load(Ordering::SeqCst) {
            break;
        }
    }

    if cli.repeat {
        println!("Sent {} bytes in {} packages over {} frames", bytes, packages, frames);
    } else {
        println!("Sent {} bytes in {} packages", bytes, packages);
    }
    Ok(())
}
