//! COUGARS Telemetry Simulator
//!
//! Prints random fleet telemetry in the dashboard's wire format, one event
//! per line. Every frame carries a health value for each (Coug, channel)
//! pair plus a status message and a last message per Coug.
//!
//! # Usage
//! ```bash
//! ./telemetry-sim --vehicles 3 --interval-ms 500 | ./cougars-dashboard --stdin
//! ./telemetry-sim --frames 10 --seed 42 --format text > capture.log
//! ```

use std::io::{self, Write};
use std::time::Duration;

use clap::{Parser, ValueEnum};

use cougars_dashboard::config::defaults;
use cougars_dashboard::telemetry::{encode_event, TelemetrySimulator};
use cougars_dashboard::types::{Channel, TelemetryEvent, VehicleId};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Every event as a JSON line
    Json,
    /// JSON for channel/status events, `N: text` for last messages
    Text,
}

#[derive(Parser, Debug)]
#[command(name = "telemetry-sim")]
#[command(about = "Generate simulated COUGARS fleet telemetry")]
struct Args {
    /// Number of Cougs in the fleet
    #[arg(short, long, default_value_t = defaults::DEFAULT_VEHICLE_COUNT,
          value_parser = clap::value_parser!(u8).range(1..=255))]
    vehicles: u8,

    /// Delay between frames in milliseconds (0 = as fast as possible)
    #[arg(short, long, default_value_t = defaults::SIMULATION_FRAME_INTERVAL_MS)]
    interval_ms: u64,

    /// Stop after this many frames (runs until the pipe closes when omitted)
    #[arg(short, long)]
    frames: Option<u64>,

    /// Random seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,

    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,
}

fn format_event(event: &TelemetryEvent, format: OutputFormat) -> Result<String, Box<dyn std::error::Error>> {
    match (format, event) {
        (OutputFormat::Text, TelemetryEvent::LastMessageUpdate { vehicle, text }) => {
            Ok(format!("{vehicle}: {text}"))
        }
        _ => Ok(encode_event(event)?),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut simulator = TelemetrySimulator::new(VehicleId::fleet(args.vehicles), &Channel::DEFAULT_SET, args.seed);
    let interval = Duration::from_millis(args.interval_ms);

    eprintln!(
        "telemetry-sim: {} Cougs, {} channels, {} ms per frame",
        args.vehicles,
        Channel::DEFAULT_SET.len(),
        args.interval_ms
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();

    loop {
        if args.frames.is_some_and(|limit| simulator.frames() >= limit) {
            break;
        }

        for event in simulator.frame() {
            let line = format_event(&event, args.format)?;
            if let Err(e) = writeln!(out, "{line}") {
                // Reader went away; treat as a normal stop
                if e.kind() == io::ErrorKind::BrokenPipe {
                    return Ok(());
                }
                return Err(e.into());
            }
        }
        match out.flush() {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        if !interval.is_zero() {
            std::thread::sleep(interval);
        }
    }

    eprintln!("telemetry-sim: wrote {} frames", simulator.frames());
    Ok(())
}
