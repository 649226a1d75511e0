//! Round commands: start, toggle, fix, track, status, end.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Subcommand;

use plow::error::Error;
use plow::model::{Position, Round};
use plow::position::{ManualSource, PositionEvent, UnsupportedSource};
use plow::round::{GpsStatus, Phase};
use plow::session::Session;
use plow::storage::KeyValueStore;

use crate::config::Config;

use super::format::{format_gps, format_position, format_timestamp, short_id};
use super::{device_source, open_session, resolve_id};

#[derive(Debug, Subcommand)]
pub enum RoundCommand {
    /// Start a round over every registered customer.
    Start {
        /// NMEA device or log file (overrides config).
        #[arg(long)]
        device: Option<PathBuf>,
    },

    /// Mark a stop complete, or incomplete again.
    Toggle {
        /// Customer ID: full UUID or unambiguous prefix (e.g. `a3b`).
        customer: String,
    },

    /// Record a position by hand.
    Fix {
        /// Latitude in decimal degrees.
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude in decimal degrees.
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
    },

    /// Follow the GPS device, recording the route as it arrives.
    Track {
        /// NMEA device or log file (overrides config).
        #[arg(long)]
        device: Option<PathBuf>,

        /// Stop after this many samples.
        #[arg(long)]
        samples: Option<usize>,
    },

    /// Show the round in progress.
    Status,

    /// End the round and archive it.
    End,
}

pub(super) fn run(
    command: &RoundCommand,
    store: Arc<dyn KeyValueStore>,
    config: &Config,
) -> Result<(), String> {
    match command {
        RoundCommand::Start { device } => {
            let source = device_source(config, device.as_deref());
            cmd_start(&mut open_session(store, source, config)?)
        }
        RoundCommand::Toggle { customer } => {
            let mut session = open_session(store, Box::new(UnsupportedSource), config)?;
            cmd_toggle(&mut session, customer)
        }
        RoundCommand::Fix { lat, lng } => cmd_fix(store, config, *lat, *lng),
        RoundCommand::Track { device, samples } => {
            let source = device_source(config, device.as_deref());
            cmd_track(&mut open_session(store, source, config)?, *samples)
        }
        RoundCommand::Status => {
            let session = open_session(store, Box::new(UnsupportedSource), config)?;
            cmd_status(&session);
            Ok(())
        }
        RoundCommand::End => {
            let mut session = open_session(store, Box::new(UnsupportedSource), config)?;
            cmd_end(&mut session)
        }
    }
}

/// Starts the round, keeps any fix already waiting, and detaches the source:
/// the stream does not outlive this process.
fn cmd_start(session: &mut Session) -> Result<(), String> {
    let round = session
        .start_round()
        .map_err(|e| format!("failed to start round: {e}"))?;
    let applied = session
        .pump()
        .map_err(|e| format!("failed to record position: {e}"))?;
    session.stop_tracking();

    println!(
        "Round {} started with {} stops",
        short_id(round.id),
        round.customers.len()
    );
    if applied > 0 {
        println!("{applied} positions recorded");
    }
    if session.gps().last_error.is_some() {
        print_gps_advisory(session.gps());
    } else {
        println!("Run `plow round track` to record the route.");
    }
    Ok(())
}

fn cmd_toggle(session: &mut Session, reference: &str) -> Result<(), String> {
    let round = session.active_round().ok_or_else(|| idle("toggle a stop"))?;
    let id = resolve_id(
        round
            .customers
            .iter()
            .map(|stop| (stop.customer.id, stop.customer.name.as_str())),
        reference,
        "stop",
    )?;

    let completed = session
        .toggle_complete(id)
        .map_err(|e| format!("failed to toggle stop: {e}"))?
        .ok_or_else(|| format!("no stop with id {id}"))?;

    let Some(stop) = session.active_round().and_then(|r| r.customer(id)) else {
        return Ok(());
    };
    if completed {
        let at = stop
            .last_fix()
            .map(|p| format!(" at {}", format_position(p)))
            .unwrap_or_default();
        println!("✓ {} completed{at}", stop.customer.name);
    } else {
        println!("{} marked incomplete", stop.customer.name);
    }
    Ok(())
}

fn cmd_fix(
    store: Arc<dyn KeyValueStore>,
    config: &Config,
    lat: f64,
    lng: f64,
) -> Result<(), String> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(format!("latitude {lat} is out of range"));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(format!("longitude {lng} is out of range"));
    }

    let (source, feed) = ManualSource::new();
    let mut session = open_session(store, Box::new(source), config)?;
    session
        .start_tracking()
        .map_err(|e| format!("failed to record position: {e}"))?;

    let position = Position::now(lat, lng);
    feed.push(position.clone());
    session
        .pump()
        .map_err(|e| format!("failed to record position: {e}"))?;
    session.stop_tracking();

    let logged = session.active_round().map_or(0, |r| r.route_log.len());
    println!(
        "Position {} recorded ({logged} in route log)",
        format_position(&position)
    );
    Ok(())
}

fn cmd_track(session: &mut Session, samples: Option<usize>) -> Result<(), String> {
    if session.phase() == Phase::Idle {
        return Err(idle("track"));
    }
    session
        .start_tracking()
        .map_err(|e| format!("failed to start tracking: {e}"))?;
    if !session.gps().tracking {
        print_gps_advisory(session.gps());
        return Ok(());
    }

    let applied = session
        .track(samples, |event| match event {
            PositionEvent::Sample(p) => {
                println!("{}  {}", format_timestamp(p.timestamp), format_position(p));
            }
            PositionEvent::Error(e) => eprintln!("{e}"),
        })
        .map_err(|e| format!("failed to record position: {e}"))?;
    session.stop_tracking();

    println!("{applied} positions recorded");
    Ok(())
}

fn cmd_status(session: &Session) {
    let Some(round) = session.active_round() else {
        println!("No round in progress");
        return;
    };

    print_round(round);
    for line in format_gps(session.gps()) {
        println!("{line}");
    }
}

fn cmd_end(session: &mut Session) -> Result<(), String> {
    let round = session
        .end_round()
        .map_err(|e| format!("failed to end round: {e}"))?;

    println!(
        "Round {} ended: {} of {} stops completed",
        short_id(round.id),
        round.completed_customers.len(),
        round.customers.len()
    );
    Ok(())
}

fn print_round(round: &Round) {
    println!(
        "Round {}  started {}  [{}/{} done]",
        short_id(round.id),
        format_timestamp(round.start_time),
        round.completed_count(),
        round.customers.len()
    );
    for stop in &round.customers {
        let mark = if stop.completed { "x" } else { " " };
        println!(
            "  [{mark}] {}  {}, {}",
            short_id(stop.customer.id),
            stop.customer.name,
            stop.customer.address
        );
    }
    println!("Route log: {} positions", round.route_log.len());
}

/// A GPS problem never fails the command; it is reported on stderr.
fn print_gps_advisory(gps: &GpsStatus) {
    if let Some(error) = &gps.last_error {
        eprintln!("GPS unavailable: {error}");
    }
}

fn idle(operation: &'static str) -> String {
    Error::InvalidTransition {
        operation,
        state: Phase::Idle,
    }
    .to_string()
}
