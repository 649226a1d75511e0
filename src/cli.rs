//! CLI interface for Plow.
//!
//! Each subcommand is non-interactive: it loads the stored state, performs
//! one intent, prints the result, and exits. State is saved as it changes,
//! so a round survives between invocations.
//!
//! Customers and stops are referenced by full UUID or unambiguous prefix.

mod customer;
mod format;
mod round;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use plow::position::{NmeaSource, PositionSource, UnsupportedSource};
use plow::session::Session;
use plow::storage::{KeyValueStore, SqliteStore};

use crate::config::Config;

use customer::CustomerCommand;
use format::{format_position, format_timestamp, short_id};
use round::RoundCommand;

/// Plow: track field-service rounds.
#[derive(Debug, Parser)]
#[command(name = "plow", version, after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// Directory holding the database (default: ~/.plow).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log state transitions to stderr.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Command,
}

const WORKFLOW_HELP: &str = r#"Workflow: one round
  1. plow customer add "Alice" "1 Elm Street"
  2. plow round start
  3. plow round track --device /dev/ttyACM0 --samples 1
     (or: plow round fix --lat 59.3293 --lng 18.0686)
  4. plow round toggle a3b
  5. plow round end
  6. plow history"#;

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage the customer registry.
    Customer {
        #[command(subcommand)]
        command: CustomerCommand,
    },

    /// Start, work, and end a round.
    Round {
        #[command(subcommand)]
        command: RoundCommand,
    },

    /// Show ended rounds, most recent first.
    History,
}

/// Run the CLI, returning an error message on failure.
pub fn run(cli: Cli, config: &Config) -> Result<(), String> {
    let data_dir = config.data_dir(cli.data_dir.as_deref())?;
    let store = open_store(&data_dir)?;

    match cli.command {
        Command::Customer { command } => {
            let mut session = open_session(store, Box::new(UnsupportedSource), config)?;
            customer::run(&command, &mut session)
        }
        Command::Round { command } => round::run(&command, store, config),
        Command::History => {
            let session = open_session(store, Box::new(UnsupportedSource), config)?;
            cmd_history(&session);
            Ok(())
        }
    }
}

fn open_store(data_dir: &Path) -> Result<Arc<dyn KeyValueStore>, String> {
    let path = data_dir.join("plow.sqlite");
    let store = SqliteStore::open(&path)
        .map_err(|e| format!("failed to open {}: {e}", path.display()))?;
    Ok(Arc::new(store))
}

fn open_session(
    store: Arc<dyn KeyValueStore>,
    source: Box<dyn PositionSource>,
    config: &Config,
) -> Result<Session, String> {
    Session::open(store, source, config.gps.policy())
        .map_err(|e| format!("failed to load state: {e}"))
}

/// The configured GPS device as a position source.
fn device_source(config: &Config, explicit: Option<&Path>) -> Box<dyn PositionSource> {
    match config.gps_device(explicit) {
        Some(path) => Box::new(NmeaSource::new(path)),
        None => Box::new(UnsupportedSource),
    }
}

fn cmd_history(session: &Session) {
    let rounds = session.history();
    if rounds.is_empty() {
        println!("No rounds");
        return;
    }

    for round in rounds {
        let ended = round
            .end_time
            .map_or_else(|| "-".to_string(), format_timestamp);
        println!(
            "{}  {} → {}  [{} customers]",
            short_id(round.id),
            format_timestamp(round.start_time),
            ended,
            round.completed_customers.len()
        );
        for stop in &round.completed_customers {
            let fix = stop
                .gps_log
                .first()
                .map(|p| format!("  @ {}", format_position(p)))
                .unwrap_or_default();
            println!(
                "    {}, {}{fix}",
                stop.customer.name, stop.customer.address
            );
        }
    }
}

/// Resolve an id reference (full UUID or unambiguous prefix) among `candidates`.
fn resolve_id<'a>(
    candidates: impl IntoIterator<Item = (Uuid, &'a str)>,
    reference: &str,
    noun: &str,
) -> Result<Uuid, String> {
    let candidates: Vec<(Uuid, &str)> = candidates.into_iter().collect();

    // Try full UUID first.
    if let Ok(id) = reference.parse::<Uuid>() {
        return candidates
            .iter()
            .find(|(candidate, _)| *candidate == id)
            .map(|(candidate, _)| *candidate)
            .ok_or_else(|| format!("no {noun} with id {id}"));
    }

    // Try as a prefix match.
    let reference = reference.to_ascii_lowercase();
    let matches: Vec<&(Uuid, &str)> = candidates
        .iter()
        .filter(|(id, _)| id.to_string().starts_with(&reference))
        .collect();

    match matches.as_slice() {
        [] => Err(format!("no {noun} matching '{reference}'")),
        [(id, _)] => Ok(*id),
        many => {
            let ids: Vec<String> = many
                .iter()
                .map(|(id, label)| format!("{} ({label})", short_id(*id)))
                .collect();
            Err(format!(
                "'{reference}' is ambiguous, matches {} {noun}s: {}",
                many.len(),
                ids.join(", ")
            ))
        }
    }
}
