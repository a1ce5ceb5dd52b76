//! adsb-track: replay decoded ADS-B messages and print the live track table.

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{Cell, Table};
use tracing::info;
use tracing_subscriber::EnvFilter;

use adsb_track_core::config::{self, Config};
use adsb_track_core::{Notifier, Track, TrackEvent, TrackTable};

mod replay;

const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Parser)]
#[command(name = "adsb-track", version, about = "ADS-B track table replay")]
struct Cli {
    /// Config file (default: ~/.adsb-track/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON-lines file of decoded messages ("-" for stdin)
    Replay {
        /// Path to file containing one record per line
        file: PathBuf,

        /// Evict tracks silent for longer than this many milliseconds
        #[arg(long, env = "ADSB_TRACK_TIMEOUT")]
        timeout: Option<u64>,

        /// Print the final snapshot as JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Log track events as they happen
        #[arg(long)]
        events: bool,
    },

    /// Write a default config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            file,
            timeout,
            json,
            events,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(ms) = timeout {
                config.tracking.timeout_ms = ms;
            }
            cmd_replay(&file, &config, json, events)
        }
        Commands::InitConfig { force } => cmd_init_config(cli.config, force),
    }
}

/// `RUST_LOG` when set, otherwise `info`.
fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => config::load_config_from(p)
            .with_context(|| format!("loading config {}", p.display())),
        None => Ok(config::load_config()),
    }
}

fn cmd_replay(file: &Path, config: &Config, json: bool, events: bool) -> Result<()> {
    let reader: Box<dyn BufRead> = if file.to_str() == Some("-") {
        Box::new(io::stdin().lock())
    } else {
        let f = std::fs::File::open(file)
            .with_context(|| format!("opening {}", file.display()))?;
        Box::new(io::BufReader::new(f))
    };

    let mut notifier = Notifier::new(TrackTable::new(&config.tracking));
    if events {
        notifier.subscribe(log_event);
    }

    let stats = replay::replay(reader, &mut notifier)?;
    let table = notifier.into_table();

    info!(
        records = stats.records,
        malformed = stats.malformed,
        evicted = stats.evicted,
        positions = table.position_decodes,
        unresolved = table.positions_unresolved,
        "replay complete"
    );

    let snapshot = table.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        println!();
        println!("Replay complete: {}", file.display());
        println!(
            "  Records: {} ingested, {} malformed",
            stats.records, stats.malformed
        );
        println!(
            "  Tracks: {} live, {} evicted (timeout {} ms)",
            snapshot.len(),
            stats.evicted,
            table.timeout()
        );
        println!(
            "  Positions: {} resolved, {} unresolved",
            table.position_decodes, table.positions_unresolved
        );
        println!();
        print_tracks(&snapshot, stats.last_at);
    }

    Ok(())
}

fn log_event(event: &TrackEvent) {
    match event {
        TrackEvent::NewAircraft { icao, timestamp } => {
            info!(%icao, at = timestamp, "new aircraft");
        }
        TrackEvent::PositionUpdate {
            icao,
            lat,
            lon,
            altitude,
            timestamp,
        } => {
            info!(%icao, lat, lon, altitude, at = timestamp, "position");
        }
        TrackEvent::Evicted { icao, timestamp } => {
            info!(%icao, at = timestamp, "evicted");
        }
    }
}

fn print_tracks(tracks: &[Track], now: u64) {
    if tracks.is_empty() {
        return;
    }

    let mut table = Table::new();
    table.set_header(vec![
        "ICAO", "Callsign", "Type", "Alt", "Alt Δ", "Speed", "Speed Δ", "Hdg", "Lat", "Lon",
        "Trail", "Msgs", "Age (s)",
    ]);

    for t in tracks {
        table.add_row(vec![
            Cell::new(t.icao),
            Cell::new(t.callsign.as_deref().unwrap_or("-")),
            Cell::new(
                t.aircraft_type
                    .map(|c| c.to_string())
                    .unwrap_or("-".into()),
            ),
            Cell::new(format!("{} {}", t.altitude, t.altitude_unit)),
            Cell::new(format!("{:+}", t.altitude_trend)),
            Cell::new(format!("{:.0}", t.speed)),
            Cell::new(format!("{:+.0}", t.speed_trend)),
            Cell::new(format!("{:.1}", t.heading)),
            Cell::new(
                t.position
                    .map(|p| format!("{:.4}", p.lat))
                    .unwrap_or("-".into()),
            ),
            Cell::new(
                t.position
                    .map(|p| format!("{:.4}", p.lon))
                    .unwrap_or("-".into()),
            ),
            Cell::new(t.history.len()),
            Cell::new(t.message_count),
            Cell::new(format!("{:.1}", t.age(now) as f64 / 1000.0)),
        ]);
    }

    println!("{table}");
}

fn cmd_init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = path.unwrap_or_else(config::config_file);
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    config::save_config_to(&Config::default(), &path)
        .with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // Only test in this crate touching RUST_LOG
    #[test]
    fn test_log_filter_defaults_to_info() {
        std::env::remove_var("RUST_LOG");
        assert_eq!(log_filter().to_string(), DEFAULT_LOG_FILTER);

        std::env::set_var("RUST_LOG", "debug");
        assert_eq!(log_filter().to_string(), "debug");
        std::env::remove_var("RUST_LOG");
    }
}
