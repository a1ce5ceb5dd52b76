//! Replay of JSON-lines message records through a track table.
//!
//! One record per line: a decoded `Message` plus its receive time `at` in
//! milliseconds. Blank lines and `#` comments are skipped.

use std::io::BufRead;

use adsb_track_core::{Message, Millis, Notifier};
use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct Record {
    pub at: Millis,
    #[serde(flatten)]
    pub message: Message,
}

#[derive(Debug, Default, PartialEq)]
pub struct ReplayStats {
    pub records: u64,
    pub malformed: u64,
    pub evicted: u64,
    pub last_at: Millis,
}

/// Parse one input line. `None` for lines that carry no record.
pub fn parse_record(line: &str) -> Option<serde_json::Result<Record>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(serde_json::from_str(line))
}

/// Feed every record to the notifier in file order, pruning at each
/// record's timestamp.
pub fn replay<R: BufRead>(reader: R, notifier: &mut Notifier) -> Result<ReplayStats> {
    let mut stats = ReplayStats::default();

    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading line {}", idx + 1))?;
        let record = match parse_record(&line) {
            None => continue,
            Some(Ok(r)) => r,
            Some(Err(e)) => {
                warn!(line = idx + 1, error = %e, "skipping malformed record");
                stats.malformed += 1;
                continue;
            }
        };

        notifier.ingest(&record.message, record.at);
        stats.evicted += notifier.prune(record.at) as u64;
        stats.records += 1;
        stats.last_at = record.at;
    }

    Ok(stats)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
