//! Concurrent track table for feeds ingested from several threads.
//!
//! Tracks live in a sharded `DashMap`. An ingest holds the entry lock for its
//! identity for the whole update, so updates to one aircraft are serialized
//! and readers never see a half-applied message. Updates to different
//! aircraft only contend when they hash to the same shard.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::config::TableConfig;
use crate::table::{sort_by_recency, IngestOutcome};
use crate::track::Track;
use crate::types::*;

/// Cloneable handle to a track table shared between threads.
#[derive(Debug, Clone)]
pub struct SharedTrackTable {
    tracks: Arc<DashMap<Icao, Track>>,
    timeout: Millis,
}

impl SharedTrackTable {
    pub fn new(config: &TableConfig) -> Self {
        Self::with_timeout(config.timeout_ms)
    }

    pub fn with_timeout(timeout: Millis) -> Self {
        SharedTrackTable {
            tracks: Arc::new(DashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Millis {
        self.timeout
    }

    pub fn ingest(&self, msg: &Message, now: Millis) -> IngestOutcome {
        let mut created = false;
        let mut track = self.tracks.entry(msg.icao).or_insert_with(|| {
            created = true;
            debug!(icao = %msg.icao, "new track");
            Track::new(msg.icao)
        });
        let position = track.apply(msg, now);
        IngestOutcome { created, position }
    }

    /// Remove every track not seen for longer than the timeout.
    ///
    /// Each shard is write-locked while it is swept, so an in-flight ingest
    /// on the same identity either completes first or runs after eviction.
    pub fn prune(&self, now: Millis) -> Vec<Icao> {
        let timeout = self.timeout;
        let mut evicted = Vec::new();
        self.tracks.retain(|icao, track| {
            let keep = !track.is_stale(now, timeout);
            if !keep {
                evicted.push(*icao);
            }
            keep
        });
        if !evicted.is_empty() {
            debug!(evicted = evicted.len(), remaining = self.tracks.len(), "pruned tracks");
        }
        evicted
    }

    /// Copy of one track, taken under its shard lock.
    pub fn get(&self, icao: &Icao) -> Option<Track> {
        self.tracks.get(icao).map(|track| track.value().clone())
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Owned copy of every track, most recently seen first.
    ///
    /// Each track is cloned whole under its shard read lock. Tracks in
    /// different shards may be copied at slightly different moments.
    pub fn snapshot(&self) -> Vec<Track> {
        let mut tracks: Vec<Track> = self.tracks.iter().map(|e| e.value().clone()).collect();
        sort_by_recency(&mut tracks);
        tracks
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn altitude(icao: Icao, altitude: i32) -> Message {
        Message {
            icao,
            df: 4,
            altitude,
            ..Default::default()
        }
    }

    #[test]
    fn test_ingest_and_get() {
        let table = SharedTrackTable::new(&TableConfig::default());
        let icao = Icao::new(0xABCDEF);
        assert!(table.ingest(&altitude(icao, 1000), 1).created);
        assert!(!table.ingest(&altitude(icao, 1500), 2).created);

        let track = table.get(&icao).unwrap();
        assert_eq!(track.message_count, 2);
        assert_eq!(track.altitude_trend, 500);
    }

    #[test]
    fn test_concurrent_same_identity_serialized() {
        let table = SharedTrackTable::with_timeout(60_000);
        let icao = Icao::new(0x4840D6);
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let table = table.clone();
                thread::spawn(move || {
                    for i in 0..500 {
                        table.ingest(&altitude(icao, worker * 1000 + i), i as Millis);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let track = table.get(&icao).unwrap();
        assert_eq!(track.message_count, 8 * 500);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_concurrent_distinct_identities() {
        let table = SharedTrackTable::with_timeout(60_000);
        let handles: Vec<_> = (0..4u32)
            .map(|worker| {
                let table = table.clone();
                thread::spawn(move || {
                    for i in 0..100u32 {
                        let icao = Icao::new(worker << 16 | i);
                        table.ingest(&altitude(icao, 100), 0);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(table.len(), 400);
        assert!(table.snapshot().iter().all(|t| t.message_count == 1));
    }

    #[test]
    fn test_snapshot_never_torn() {
        let table = SharedTrackTable::with_timeout(60_000);
        let icao = Icao::new(0x000001);
        table.ingest(&altitude(icao, 0), 0);

        let writer = {
            let table = table.clone();
            thread::spawn(move || {
                for i in 1..=2_000 {
                    table.ingest(&altitude(icao, i * 10), i as Millis);
                }
            })
        };
        // Each step climbs 10 ft, so a whole update always shows a trend of 10
        for _ in 0..200 {
            for track in table.snapshot() {
                if track.altitude != 0 {
                    assert_eq!(track.altitude_trend, 10);
                    assert_eq!(track.last_seen as i32 * 10, track.altitude);
                }
            }
        }
        writer.join().unwrap();
    }

    #[test]
    fn test_prune_boundary() {
        let table = SharedTrackTable::with_timeout(30_000);
        let icao = Icao::new(0xABCDEF);
        table.ingest(&altitude(icao, 100), 1_000);
        assert!(table.prune(31_000).is_empty());
        assert_eq!(table.prune(31_001), vec![icao]);
        assert!(table.is_empty());
    }
}
