//! Track table: identity-keyed aircraft state with explicit ingest and prune.
//!
//! Pure state machine with a single owner. Messages are applied strictly in
//! the order `ingest` is called; `&mut self` makes every update atomic with
//! respect to readers. See [`crate::shared`] for the concurrent variant.

use std::collections::HashMap;

use tracing::debug;

use crate::config::TableConfig;
use crate::track::Track;
use crate::types::*;

/// What one `ingest` call did, beyond mutating the table.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IngestOutcome {
    /// The message introduced a new identity.
    pub created: bool,
    /// Position resolved by this message, if any.
    pub position: Option<Position>,
}

/// Track multiple aircraft from decoded messages.
#[derive(Debug)]
pub struct TrackTable {
    tracks: HashMap<Icao, Track>,
    timeout: Millis,

    // Counters
    pub total_messages: u64,
    pub position_decodes: u64,
    /// Airborne position messages that did not complete a decode.
    pub positions_unresolved: u64,
}

impl TrackTable {
    pub fn new(config: &TableConfig) -> Self {
        Self::with_timeout(config.timeout_ms)
    }

    pub fn with_timeout(timeout: Millis) -> Self {
        TrackTable {
            tracks: HashMap::new(),
            timeout,
            total_messages: 0,
            position_decodes: 0,
            positions_unresolved: 0,
        }
    }

    pub fn timeout(&self) -> Millis {
        self.timeout
    }

    /// Look up the track for `icao`, creating an empty one if absent.
    pub fn get_or_create(&mut self, icao: Icao) -> &mut Track {
        self.tracks.entry(icao).or_insert_with(|| {
            debug!(%icao, "new track");
            Track::new(icao)
        })
    }

    /// Apply one message received at `now`.
    pub fn ingest(&mut self, msg: &Message, now: Millis) -> IngestOutcome {
        self.total_messages += 1;

        let created = !self.tracks.contains_key(&msg.icao);
        let position = self.get_or_create(msg.icao).apply(msg, now);
        match position {
            Some(_) => self.position_decodes += 1,
            None if msg.kind() == MessageKind::AirbornePosition => self.positions_unresolved += 1,
            None => {}
        }

        IngestOutcome { created, position }
    }

    /// Remove every track not seen for longer than the timeout.
    ///
    /// Returns the evicted identities.
    pub fn prune(&mut self, now: Millis) -> Vec<Icao> {
        let timeout = self.timeout;
        let stale: Vec<Icao> = self
            .tracks
            .iter()
            .filter(|(_, track)| track.is_stale(now, timeout))
            .map(|(icao, _)| *icao)
            .collect();
        for icao in &stale {
            self.tracks.remove(icao);
        }
        if !stale.is_empty() {
            debug!(evicted = stale.len(), remaining = self.tracks.len(), "pruned tracks");
        }
        stale
    }

    /// Drop every track and zero the counters. The timeout is kept.
    pub fn clear(&mut self) {
        debug!(dropped = self.tracks.len(), "cleared track table");
        self.tracks.clear();
        self.total_messages = 0;
        self.position_decodes = 0;
        self.positions_unresolved = 0;
    }

    pub fn get(&self, icao: &Icao) -> Option<&Track> {
        self.tracks.get(icao)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Owned copy of every track, most recently seen first.
    pub fn snapshot(&self) -> Vec<Track> {
        let mut tracks: Vec<Track> = self.tracks.values().cloned().collect();
        sort_by_recency(&mut tracks);
        tracks
    }
}

/// Most recently seen first; ties broken by address for a stable order.
pub(crate) fn sort_by_recency(tracks: &mut [Track]) {
    tracks.sort_by(|a, b| b.last_seen.cmp(&a.last_seen).then(a.icao.cmp(&b.icao)));
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_TIMEOUT_MS;
    use crate::cpr::encode_airborne;

    const SCENARIO: Icao = Icao::new(0xABCDEF);

    fn make_table() -> TrackTable {
        TrackTable::new(&TableConfig::default())
    }

    fn altitude(icao: Icao, altitude: i32) -> Message {
        Message {
            icao,
            df: 0,
            altitude,
            ..Default::default()
        }
    }

    fn position(icao: Icao, raw_lat: u32, raw_lon: u32, parity: CprParity) -> Message {
        Message {
            icao,
            df: 17,
            type_code: Some(11),
            altitude: 38000,
            raw_latitude: raw_lat,
            raw_longitude: raw_lon,
            parity,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_timeout() {
        assert_eq!(make_table().timeout(), DEFAULT_TIMEOUT_MS);
        assert_eq!(DEFAULT_TIMEOUT_MS, 30_000);
    }

    #[test]
    fn test_ingest_creates_track() {
        let mut table = make_table();
        let outcome = table.ingest(&altitude(SCENARIO, 1200), 1_000);
        assert!(outcome.created);
        assert!(outcome.position.is_none());

        let track = table.get(&SCENARIO).unwrap();
        assert_eq!(track.icao, SCENARIO);
        assert_eq!(track.message_count, 1);
        assert_eq!(track.last_seen, 1_000);
        assert_eq!(track.altitude, 1200);
    }

    #[test]
    fn test_second_message_not_created() {
        let mut table = make_table();
        table.ingest(&altitude(SCENARIO, 1200), 1_000);
        let outcome = table.ingest(&altitude(SCENARIO, 1300), 2_000);
        assert!(!outcome.created);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&SCENARIO).unwrap().altitude_trend, 100);
    }

    #[test]
    fn test_get_or_create_centralized() {
        let mut table = make_table();
        let track = table.get_or_create(SCENARIO);
        assert_eq!(track.message_count, 0);
        track.altitude = 500;
        assert_eq!(table.get_or_create(SCENARIO).altitude, 500);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_unhandled_message_only_bookkeeping() {
        let mut table = make_table();
        let msg = Message {
            icao: SCENARIO,
            df: 17,
            type_code: Some(31),
            altitude: 9999,
            ..Default::default()
        };
        table.ingest(&msg, 42);
        let track = table.get(&SCENARIO).unwrap();
        assert_eq!(track.message_count, 1);
        assert_eq!(track.last_seen, 42);
        assert_eq!(track.altitude, 0);
    }

    #[test]
    fn test_multiple_aircraft() {
        let mut table = make_table();
        table.ingest(&altitude(Icao::new(0x4840D6), 100), 1);
        table.ingest(&altitude(Icao::new(0x406B90), 200), 2);
        assert_eq!(table.len(), 2);
        assert_eq!(table.total_messages, 2);
    }

    #[test]
    fn test_scenario_even_then_odd() {
        let mut table = make_table();
        let first = table.ingest(&position(SCENARIO, 74158, 50194, CprParity::Even), 1_000);
        assert!(first.position.is_none());

        let second = table.ingest(&position(SCENARIO, 74158, 50087, CprParity::Odd), 3_000);
        let pos = second.position.expect("pair within window resolves");
        assert!((pos.lat - -2.649474).abs() < 1e-4, "got {}", pos.lat);
        assert!((pos.lon - 2.371863).abs() < 1e-4, "got {}", pos.lon);

        let track = table.get(&SCENARIO).unwrap();
        assert_eq!(track.position, Some(pos));
        assert_eq!(track.history.len(), 1);
        assert_eq!(track.history[0], (pos.lon, pos.lat));
        assert_eq!(table.position_decodes, 1);
    }

    #[test]
    fn test_time_gate() {
        let mut table = make_table();
        table.ingest(&position(SCENARIO, 93000, 51372, CprParity::Even), 0);
        let late = table.ingest(&position(SCENARIO, 74158, 50194, CprParity::Odd), 10_001);
        assert!(late.position.is_none());

        let other = Icao::new(0x123456);
        table.ingest(&position(other, 93000, 51372, CprParity::Even), 0);
        let timely = table.ingest(&position(other, 74158, 50194, CprParity::Odd), 9_999);
        assert!(timely.position.is_some());
    }

    #[test]
    fn test_unresolved_counter() {
        let mut table = make_table();

        // Lone even frame, then an odd frame too late to pair with it
        table.ingest(&position(SCENARIO, 93000, 51372, CprParity::Even), 0);
        table.ingest(&position(SCENARIO, 74158, 50194, CprParity::Odd), 10_001);
        assert_eq!(table.positions_unresolved, 2);

        // Frames either side of the NL 36/37 boundary disagree on zones
        let other = Icao::new(0x123456);
        let (e_lat, e_lon) = encode_airborne(51.8914, 0.5, CprParity::Even);
        let (o_lat, o_lon) = encode_airborne(51.8954, 0.5, CprParity::Odd);
        table.ingest(&position(other, e_lat, e_lon, CprParity::Even), 20_000);
        let outcome = table.ingest(&position(other, o_lat, o_lon, CprParity::Odd), 21_000);
        assert!(outcome.position.is_none());
        assert_eq!(table.positions_unresolved, 4);

        // Other kinds never count
        table.ingest(&altitude(other, 100), 22_000);
        assert_eq!(table.positions_unresolved, 4);
        assert_eq!(table.position_decodes, 0);
        assert_eq!(table.total_messages, 5);
    }

    #[test]
    fn test_clear() {
        let mut table = TrackTable::with_timeout(5_000);
        table.ingest(&position(SCENARIO, 74158, 50194, CprParity::Even), 1_000);
        table.ingest(&position(SCENARIO, 74158, 50087, CprParity::Odd), 3_000);
        assert_eq!(table.position_decodes, 1);

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.total_messages, 0);
        assert_eq!(table.position_decodes, 0);
        assert_eq!(table.positions_unresolved, 0);
        assert_eq!(table.timeout(), 5_000);

        assert!(table.ingest(&altitude(SCENARIO, 100), 4_000).created);
    }

    #[test]
    fn test_prune_boundary() {
        let mut table = make_table();
        let t0 = 5_000;
        table.ingest(&altitude(SCENARIO, 100), t0);

        assert!(table.prune(t0 + DEFAULT_TIMEOUT_MS - 1).is_empty());
        assert!(table.get(&SCENARIO).is_some());

        assert!(table.prune(t0 + DEFAULT_TIMEOUT_MS).is_empty());
        assert!(table.get(&SCENARIO).is_some());

        assert_eq!(table.prune(t0 + DEFAULT_TIMEOUT_MS + 1), vec![SCENARIO]);
        assert!(table.get(&SCENARIO).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_prune_keeps_fresh_tracks() {
        let mut table = TrackTable::with_timeout(1_000);
        table.ingest(&altitude(Icao::new(1), 100), 0);
        table.ingest(&altitude(Icao::new(2), 100), 1_500);
        let evicted = table.prune(2_000);
        assert_eq!(evicted, vec![Icao::new(1)]);
        assert!(table.get(&Icao::new(2)).is_some());
    }

    #[test]
    fn test_snapshot_sorted_and_detached() {
        let mut table = make_table();
        table.ingest(&altitude(Icao::new(1), 100), 10);
        table.ingest(&altitude(Icao::new(2), 200), 20);
        let snapshot = table.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].icao, Icao::new(2));
        assert_eq!(snapshot[1].icao, Icao::new(1));

        table.ingest(&altitude(Icao::new(1), 500), 30);
        assert_eq!(snapshot[1].altitude, 100);
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut table = make_table();
        table.ingest(&altitude(SCENARIO, 100), 10);
        let json = serde_json::to_string(&table.snapshot()).unwrap();
        assert!(json.contains("\"icao\":\"ABCDEF\""));
    }
}
