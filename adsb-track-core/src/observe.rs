//! Optional change notification layered over a [`TrackTable`].
//!
//! The table itself knows nothing about observers. A `Notifier` owns one,
//! forwards `ingest`/`prune`, and turns their outcomes into `TrackEvent`s
//! delivered synchronously to every subscriber in subscription order.

use serde::Serialize;

use crate::table::TrackTable;
use crate::types::*;

/// Events emitted for subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrackEvent {
    /// First time seeing this ICAO address.
    NewAircraft { icao: Icao, timestamp: Millis },
    /// A CPR pair resolved to a new position.
    PositionUpdate {
        icao: Icao,
        lat: f64,
        lon: f64,
        altitude: i32,
        timestamp: Millis,
    },
    /// Track dropped by `prune`.
    Evicted { icao: Icao, timestamp: Millis },
}

type Subscriber = Box<dyn FnMut(&TrackEvent) + Send>;

/// A `TrackTable` with subscribers.
pub struct Notifier {
    table: TrackTable,
    subscribers: Vec<Subscriber>,
}

impl Notifier {
    pub fn new(table: TrackTable) -> Self {
        Notifier {
            table,
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe<F>(&mut self, f: F)
    where
        F: FnMut(&TrackEvent) + Send + 'static,
    {
        self.subscribers.push(Box::new(f));
    }

    pub fn table(&self) -> &TrackTable {
        &self.table
    }

    pub fn into_table(self) -> TrackTable {
        self.table
    }

    pub fn ingest(&mut self, msg: &Message, now: Millis) {
        let outcome = self.table.ingest(msg, now);

        if outcome.created {
            self.publish(&TrackEvent::NewAircraft {
                icao: msg.icao,
                timestamp: now,
            });
        }
        if let Some(pos) = outcome.position {
            let altitude = self.table.get(&msg.icao).map_or(0, |t| t.altitude);
            self.publish(&TrackEvent::PositionUpdate {
                icao: msg.icao,
                lat: pos.lat,
                lon: pos.lon,
                altitude,
                timestamp: now,
            });
        }
    }

    pub fn prune(&mut self, now: Millis) -> usize {
        let evicted = self.table.prune(now);
        for icao in &evicted {
            self.publish(&TrackEvent::Evicted {
                icao: *icao,
                timestamp: now,
            });
        }
        evicted.len()
    }

    fn publish(&mut self, event: &TrackEvent) {
        for subscriber in &mut self.subscribers {
            subscriber(event);
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("table", &self.table)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
