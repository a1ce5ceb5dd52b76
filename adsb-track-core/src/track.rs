//! Per-aircraft state and the update rules for each message kind.
//!
//! Each message mutates only the fields its kind carries. Airborne position
//! messages buffer their CPR frame by parity and attempt a global decode
//! once both slots hold frames received within the pair window.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::trace;

use crate::cpr::{self, CprFrame};
use crate::types::*;

/// Maximum position history entries per aircraft.
pub const MAX_HISTORY: usize = 100;

/// Mutable state for a single tracked aircraft.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    pub icao: Icao,
    pub message_count: u64,
    pub last_seen: Millis,

    pub altitude: i32,
    pub altitude_trend: i32,
    pub altitude_unit: AltitudeUnit,

    pub speed: f64,
    pub speed_trend: f64,
    pub heading: f64,

    pub callsign: Option<String>,
    pub aircraft_type: Option<u8>,

    /// Last resolved position; kept when a later pair fails to resolve.
    pub position: Option<Position>,

    // CPR buffer for global decode
    pub even_frame: Option<CprFrame>,
    pub odd_frame: Option<CprFrame>,

    /// Trail of `(lon, lat)` fixes, oldest first.
    pub history: VecDeque<(f64, f64)>,
}

impl Track {
    pub fn new(icao: Icao) -> Self {
        Track {
            icao,
            message_count: 0,
            last_seen: 0,
            altitude: 0,
            altitude_trend: 0,
            altitude_unit: AltitudeUnit::default(),
            speed: 0.0,
            speed_trend: 0.0,
            heading: 0.0,
            callsign: None,
            aircraft_type: None,
            position: None,
            even_frame: None,
            odd_frame: None,
            history: VecDeque::with_capacity(MAX_HISTORY),
        }
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    pub fn age(&self, now: Millis) -> Millis {
        now.saturating_sub(self.last_seen)
    }

    pub fn is_stale(&self, now: Millis, timeout: Millis) -> bool {
        self.age(now) > timeout
    }

    /// Apply one message received at `now`.
    ///
    /// Returns the position if this message completed a successful CPR
    /// decode.
    pub fn apply(&mut self, msg: &Message, now: Millis) -> Option<Position> {
        self.message_count += 1;
        self.last_seen = now;

        if let Some(ty) = msg.aircraft_type {
            self.aircraft_type = Some(ty);
        }

        match msg.kind() {
            MessageKind::Altitude => {
                self.update_altitude(msg);
                None
            }
            MessageKind::Identification => {
                if let Some(cs) = msg.callsign().value() {
                    self.callsign = Some(cs.to_string());
                }
                None
            }
            MessageKind::AirbornePosition => {
                self.update_altitude(msg);
                self.store_frame(msg, now);
                self.try_resolve()
            }
            MessageKind::Velocity => {
                self.speed_trend = msg.ground_speed - self.speed;
                self.speed = msg.ground_speed;
                self.heading = msg.heading;
                None
            }
            MessageKind::Other => None,
        }
    }

    fn update_altitude(&mut self, msg: &Message) {
        self.altitude_trend = msg.altitude.saturating_sub(self.altitude);
        self.altitude = msg.altitude;
        self.altitude_unit = msg.altitude_unit;
    }

    fn store_frame(&mut self, msg: &Message, now: Millis) {
        let frame = CprFrame::new(msg.raw_latitude, msg.raw_longitude, now);
        match msg.parity {
            CprParity::Odd => self.odd_frame = Some(frame),
            CprParity::Even => self.even_frame = Some(frame),
        }
    }

    fn try_resolve(&mut self) -> Option<Position> {
        let (even, odd) = (self.even_frame?, self.odd_frame?);

        if !cpr::within_pair_window(&even, &odd) {
            trace!(
                icao = %self.icao,
                gap_ms = even.received_at.abs_diff(odd.received_at),
                "CPR pair outside window"
            );
            return None;
        }

        match cpr::resolve_global_position(&even, &odd) {
            Ok(pos) => {
                self.position = Some(pos);
                if pos.is_plottable() {
                    self.push_history(pos);
                }
                Some(pos)
            }
            Err(reason) => {
                trace!(icao = %self.icao, %reason, "CPR pair unresolvable");
                None
            }
        }
    }

    fn push_history(&mut self, pos: Position) {
        if self.history.len() == MAX_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back((pos.lon, pos.lat));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
