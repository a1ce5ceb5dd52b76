//! Compact Position Reporting: global CPR decode for airborne positions.
//!
//! A global decode needs one even and one odd frame received within
//! [`MAX_PAIR_AGE_MS`] of each other. No reference position is needed, and
//! none is ever available to the track table, so local decode is not offered.
//!
//! Key constants:
//! - NZ = 15 (latitude zones per hemisphere for even frames)
//! - Nb = 17 (bits per coordinate)
//! - Dlat_even = 360 / (4 * NZ) = 6.0 degrees
//! - Dlat_odd = 360 / (4 * NZ - 1) ≈ 6.1017 degrees

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CprParity, Millis, Position};

/// Number of latitude zones per hemisphere.
const NZ: f64 = 15.0;

/// Bits per CPR coordinate.
const NB: u32 = 17;

/// Maximum CPR value (2^17 = 131072).
const CPR_MAX: f64 = (1u32 << NB) as f64;

/// Maximum time between even/odd frames for global decode.
pub const MAX_PAIR_AGE_MS: Millis = 10_000;

const DLAT_EVEN: f64 = 360.0 / (4.0 * NZ);
const DLAT_ODD: f64 = 360.0 / (4.0 * NZ - 1.0);

/// One buffered CPR sample: raw 17-bit coordinates and when it arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CprFrame {
    pub lat: u32,
    pub lon: u32,
    pub received_at: Millis,
}

impl CprFrame {
    pub fn new(lat: u32, lon: u32, received_at: Millis) -> Self {
        CprFrame {
            lat,
            lon,
            received_at,
        }
    }

    fn in_range(&self) -> bool {
        self.lat < (1 << NB) && self.lon < (1 << NB)
    }
}

/// Why a frame pair did not produce a position. Expected and frequent.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum Unresolvable {
    #[error("even/odd latitudes fall in different NL zones ({even} vs {odd})")]
    ZoneMismatch { even: i32, odd: i32 },
    #[error("decoded latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("raw CPR coordinate exceeds 17 bits")]
    RawOutOfRange,
}

/// Number of longitude zones at a given latitude (NL function).
///
/// Ranges from 1 near poles to 59 at equator.
pub fn nl(lat: f64) -> i32 {
    if lat.abs() >= 87.0 {
        return 1;
    }

    let a = 1.0 - (std::f64::consts::PI / (2.0 * NZ)).cos();
    let b = (std::f64::consts::PI / 180.0 * lat.abs()).cos().powi(2);
    let nl_val = (2.0 * std::f64::consts::PI / (1.0 - a / b).acos()).floor() as i32;
    nl_val.max(1)
}

/// Modulo that always returns a non-negative result.
fn modulo(x: f64, y: f64) -> f64 {
    x - y * (x / y).floor()
}

/// Whether two frames are close enough in time to be decoded as a pair.
pub fn within_pair_window(a: &CprFrame, b: &CprFrame) -> bool {
    a.received_at.abs_diff(b.received_at) <= MAX_PAIR_AGE_MS
}

/// Global CPR decode from an even/odd frame pair.
///
/// The more recently received frame determines the reported position; ties
/// go to the even frame. The caller is responsible for the pair window.
pub fn resolve_global_position(
    even: &CprFrame,
    odd: &CprFrame,
) -> Result<Position, Unresolvable> {
    if !even.in_range() || !odd.in_range() {
        return Err(Unresolvable::RawOutOfRange);
    }

    let lat_even_cpr = even.lat as f64 / CPR_MAX;
    let lon_even_cpr = even.lon as f64 / CPR_MAX;
    let lat_odd_cpr = odd.lat as f64 / CPR_MAX;
    let lon_odd_cpr = odd.lon as f64 / CPR_MAX;

    // Latitude zone index
    let j = (59.0 * lat_even_cpr - 60.0 * lat_odd_cpr + 0.5).floor();

    let mut lat_e = DLAT_EVEN * (modulo(j, 60.0) + lat_even_cpr);
    let mut lat_o = DLAT_ODD * (modulo(j, 59.0) + lat_odd_cpr);

    // Southern hemisphere
    if lat_e >= 270.0 {
        lat_e -= 360.0;
    }
    if lat_o >= 270.0 {
        lat_o -= 360.0;
    }

    for lat in [lat_e, lat_o] {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(Unresolvable::LatitudeOutOfRange(lat));
        }
    }

    let (nl_even, nl_odd) = (nl(lat_e), nl(lat_o));
    if nl_even != nl_odd {
        return Err(Unresolvable::ZoneMismatch {
            even: nl_even,
            odd: nl_odd,
        });
    }
    let nl_val = nl_even;

    // Longitude zone index, shared by both branches
    let m = (lon_even_cpr * (nl_val - 1) as f64 - lon_odd_cpr * nl_val as f64 + 0.5).floor();

    let (lat, lon) = if even.received_at >= odd.received_at {
        let n_lon = nl_val.max(1) as f64;
        (lat_e, 360.0 / n_lon * (modulo(m, n_lon) + lon_even_cpr))
    } else {
        let n_lon = (nl_val - 1).max(1) as f64;
        (lat_o, 360.0 / n_lon * (modulo(m, n_lon) + lon_odd_cpr))
    };

    // Normalize longitude to [-180, 180)
    let lon = if lon >= 180.0 { lon - 360.0 } else { lon };

    Ok(Position::new(round6(lat), round6(lon)))
}

/// Encode an airborne position into raw CPR coordinates for one parity.
///
/// Inverse of the global decode, used to synthesize frame pairs.
pub fn encode_airborne(lat: f64, lon: f64, parity: CprParity) -> (u32, u32) {
    let i = match parity {
        CprParity::Even => 0.0,
        CprParity::Odd => 1.0,
    };
    let dlat = 360.0 / (4.0 * NZ - i);

    let yz = (CPR_MAX * modulo(lat, dlat) / dlat + 0.5).floor();
    let rlat = dlat * (yz / CPR_MAX + (lat / dlat).floor());

    let n_lon = nl(rlat) - i as i32;
    let dlon = if n_lon > 0 { 360.0 / n_lon as f64 } else { 360.0 };
    let xz = (CPR_MAX * modulo(lon, dlon) / dlon + 0.5).floor();

    let mask = (1u32 << NB) - 1;
    ((yz as u32) & mask, (xz as u32) & mask)
}

/// Round to 6 decimal places.
fn round6(val: f64) -> f64 {
    (val * 1_000_000.0).round() / 1_000_000.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
