//! Shared types, error enum, and the decoded message record for adsb-track-core.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors produced by adsb-track-core.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("invalid ICAO address: {0}")]
    InvalidIcao(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TrackError>;

/// Milliseconds on the caller's clock. The core never reads a clock itself.
pub type Millis = u64;

// ---------------------------------------------------------------------------
// ICAO address
// ---------------------------------------------------------------------------

/// 24-bit ICAO aircraft address, the key of a track.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Icao(u32);

impl Icao {
    /// Build an address from the low 24 bits of `val`.
    pub const fn new(val: u32) -> Self {
        Icao(val & 0x00FF_FFFF)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Icao {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06X}", self.0)
    }
}

impl FromStr for Icao {
    type Err = TrackError;

    fn from_str(hex: &str) -> Result<Self> {
        let hex = hex.trim();
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(TrackError::InvalidIcao(hex.to_string()));
        }
        u32::from_str_radix(hex, 16)
            .map(Icao)
            .map_err(|_| TrackError::InvalidIcao(hex.to_string()))
    }
}

impl TryFrom<String> for Icao {
    type Error = TrackError;

    fn try_from(hex: String) -> Result<Self> {
        hex.parse()
    }
}

impl From<Icao> for String {
    fn from(icao: Icao) -> String {
        icao.to_string()
    }
}

// ---------------------------------------------------------------------------
// Message field enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AltitudeUnit {
    #[default]
    Feet,
    Meters,
}

impl fmt::Display for AltitudeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AltitudeUnit::Feet => write!(f, "ft"),
            AltitudeUnit::Meters => write!(f, "m"),
        }
    }
}

/// CPR frame parity (the `F` flag of an airborne position message).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CprParity {
    #[default]
    Even,
    Odd,
}

/// A field that a message may omit, send blank, or send with a value.
///
/// Keeps "not transmitted" apart from "transmitted but empty" so that
/// sticky track fields are only overwritten by real values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reported<T> {
    Omitted,
    Blank,
    Value(T),
}

impl<T> Reported<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Reported::Value(v) => Some(v),
            Reported::Omitted | Reported::Blank => None,
        }
    }
}

impl<'a> Reported<&'a str> {
    /// Classify raw callsign text. Trailing blanks are padding, not content.
    pub fn from_text(text: Option<&'a str>) -> Self {
        match text.map(str::trim) {
            None => Reported::Omitted,
            Some("") => Reported::Blank,
            Some(cs) => Reported::Value(cs),
        }
    }
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// Resolved absolute position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

impl Position {
    pub fn new(lat: f64, lon: f64) -> Self {
        Position { lat, lon }
    }

    /// True unless either coordinate is exactly zero. Only such fixes enter
    /// the position history.
    pub fn is_plottable(&self) -> bool {
        self.lat != 0.0 && self.lon != 0.0
    }
}

// ---------------------------------------------------------------------------
// Decoded message record
// ---------------------------------------------------------------------------

/// What a message carries for the track state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// DF0/4/20: altitude reply.
    Altitude,
    /// DF17 TC 1-4: aircraft identification.
    Identification,
    /// DF17 TC 9-18: airborne position (barometric altitude + CPR).
    AirbornePosition,
    /// DF17 TC 19, subtype 1 or 2: ground speed and track.
    Velocity,
    /// Anything else. Counted, otherwise ignored.
    Other,
}

/// A Mode S / ADS-B message as produced by an upstream decoder.
///
/// Which fields are meaningful depends on `df`/`type_code`/`sub_type`; the
/// rest keep their defaults. CRC has already been checked upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    pub icao: Icao,
    /// Downlink format (0-31).
    pub df: u8,
    /// ADS-B type code (1-22), only for DF17.
    pub type_code: Option<u8>,
    /// Velocity subtype, only for TC 19.
    pub sub_type: Option<u8>,

    pub altitude: i32,
    pub altitude_unit: AltitudeUnit,
    pub callsign: Option<String>,

    pub raw_latitude: u32,
    pub raw_longitude: u32,
    pub parity: CprParity,

    pub ground_speed: f64,
    pub heading: f64,
    pub heading_valid: bool,

    pub aircraft_type: Option<u8>,

    pub crc: u32,
    pub crc_ok: bool,
    pub error_bits: u8,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match (self.df, self.type_code) {
            (0 | 4 | 20, _) => MessageKind::Altitude,
            (17, Some(1..=4)) => MessageKind::Identification,
            (17, Some(9..=18)) => MessageKind::AirbornePosition,
            (17, Some(19)) if matches!(self.sub_type, Some(1 | 2)) => MessageKind::Velocity,
            _ => MessageKind::Other,
        }
    }

    pub fn callsign(&self) -> Reported<&str> {
        Reported::from_text(self.callsign.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
