//! adsb-track-core: live aircraft track table for decoded Mode S / ADS-B.
//!
//! No async, no I/O, just algorithms. Messages arrive already decoded; this
//! crate keeps per-aircraft state and resolves CPR position pairs.

pub mod config;
pub mod cpr;
pub mod observe;
pub mod shared;
pub mod table;
pub mod track;
pub mod types;

// Re-export commonly used types at crate root
pub use cpr::{resolve_global_position, CprFrame, Unresolvable};
pub use observe::{Notifier, TrackEvent};
pub use shared::SharedTrackTable;
pub use table::{IngestOutcome, TrackTable};
pub use track::Track;
pub use types::*;
