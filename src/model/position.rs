//! Position: a single GPS fix.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// A timestamped coordinate sample.
///
/// Value type with no identity. The timestamp serializes as RFC 3339.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude in decimal degrees, positive north.
    pub lat: f64,

    /// Longitude in decimal degrees, positive east.
    pub lng: f64,

    /// When the fix was received.
    pub timestamp: Timestamp,
}

impl Position {
    pub fn new(lat: f64, lng: f64, timestamp: Timestamp) -> Self {
        Self {
            lat,
            lng,
            timestamp,
        }
    }

    /// A fix stamped with the current time.
    pub fn now(lat: f64, lng: f64) -> Self {
        Self::new(lat, lng, Timestamp::now())
    }
}
