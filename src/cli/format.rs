//! Output formatting for CLI display.

use jiff::{Timestamp, tz::TimeZone};
use uuid::Uuid;

use plow::model::{Customer, Position};
use plow::round::GpsStatus;

/// First eight hex digits of an id.
pub(super) fn short_id(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// A timestamp in the local time zone.
pub(super) fn format_timestamp(ts: Timestamp) -> String {
    format_timestamp_in(ts, &TimeZone::system())
}

fn format_timestamp_in(ts: Timestamp, tz: &TimeZone) -> String {
    ts.to_zoned(tz.clone()).strftime("%Y-%m-%d %H:%M:%S").to_string()
}

/// Coordinates with six decimals.
pub(super) fn format_position(position: &Position) -> String {
    format!("{:.6}, {:.6}", position.lat, position.lng)
}

/// One registry line: id, name, address, and the latest visit if any.
pub(super) fn format_customer(customer: &Customer) -> String {
    let mut line = format!(
        "{}  {}, {}",
        short_id(customer.id),
        customer.name,
        customer.address
    );
    if let Some(visit) = customer.latest_visit() {
        line.push_str(&format!("  (last visit {})", format_timestamp(visit.date)));
    }
    line
}

/// Tracking state, current position, and the last failure, one item per line.
pub(super) fn format_gps(gps: &GpsStatus) -> Vec<String> {
    let state = if gps.tracking { "active" } else { "inactive" };
    let mut lines = vec![format!("GPS: {state}")];
    lines.push(match &gps.current_position {
        Some(p) => format!(
            "  position {} ({})",
            format_position(p),
            format_timestamp(p.timestamp)
        ),
        None => "  no current position".to_string(),
    });
    if let Some(error) = &gps.last_error {
        lines.push(format!("  last error: {error}"));
    }
    lines
}
