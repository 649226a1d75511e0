//! Reconciliation: turning a completed stop into a visit record.

use jiff::Timestamp;
use uuid::Uuid;

use crate::model::{RoundCustomer, VisitRecord};

/// Builds the visit record for one completed stop.
///
/// The GPS evidence is the last fix in the stop's log, or none if the stop
/// was completed without a known position.
pub fn visit_record(stop: &RoundCustomer, round_id: Uuid, now: Timestamp) -> VisitRecord {
    VisitRecord {
        date: now,
        round_id,
        gps_position: stop.last_fix().cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::{Customer, Position};

    #[test]
    fn uses_last_logged_fix() {
        let mut stop = RoundCustomer::from(&Customer::new("Alice", "1 Elm"));
        let early = Position::new(59.3, 18.0, Timestamp::new(1_700_000_000, 0).unwrap());
        let late = Position::new(59.4, 18.1, Timestamp::new(1_700_000_060, 0).unwrap());
        stop.gps_log = vec![early, late.clone()];
        let round_id = Uuid::new_v4();
        let now = Timestamp::new(1_700_000_100, 0).unwrap();

        let visit = visit_record(&stop, round_id, now);

        assert_eq!(visit.date, now);
        assert_eq!(visit.round_id, round_id);
        assert_eq!(visit.gps_position, Some(late));
    }

    #[test]
    fn empty_log_gives_no_position() {
        let stop = RoundCustomer::from(&Customer::new("Alice", "1 Elm"));

        let visit = visit_record(&stop, Uuid::new_v4(), Timestamp::now());

        assert!(visit.gps_position.is_none());
    }
}
