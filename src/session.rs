//! The tracker core: registry, round state machine, and archive behind one owner.
//!
//! A [`Session`] is the only way in. It exposes the six user intents
//! (add customer, remove customer, start round, toggle a stop, end round,
//! view history), read-only snapshots, and the position pump. Every method
//! takes `&mut self` or `&self`, so transitions never interleave; callers on
//! several threads put the session behind a mutex.

use std::sync::Arc;

use jiff::Timestamp;
use uuid::Uuid;

use crate::archive::Archive;
use crate::error::Result;
use crate::model::{Customer, Round};
use crate::position::{PositionEvent, PositionSource, SamplingPolicy};
use crate::registry::Registry;
use crate::round::{GpsStatus, Phase, RoundMachine};
use crate::storage::{self, KeyValueStore};

pub struct Session {
    registry: Registry,
    rounds: RoundMachine,
    archive: Archive,
    source: Box<dyn PositionSource>,
    policy: SamplingPolicy,
}

impl Session {
    /// Loads all three records from `store`.
    ///
    /// `source` is started whenever a round starts or tracking is resumed.
    pub fn open(
        store: Arc<dyn KeyValueStore>,
        source: Box<dyn PositionSource>,
        policy: SamplingPolicy,
    ) -> storage::Result<Self> {
        Ok(Self {
            registry: Registry::load(Arc::clone(&store))?,
            rounds: RoundMachine::load(Arc::clone(&store), &policy, Timestamp::now())?,
            archive: Archive::load(store)?,
            source,
            policy,
        })
    }

    // ── Intents ──

    pub fn add_customer(&mut self, name: &str, address: &str) -> Result<Customer> {
        self.registry.add(name, address)
    }

    /// Removes a customer from the registry. A round in progress keeps its copy.
    pub fn remove_customer(&mut self, id: Uuid) -> Result<bool> {
        Ok(self.registry.remove(id)?)
    }

    /// Starts a round over the current registry and starts tracking.
    ///
    /// Returns a copy of the round as it was started.
    pub fn start_round(&mut self) -> Result<Round> {
        self.rounds.start_round(
            self.registry.customers(),
            self.source.as_mut(),
            &self.policy,
            Timestamp::now(),
        )
    }

    pub fn toggle_complete(&mut self, customer_id: Uuid) -> Result<Option<bool>> {
        self.rounds.pump()?;
        self.rounds.toggle_complete(customer_id)
    }

    pub fn end_round(&mut self) -> Result<Round> {
        self.rounds
            .end_round(&mut self.registry, &mut self.archive, Timestamp::now())
    }

    /// Ended rounds, most recent first.
    pub fn history(&self) -> &[Round] {
        self.archive.rounds()
    }

    // ── Snapshots ──

    pub fn customers(&self) -> &[Customer] {
        self.registry.customers()
    }

    pub fn active_round(&self) -> Option<&Round> {
        self.rounds.active()
    }

    pub fn phase(&self) -> Phase {
        self.rounds.phase()
    }

    pub fn gps(&self) -> &GpsStatus {
        self.rounds.gps()
    }

    // ── Position stream ──

    /// Restarts tracking for the round in progress.
    pub fn start_tracking(&mut self) -> Result<()> {
        self.rounds.attach(self.source.as_mut(), &self.policy)?;
        self.rounds.pump()?;
        Ok(())
    }

    pub fn stop_tracking(&mut self) {
        self.rounds.stop_tracking();
    }

    /// Applies every position event already received.
    pub fn pump(&mut self) -> Result<usize> {
        Ok(self.rounds.pump()?)
    }

    /// Blocks on the position stream, applying events as they arrive.
    ///
    /// Stops once the stream ends or `limit` samples have been applied.
    /// `observe` sees each event after it has been applied. Returns the
    /// number of samples applied.
    pub fn track(
        &mut self,
        limit: Option<usize>,
        mut observe: impl FnMut(&PositionEvent),
    ) -> Result<usize> {
        let mut samples = 0;
        while limit.is_none_or(|limit| samples < limit) {
            let Some(event) = self.rounds.next_event() else {
                break;
            };
            if matches!(event, PositionEvent::Sample(_)) {
                samples += 1;
            }
            self.rounds.apply(event.clone())?;
            observe(&event);
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::Error;
    use crate::model::Position;
    use crate::position::{ManualFeed, ManualSource, UnsupportedSource};
    use crate::storage::MemoryStore;

    fn session() -> (Arc<dyn KeyValueStore>, Session, ManualFeed) {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let (source, feed) = ManualSource::new();
        let session =
            Session::open(Arc::clone(&store), Box::new(source), SamplingPolicy::default()).unwrap();
        (store, session, feed)
    }

    #[test]
    fn single_stop_round_end_to_end() {
        let (_store, mut session, feed) = session();
        let alice = session.add_customer("Alice", "1 Elm").unwrap();

        let round = session.start_round().unwrap();
        assert_eq!(round.customers.len(), 1);
        assert!(!round.customers[0].completed);

        let p1 = Position::now(59.3, 18.0);
        feed.push(p1.clone());
        session.pump().unwrap();
        assert_eq!(session.active_round().unwrap().route_log, [p1.clone()]);

        assert_eq!(session.toggle_complete(alice.id).unwrap(), Some(true));
        let stop = session.active_round().unwrap().customer(alice.id).unwrap();
        assert_eq!(stop.gps_log, [p1.clone()]);

        let ended = session.end_round().unwrap();
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.history()[0].id, ended.id);
        assert_eq!(session.history()[0].completed_customers.len(), 1);
        assert_eq!(session.history()[0].completed_customers[0].customer.id, alice.id);

        let history = &session.customers()[0].visit_history;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].round_id, ended.id);
        assert_eq!(history[0].gps_position, Some(p1));
    }

    #[test]
    fn toggle_applies_pending_samples_first() {
        let (_store, mut session, feed) = session();
        let alice = session.add_customer("Alice", "1 Elm").unwrap();
        session.start_round().unwrap();

        let p1 = Position::now(59.3, 18.0);
        feed.push(p1.clone());
        session.toggle_complete(alice.id).unwrap();

        let stop = session.active_round().unwrap().customer(alice.id).unwrap();
        assert_eq!(stop.gps_log, [p1]);
    }

    #[test]
    fn removing_customer_mid_round_keeps_the_stop() {
        let (_store, mut session, _feed) = session();
        let alice = session.add_customer("Alice", "1 Elm").unwrap();
        session.start_round().unwrap();

        assert!(session.remove_customer(alice.id).unwrap());

        assert!(session.customers().is_empty());
        assert!(session.active_round().unwrap().customer(alice.id).is_some());
        assert_eq!(session.toggle_complete(alice.id).unwrap(), Some(true));
        let ended = session.end_round().unwrap();
        assert_eq!(ended.completed_customers.len(), 1);
    }

    #[test]
    fn adding_customer_mid_round_does_not_join_it() {
        let (_store, mut session, _feed) = session();
        session.start_round().unwrap();

        let bob = session.add_customer("Bob", "2 Oak").unwrap();

        assert!(session.active_round().unwrap().customer(bob.id).is_none());
        assert_eq!(session.toggle_complete(bob.id).unwrap(), None);
    }

    #[test]
    fn end_from_idle_is_invalid() {
        let (_store, mut session, _feed) = session();
        session.add_customer("Alice", "1 Elm").unwrap();

        let err = session.end_round().unwrap_err();

        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert!(session.history().is_empty());
        assert!(session.customers()[0].visit_history.is_empty());
    }

    #[test]
    fn archive_grows_newest_first_over_cycles() {
        let (_store, mut session, _feed) = session();
        session.add_customer("Alice", "1 Elm").unwrap();

        let mut ids = Vec::new();
        for _ in 0..3 {
            session.start_round().unwrap();
            ids.push(session.end_round().unwrap().id);
        }
        ids.reverse();

        let archived: Vec<Uuid> = session.history().iter().map(|r| r.id).collect();
        assert_eq!(archived, ids);
    }

    #[test]
    fn reopen_resumes_active_round() {
        let (store, mut session, _feed) = session();
        let alice = session.add_customer("Alice", "1 Elm").unwrap();
        let round_id = session.start_round().unwrap().id;
        session.toggle_complete(alice.id).unwrap();
        drop(session);

        let mut reopened =
            Session::open(store, Box::new(UnsupportedSource), SamplingPolicy::default()).unwrap();

        assert_eq!(reopened.phase(), Phase::Active);
        assert_eq!(reopened.active_round().unwrap().id, round_id);
        let ended = reopened.end_round().unwrap();
        assert_eq!(ended.completed_customers.len(), 1);
        assert_eq!(reopened.customers()[0].visit_history.len(), 1);
    }

    #[test]
    fn start_tracking_requires_active_round() {
        let (_store, mut session, _feed) = session();

        let err = session.start_tracking().unwrap_err();

        assert!(matches!(
            err,
            Error::InvalidTransition {
                state: Phase::Idle,
                ..
            }
        ));
    }

    #[test]
    fn track_applies_until_limit() {
        let (_store, mut session, feed) = session();
        session.start_round().unwrap();
        feed.fail("timeout");
        for i in 0..5 {
            feed.push(Position::now(f64::from(i), 18.0));
        }

        let mut seen = 0;
        let applied = session.track(Some(3), |_| seen += 1).unwrap();

        assert_eq!(applied, 3);
        assert_eq!(seen, 4);
        assert_eq!(session.active_round().unwrap().route_log.len(), 3);
    }

    #[test]
    fn track_ends_when_stream_ends() {
        let (_store, mut session, feed) = session();
        session.start_round().unwrap();
        feed.push(Position::now(59.3, 18.0));
        session.stop_tracking();

        let applied = session.track(None, |_| {}).unwrap();

        assert_eq!(applied, 0);
        assert!(!session.gps().tracking);
    }
}
