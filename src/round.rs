//! Round state machine.
//!
//! ```text
//! Idle --start_round--> Active --end_round--> Idle (+ archived round)
//!                        |  ^
//!                        +--+ position samples, toggle_complete
//! ```
//!
//! At most one round is active. The active round is persisted on every change,
//! so a restarted process resumes it. The position subscription and the GPS
//! status live only in memory.

use std::{fmt, sync::Arc};

use jiff::Timestamp;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::archive::Archive;
use crate::error::{Error, Result};
use crate::model::{Customer, Position, Round};
use crate::position::{LocationError, PositionEvent, PositionSource, SamplingPolicy, Subscription};
use crate::reconcile;
use crate::registry::Registry;
use crate::state::Persisted;
use crate::storage::{self, ACTIVE_ROUND, KeyValueStore};

/// Where the machine stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No round in progress.
    Idle,

    /// A round is in progress.
    Active,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("no round is active"),
            Self::Active => f.write_str("a round is active"),
        }
    }
}

/// Live tracking status, for display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpsStatus {
    /// A position stream is attached.
    pub tracking: bool,

    /// The latest sample, used to stamp stops as they are completed.
    pub current_position: Option<Position>,

    /// The latest location failure, cleared by the next good sample.
    pub last_error: Option<String>,
}

pub struct RoundMachine {
    active: Persisted<Option<Round>>,
    subscription: Option<Subscription>,
    gps: GpsStatus,
}

impl RoundMachine {
    /// Loads the active round, if any.
    ///
    /// The last logged position of a resumed round becomes the current
    /// position only if it is still fresh under `policy` at `now`.
    pub fn load(
        store: Arc<dyn KeyValueStore>,
        policy: &SamplingPolicy,
        now: Timestamp,
    ) -> storage::Result<Self> {
        let active = Persisted::<Option<Round>>::load(store, ACTIVE_ROUND)?;
        let current_position = active
            .get()
            .as_ref()
            .and_then(|round| round.route_log.last())
            .filter(|fix| policy.is_fresh(fix, now))
            .cloned();
        Ok(Self {
            active,
            subscription: None,
            gps: GpsStatus {
                current_position,
                ..GpsStatus::default()
            },
        })
    }

    pub fn phase(&self) -> Phase {
        if self.active.get().is_some() {
            Phase::Active
        } else {
            Phase::Idle
        }
    }

    pub fn active(&self) -> Option<&Round> {
        self.active.get().as_ref()
    }

    pub fn gps(&self) -> &GpsStatus {
        &self.gps
    }

    /// Starts a round over a copy of `customers` and attaches the position source.
    ///
    /// Returns a copy of the new round. A source that fails to start leaves
    /// the round active without tracking; the failure shows up in the GPS
    /// status.
    pub fn start_round(
        &mut self,
        customers: &[Customer],
        source: &mut dyn PositionSource,
        policy: &SamplingPolicy,
        now: Timestamp,
    ) -> Result<Round> {
        self.require(Phase::Idle, "start a round")?;

        let round = Round::start(customers, now);
        info!(round = %round.id, stops = round.customers.len(), "round started");
        self.active.update(|active| *active = Some(round.clone()))?;
        self.attach(source, policy)?;
        Ok(round)
    }

    /// Starts (or restarts) position tracking for the active round.
    pub fn attach(&mut self, source: &mut dyn PositionSource, policy: &SamplingPolicy) -> Result<()> {
        self.require(Phase::Active, "start tracking")?;
        self.stop_tracking();

        match source.start(policy) {
            Ok(subscription) => {
                self.subscription = Some(subscription);
                self.gps.tracking = true;
                debug!("tracking started");
            }
            Err(e) => {
                warn!(error = %e, "position source unavailable");
                self.gps.last_error = Some(e.message);
            }
        }
        Ok(())
    }

    /// Detaches the position stream. Nothing it emits afterwards is applied.
    pub fn stop_tracking(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.stop();
            debug!("tracking stopped");
        }
        self.gps.tracking = false;
    }

    /// Applies one stream event.
    pub fn apply(&mut self, event: PositionEvent) -> storage::Result<()> {
        match event {
            PositionEvent::Sample(position) => self.on_position_sample(position).map(|_| ()),
            PositionEvent::Error(e) => {
                self.on_location_error(e);
                Ok(())
            }
        }
    }

    /// Records a sample: it becomes the current position and is appended to
    /// the route log.
    ///
    /// Samples arriving with no active round, or with non-finite coordinates,
    /// are dropped; returns `false`.
    pub fn on_position_sample(&mut self, position: Position) -> storage::Result<bool> {
        if self.active.get().is_none() {
            debug!("dropping sample: no active round");
            return Ok(false);
        }
        if !(position.lat.is_finite() && position.lng.is_finite()) {
            warn!(lat = position.lat, lng = position.lng, "dropping non-finite sample");
            return Ok(false);
        }
        debug!(lat = position.lat, lng = position.lng, "position sample");
        self.gps.current_position = Some(position.clone());
        self.gps.last_error = None;
        self.active.update(|active| {
            if let Some(round) = active {
                round.route_log.push(position);
            }
        })?;
        Ok(true)
    }

    /// Records a failed acquisition. Tracking continues.
    pub fn on_location_error(&mut self, error: LocationError) {
        warn!(error = %error, "location error");
        self.gps.last_error = Some(error.message);
    }

    /// Applies every event already waiting on the stream, in arrival order.
    ///
    /// Returns how many were applied.
    pub fn pump(&mut self) -> storage::Result<usize> {
        let mut applied = 0;
        while let Some(event) = self.subscription.as_mut().and_then(Subscription::try_next) {
            self.apply(event)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Waits for the next stream event without applying it.
    ///
    /// Returns `None` when not tracking or once the stream has ended.
    pub fn next_event(&mut self) -> Option<PositionEvent> {
        let event = self.subscription.as_mut()?.next_blocking();
        if event.is_none() {
            self.stop_tracking();
        }
        event
    }

    /// Flips a stop's completion and returns its new state.
    ///
    /// Completing a stop while a position is known logs that position on the
    /// stop. Un-completing leaves the log alone. An id that is not in the
    /// round is a no-op and returns `None`.
    pub fn toggle_complete(&mut self, customer_id: Uuid) -> Result<Option<bool>> {
        self.require(Phase::Active, "toggle a stop")?;

        let known = self
            .active()
            .is_some_and(|round| round.customer(customer_id).is_some());
        if !known {
            debug!(customer = %customer_id, "toggle: not in this round");
            return Ok(None);
        }

        let current = self.gps.current_position.clone();
        let completed = self.active.update(|active| {
            active
                .as_mut()
                .and_then(|round| round.customer_mut(customer_id))
                .map(|stop| stop.toggle(current.as_ref()))
        })?;
        debug!(customer = %customer_id, ?completed, "stop toggled");
        Ok(completed)
    }

    /// Ends the active round.
    ///
    /// Stops tracking, collects the completed stops, stamps the end time,
    /// records a visit for each completed stop in `registry`, archives the
    /// round, and returns to idle. Ending with nothing completed still
    /// archives the round.
    ///
    /// If a write fails the round stays active and the call can be retried:
    /// visits and the archive entry already stored for this round are not
    /// written twice.
    pub fn end_round(
        &mut self,
        registry: &mut Registry,
        archive: &mut Archive,
        now: Timestamp,
    ) -> Result<Round> {
        let Some(mut round) = self.active.get().clone() else {
            return Err(Error::InvalidTransition {
                operation: "end a round",
                state: Phase::Idle,
            });
        };

        self.stop_tracking();

        round.completed_customers = round
            .customers
            .iter()
            .filter(|stop| stop.completed)
            .cloned()
            .collect();
        round.end_time = Some(now);

        for stop in &round.completed_customers {
            let visit = reconcile::visit_record(stop, round.id, now);
            registry.record_visit(stop.customer.id, visit)?;
        }

        let round = match archive.get(round.id) {
            Some(archived) => archived.clone(),
            None => {
                archive.append(round.clone())?;
                round
            }
        };
        self.active.update(|active| *active = None)?;

        info!(
            round = %round.id,
            completed = round.completed_customers.len(),
            of = round.customers.len(),
            "round ended"
        );
        Ok(round)
    }

    fn require(&self, phase: Phase, operation: &'static str) -> Result<()> {
        let state = self.phase();
        if state == phase {
            Ok(())
        } else {
            Err(Error::InvalidTransition { operation, state })
        }
    }
}
