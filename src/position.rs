//! Position sources: continuous location streams.
//!
//! A source is started with a [`SamplingPolicy`] and hands back a
//! [`Subscription`]. The subscription yields [`PositionEvent`]s in the order
//! they were produced, until it is stopped or dropped. A failed sample is an
//! event like any other; the stream keeps going after it.
//!
//! Each source kind has its own submodule.

mod manual;
mod nmea;

use std::time::Duration;

use jiff::Timestamp;
use tokio::sync::{mpsc, oneshot};

use crate::model::Position;

pub use manual::{ManualFeed, ManualSource};
pub use nmea::{Fix, NmeaSource, parse_sentence};

/// A location failure: the capability is missing, or one acquisition failed.
///
/// Never fatal. Tracking carries on without coordinates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct LocationError {
    pub message: String,
}

impl LocationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The host has no location capability at all.
    pub fn unsupported() -> Self {
        Self::new("unsupported")
    }
}

/// One emission from a position stream.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionEvent {
    Sample(Position),
    Error(LocationError),
}

/// How a source acquires fixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplingPolicy {
    /// Prefer precise fixes and discard imprecise ones.
    pub high_accuracy: bool,

    /// A cached fix younger than this may be reused instead of waiting.
    pub maximum_age: Duration,

    /// How long a single acquisition may take before it is reported as failed.
    pub timeout: Duration,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            maximum_age: Duration::from_secs(30),
            timeout: Duration::from_secs(27),
        }
    }
}

impl SamplingPolicy {
    /// Whether `position` is young enough to reuse at `now`.
    ///
    /// Fixes stamped in the future are never fresh.
    pub fn is_fresh(&self, position: &Position, now: Timestamp) -> bool {
        let age = now.as_millisecond() - position.timestamp.as_millisecond();
        u128::try_from(age).is_ok_and(|age| age <= self.maximum_age.as_millis())
    }
}

/// A continuous location capability.
pub trait PositionSource: Send {
    /// Starts emitting. Fails immediately, with no stream, if the capability
    /// is unavailable.
    fn start(&mut self, policy: &SamplingPolicy) -> Result<Subscription, LocationError>;
}

/// A source for hosts with no location capability.
#[derive(Debug, Default)]
pub struct UnsupportedSource;

impl PositionSource for UnsupportedSource {
    fn start(&mut self, _policy: &SamplingPolicy) -> Result<Subscription, LocationError> {
        Err(LocationError::unsupported())
    }
}

/// Handle to a running position stream.
///
/// Stopping or dropping the handle ends the stream: the producer is told to
/// halt and anything not yet received is discarded.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::UnboundedReceiver<PositionEvent>,
    stop: Option<oneshot::Sender<()>>,
}

impl Subscription {
    pub(crate) fn new(
        events: mpsc::UnboundedReceiver<PositionEvent>,
        stop: Option<oneshot::Sender<()>>,
    ) -> Self {
        Self { events, stop }
    }

    /// Returns the next event if one is already waiting.
    pub fn try_next(&mut self) -> Option<PositionEvent> {
        self.events.try_recv().ok()
    }

    /// Waits for the next event. Returns `None` once the stream has ended.
    ///
    /// Must not be called from within an async runtime.
    pub fn next_blocking(&mut self) -> Option<PositionEvent> {
        self.events.blocking_recv()
    }

    /// Ends the stream.
    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        if let Some(stop) = self.stop.take() {
            // The producer may already be gone.
            let _ = stop.send(());
        }
        self.events.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.halt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(seconds: i64) -> Timestamp {
        Timestamp::new(seconds, 0).unwrap()
    }

    #[test]
    fn default_policy_matches_tracking_settings() {
        let policy = SamplingPolicy::default();

        assert!(policy.high_accuracy);
        assert_eq!(policy.maximum_age, Duration::from_secs(30));
        assert_eq!(policy.timeout, Duration::from_secs(27));
    }

    #[test]
    fn freshness_respects_maximum_age() {
        let policy = SamplingPolicy::default();
        let fix = Position::new(59.3, 18.0, at(1_700_000_000));

        assert!(policy.is_fresh(&fix, at(1_700_000_000)));
        assert!(policy.is_fresh(&fix, at(1_700_000_030)));
        assert!(!policy.is_fresh(&fix, at(1_700_000_031)));
        assert!(!policy.is_fresh(&fix, at(1_699_999_999)));
    }

    #[test]
    fn unsupported_source_fails_to_start() {
        let err = UnsupportedSource.start(&SamplingPolicy::default()).unwrap_err();

        assert_eq!(err, LocationError::unsupported());
        assert_eq!(err.to_string(), "unsupported");
    }

    #[test]
    fn subscription_delivers_in_order_then_ends() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sub = Subscription::new(rx, None);
        let first = Position::new(1.0, 2.0, at(1));
        let second = Position::new(3.0, 4.0, at(2));

        tx.send(PositionEvent::Sample(first.clone())).unwrap();
        tx.send(PositionEvent::Error(LocationError::new("timeout")))
            .unwrap();
        tx.send(PositionEvent::Sample(second.clone())).unwrap();
        drop(tx);

        assert_eq!(sub.try_next(), Some(PositionEvent::Sample(first)));
        assert_eq!(
            sub.try_next(),
            Some(PositionEvent::Error(LocationError::new("timeout")))
        );
        assert_eq!(sub.next_blocking(), Some(PositionEvent::Sample(second)));
        assert_eq!(sub.next_blocking(), None);
    }

    #[test]
    fn stopping_signals_the_producer() {
        let (tx, rx) = mpsc::unbounded_channel::<PositionEvent>();
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let sub = Subscription::new(rx, Some(stop_tx));

        sub.stop();

        assert!(stop_rx.try_recv().is_ok());
        assert!(tx.is_closed());
    }
}
