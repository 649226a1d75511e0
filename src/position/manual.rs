//! Manual source: positions pushed in by hand.
//!
//! Used when fixes come from somewhere other than a receiver, such as a
//! coordinate typed on the command line, and in tests.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::model::Position;

use super::{LocationError, PositionEvent, PositionSource, SamplingPolicy, Subscription};

type Slot = Arc<Mutex<Option<mpsc::UnboundedSender<PositionEvent>>>>;

/// A source whose events come from a [`ManualFeed`].
#[derive(Debug, Default)]
pub struct ManualSource {
    slot: Slot,
}

/// The sending half of a [`ManualSource`].
///
/// Events pushed while no subscription is running are dropped.
#[derive(Debug, Clone)]
pub struct ManualFeed {
    slot: Slot,
}

impl ManualSource {
    pub fn new() -> (Self, ManualFeed) {
        let source = Self::default();
        let feed = ManualFeed {
            slot: Arc::clone(&source.slot),
        };
        (source, feed)
    }
}

impl PositionSource for ManualSource {
    fn start(&mut self, _policy: &SamplingPolicy) -> Result<Subscription, LocationError> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        Ok(Subscription::new(rx, None))
    }
}

impl ManualFeed {
    /// Emits a sample. Returns `false` if nobody is subscribed.
    pub fn push(&self, position: Position) -> bool {
        self.send(PositionEvent::Sample(position))
    }

    /// Emits a failed acquisition. Returns `false` if nobody is subscribed.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.send(PositionEvent::Error(LocationError::new(message)))
    }

    fn send(&self, event: PositionEvent) -> bool {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref().is_some_and(|tx| tx.send(event).is_ok())
    }
}
