//! History archive: ended rounds, most recent first.
//!
//! Append-only. There is no edit or delete; a round is frozen once archived.

use std::sync::Arc;

use uuid::Uuid;

use crate::model::Round;
use crate::state::Persisted;
use crate::storage::{COMPLETED_ROUNDS, KeyValueStore, Result};

pub struct Archive {
    rounds: Persisted<Vec<Round>>,
}

impl Archive {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        Ok(Self {
            rounds: Persisted::load(store, COMPLETED_ROUNDS)?,
        })
    }

    /// Puts an ended round at the front of the history.
    pub fn append(&mut self, round: Round) -> Result<()> {
        self.rounds.update(|rounds| rounds.insert(0, round))
    }

    /// Archived rounds, most recent first.
    pub fn rounds(&self) -> &[Round] {
        self.rounds.get()
    }

    pub fn get(&self, id: Uuid) -> Option<&Round> {
        self.rounds().iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.rounds().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds().is_empty()
    }
}
