//! Persisted state cells.
//!
//! A [`Persisted`] owns one record and the key it lives under. Every change
//! made through [`Persisted::update`] is written back to the store before
//! it is committed in memory: the store never lags the in-memory state, and
//! a failed write leaves both untouched.

use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};

use crate::storage::{KeyValueStore, Result, StorageError};

pub struct Persisted<T> {
    key: &'static str,
    value: T,
    store: Arc<dyn KeyValueStore>,
}

impl<T> Persisted<T>
where
    T: Serialize + DeserializeOwned + Default + Clone,
{
    /// Loads the record under `key`, or the default value if it was never written.
    pub fn load(store: Arc<dyn KeyValueStore>, key: &'static str) -> Result<Self> {
        let value = match store.get(key)? {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| StorageError::Corrupt(format!("{key}: {e}")))?,
            None => T::default(),
        };
        Ok(Self { key, value, store })
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Applies `change` to a copy, writes the copy to the store, then keeps it.
    ///
    /// If the write fails the cell still holds the previous value.
    pub fn update<R>(&mut self, change: impl FnOnce(&mut T) -> R) -> Result<R> {
        let mut next = self.value.clone();
        let out = change(&mut next);
        self.save(&next)?;
        self.value = next;
        Ok(out)
    }

    fn save(&self, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        tracing::trace!(key = self.key, bytes = json.len(), "saving record");
        self.store.set(self.key, &json)
    }
}
