//! In-memory backend, for tests and throwaway sessions.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use super::{KeyValueStore, Result};

/// Key-value store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// A [`MemoryStore`] whose next write to a chosen key fails once.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    fail_key: Mutex<Option<String>>,
}

#[cfg(test)]
impl FlakyStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Makes the next `set` of `key` fail with an I/O error.
    pub(crate) fn fail_next(&self, key: &str) {
        *self.fail_key.lock().unwrap() = Some(key.to_string());
    }
}

#[cfg(test)]
impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut fail_key = self.fail_key.lock().unwrap();
        if fail_key.as_deref() == Some(key) {
            *fail_key = None;
            return Err(std::io::Error::other("disk full").into());
        }
        self.inner.set(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get() {
        let store = MemoryStore::new();

        assert!(store.get("k").unwrap().is_none());
        store.set("k", "v").unwrap();
        store.set("k", "w").unwrap();

        assert_eq!(store.get("k").unwrap().as_deref(), Some("w"));
    }

    #[test]
    fn flaky_store_fails_once_on_chosen_key() {
        let store = FlakyStore::new();
        store.fail_next("k");

        store.set("other", "1").unwrap();
        assert!(store.set("k", "v").is_err());
        assert!(store.get("k").unwrap().is_none());
        store.set("k", "v").unwrap();

        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
    }
}
