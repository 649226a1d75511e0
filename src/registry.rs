//! Customer registry: the durable list of customers and their visits.
//!
//! Independent of any round. A round works on its own copy of the customers,
//! so edits here never reach a round already in progress.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{Customer, VisitRecord};
use crate::state::Persisted;
use crate::storage::{self, CUSTOMER_DATABASE, KeyValueStore};

pub struct Registry {
    customers: Persisted<Vec<Customer>>,
}

impl Registry {
    pub fn load(store: Arc<dyn KeyValueStore>) -> storage::Result<Self> {
        Ok(Self {
            customers: Persisted::load(store, CUSTOMER_DATABASE)?,
        })
    }

    /// All customers in insertion order.
    pub fn customers(&self) -> &[Customer] {
        self.customers.get()
    }

    pub fn get(&self, id: Uuid) -> Option<&Customer> {
        self.customers().iter().find(|c| c.id == id)
    }

    /// Adds a customer with a fresh id and no visits.
    ///
    /// Name and address are required. Blank input is rejected with a
    /// validation error and nothing is stored. Duplicates are allowed.
    pub fn add(&mut self, name: &str, address: &str) -> Result<Customer> {
        let name = name.trim();
        let address = address.trim();
        if name.is_empty() {
            return Err(Error::Validation { field: "name" });
        }
        if address.is_empty() {
            return Err(Error::Validation { field: "address" });
        }

        let customer = Customer::new(name, address);
        self.customers.update(|list| list.push(customer.clone()))?;
        info!(id = %customer.id, name = %customer.name, "customer added");
        Ok(customer)
    }

    /// Removes a customer. Returns `false` if there was no such customer.
    pub fn remove(&mut self, id: Uuid) -> storage::Result<bool> {
        let Some(index) = self.position(id) else {
            debug!(%id, "remove: no such customer");
            return Ok(false);
        };
        self.customers.update(|list| list.remove(index))?;
        info!(%id, "customer removed");
        Ok(true)
    }

    /// Appends a visit to a customer's history.
    ///
    /// A customer removed since the round started is skipped with a warning
    /// and `false` is returned; the visit is dropped. A customer holds at most
    /// one visit per round: recording the same round again changes nothing.
    pub fn record_visit(&mut self, id: Uuid, visit: VisitRecord) -> storage::Result<bool> {
        let Some(index) = self.position(id) else {
            warn!(%id, round = %visit.round_id, "dropping visit for removed customer");
            return Ok(false);
        };
        if self.customers()[index]
            .visit_history
            .iter()
            .any(|v| v.round_id == visit.round_id)
        {
            debug!(%id, round = %visit.round_id, "visit already recorded");
            return Ok(true);
        }
        self.customers
            .update(|list| list[index].visit_history.push(visit))?;
        Ok(true)
    }

    fn position(&self, id: Uuid) -> Option<usize> {
        self.customers().iter().position(|c| c.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use jiff::Timestamp;

    use crate::storage::MemoryStore;

    fn test_registry() -> (Arc<dyn KeyValueStore>, Registry) {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let registry = Registry::load(Arc::clone(&store)).unwrap();
        (store, registry)
    }

    fn visit(round_id: Uuid) -> VisitRecord {
        VisitRecord {
            date: Timestamp::now(),
            round_id,
            gps_position: None,
        }
    }

    #[test]
    fn add_appends_in_insertion_order() {
        let (_store, mut registry) = test_registry();

        registry.add("Alice", "1 Elm").unwrap();
        registry.add("Bob", "2 Oak").unwrap();

        let names: Vec<_> = registry.customers().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Alice", "Bob"]);
    }

    #[test]
    fn add_rejects_empty_fields() {
        let (_store, mut registry) = test_registry();

        let err = registry.add("", "1 Elm").unwrap_err();
        assert!(matches!(err, Error::Validation { field: "name" }));

        let err = registry.add("Alice", "   ").unwrap_err();
        assert!(matches!(err, Error::Validation { field: "address" }));

        assert!(registry.customers().is_empty());
    }

    #[test]
    fn add_allows_duplicates() {
        let (_store, mut registry) = test_registry();

        let a = registry.add("Alice", "1 Elm").unwrap();
        let b = registry.add("Alice", "1 Elm").unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(registry.customers().len(), 2);
    }

    #[test]
    fn add_is_persisted() {
        let (store, mut registry) = test_registry();
        let alice = registry.add("Alice", "1 Elm").unwrap();

        let reloaded = Registry::load(store).unwrap();

        assert_eq!(reloaded.customers(), [alice]);
    }

    #[test]
    fn remove_deletes_customer() {
        let (_store, mut registry) = test_registry();
        let alice = registry.add("Alice", "1 Elm").unwrap();
        let bob = registry.add("Bob", "2 Oak").unwrap();

        assert!(registry.remove(alice.id).unwrap());

        assert!(registry.get(alice.id).is_none());
        assert_eq!(registry.customers(), [bob]);
    }

    #[test]
    fn remove_missing_is_noop() {
        let (_store, mut registry) = test_registry();
        registry.add("Alice", "1 Elm").unwrap();

        assert!(!registry.remove(Uuid::new_v4()).unwrap());
        assert_eq!(registry.customers().len(), 1);
    }

    #[test]
    fn record_visit_appends_in_order() {
        let (_store, mut registry) = test_registry();
        let alice = registry.add("Alice", "1 Elm").unwrap();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert!(registry.record_visit(alice.id, visit(first)).unwrap());
        assert!(registry.record_visit(alice.id, visit(second)).unwrap());

        let history = &registry.get(alice.id).unwrap().visit_history;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].round_id, first);
        assert_eq!(history[1].round_id, second);
    }

    #[test]
    fn record_visit_is_once_per_round() {
        let (store, mut registry) = test_registry();
        let alice = registry.add("Alice", "1 Elm").unwrap();
        let round_id = Uuid::new_v4();

        assert!(registry.record_visit(alice.id, visit(round_id)).unwrap());
        assert!(registry.record_visit(alice.id, visit(round_id)).unwrap());

        assert_eq!(registry.get(alice.id).unwrap().visit_history.len(), 1);
        let reloaded = Registry::load(store).unwrap();
        assert_eq!(reloaded.get(alice.id).unwrap().visit_history.len(), 1);
    }

    #[test]
    fn record_visit_for_removed_customer_is_dropped() {
        let (_store, mut registry) = test_registry();
        let alice = registry.add("Alice", "1 Elm").unwrap();
        registry.remove(alice.id).unwrap();

        assert!(!registry.record_visit(alice.id, visit(Uuid::new_v4())).unwrap());
        assert!(registry.customers().is_empty());
    }
}
