//! Round types: one work session over a snapshot of customers.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Customer, Position};

/// A round, active or ended.
///
/// While active, `end_time` is `None` and `completed_customers` is empty.
/// Ending a round stamps `end_time`, fills `completed_customers`, and
/// freezes the record into the archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub id: Uuid,

    pub start_time: Timestamp,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Timestamp>,

    /// Working copies of every registry customer at start, in registry order.
    pub customers: Vec<RoundCustomer>,

    /// Every position sample received while the round was active.
    #[serde(default)]
    pub route_log: Vec<Position>,

    /// The customers marked complete when the round ended.
    #[serde(default)]
    pub completed_customers: Vec<RoundCustomer>,
}

impl Round {
    /// Starts a round over a copy of `customers`, none of them completed.
    ///
    /// The copy is independent: later registry edits do not reach it.
    pub fn start(customers: &[Customer], start_time: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4(),
            start_time,
            end_time: None,
            customers: customers.iter().map(RoundCustomer::from).collect(),
            route_log: Vec::new(),
            completed_customers: Vec::new(),
        }
    }

    pub fn customer(&self, id: Uuid) -> Option<&RoundCustomer> {
        self.customers.iter().find(|c| c.customer.id == id)
    }

    pub fn customer_mut(&mut self, id: Uuid) -> Option<&mut RoundCustomer> {
        self.customers.iter_mut().find(|c| c.customer.id == id)
    }

    /// Number of stops currently marked complete.
    pub fn completed_count(&self) -> usize {
        self.customers.iter().filter(|c| c.completed).count()
    }

    pub fn is_ended(&self) -> bool {
        self.end_time.is_some()
    }
}

/// A customer as seen from inside one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundCustomer {
    #[serde(flatten)]
    pub customer: Customer,

    pub completed: bool,

    /// Positions captured each time this stop was marked complete.
    /// Never shrinks, even when the stop is toggled back to incomplete.
    #[serde(default)]
    pub gps_log: Vec<Position>,
}

impl RoundCustomer {
    /// Flips `completed` and returns the new value.
    ///
    /// On a false → true transition with a known position, that position
    /// is appended to `gps_log`.
    pub fn toggle(&mut self, current: Option<&Position>) -> bool {
        self.completed = !self.completed;
        if self.completed
            && let Some(position) = current
        {
            self.gps_log.push(position.clone());
        }
        self.completed
    }

    /// The fix that ends up in the visit record: the last one logged.
    pub fn last_fix(&self) -> Option<&Position> {
        self.gps_log.last()
    }
}

impl From<&Customer> for RoundCustomer {
    fn from(customer: &Customer) -> Self {
        Self {
            customer: customer.clone(),
            completed: false,
            gps_log: Vec::new(),
        }
    }
}
