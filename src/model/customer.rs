//! Customer types: the durable registry entries and their visit history.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Position;

/// A known customer location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    /// Assigned at creation. Never changes.
    pub id: Uuid,

    pub name: String,

    pub address: String,

    /// Visits in the order they happened. Append-only.
    #[serde(default)]
    pub visit_history: Vec<VisitRecord>,
}

impl Customer {
    /// Creates a customer with a fresh id and no visits.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            address: address.into(),
            visit_history: Vec::new(),
        }
    }

    /// The most recent visit, if any.
    pub fn latest_visit(&self) -> Option<&VisitRecord> {
        self.visit_history.last()
    }
}

/// One completed stop, folded into a customer's history when a round ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitRecord {
    /// When the round that completed this stop ended.
    pub date: Timestamp,

    /// The round the visit belongs to.
    pub round_id: Uuid,

    /// Last fix logged when the stop was marked complete, if there was one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps_position: Option<Position>,
}
