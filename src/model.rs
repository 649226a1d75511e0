//! Core data model for Plow.
//!
//! These types represent the field-service domain:
//! customers and their visit history, GPS positions, and rounds.

mod customer;
mod position;
mod round;

pub use customer::{Customer, VisitRecord};
pub use position::Position;
pub use round::{Round, RoundCustomer};
